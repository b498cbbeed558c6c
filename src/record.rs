//! Intermediate purchase-order records produced by the extraction client.
//!
//! Models answer with loosely typed JSON: quantities come back as numbers or
//! strings, unknown fields as `null` despite instructions. Records normalise
//! every scalar to a `String` on the way in so the row mapper only ever deals
//! with text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key of the nested line-item array inside each PO object.
pub const LINE_ITEMS_KEY: &str = "line_items";

/// One size/quantity/price row within a purchase order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineItem {
    fields: BTreeMap<String, String>,
}

impl LineItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field value, or `""` when the model did not supply it.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            fields: object
                .iter()
                .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                .collect(),
        }
    }
}

/// One purchase order: header fields plus its ordered line items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurchaseOrderRecord {
    #[serde(flatten)]
    header: BTreeMap<String, String>,
    line_items: Vec<LineItem>,
}

impl PurchaseOrderRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header value, or `""` when the model did not supply it.
    pub fn header(&self, key: &str) -> &str {
        self.header.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.header.insert(key.into(), value.into());
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn push_line_item(&mut self, item: LineItem) {
        self.line_items.push(item);
    }

    pub fn with_line_item(mut self, item: LineItem) -> Self {
        self.push_line_item(item);
        self
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.header
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// The PO identifier, if the model reported one.
    pub fn po_number(&self) -> Option<&str> {
        Some(self.header("po_number").trim()).filter(|s| !s.is_empty())
    }

    /// Build a record from one element of the model's JSON array.
    ///
    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut record = Self::new();
        for (key, v) in object {
            if key == LINE_ITEMS_KEY {
                if let Some(items) = v.as_array() {
                    record.line_items = items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(LineItem::from_object)
                        .collect();
                }
            } else {
                record.header.insert(key.clone(), scalar_to_string(v));
            }
        }
        Some(record)
    }
}

impl<'de> Deserialize<'de> for PurchaseOrderRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("purchase order must be a JSON object"))
    }
}

/// Count distinct PO numbers; records without one count individually.
pub fn count_unique_pos(records: &[PurchaseOrderRecord]) -> usize {
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .filter(|r| match r.po_number() {
            Some(po) => seen.insert(po.to_string()),
            None => true,
        })
        .count()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalises_scalars_to_strings() {
        let v = json!({
            "po_number": 4531021625u64,
            "currency": "USD",
            "season": null,
            "line_items": [{ "size": "M", "quantity": 150 }]
        });
        let r = PurchaseOrderRecord::from_value(&v).unwrap();
        assert_eq!(r.header("po_number"), "4531021625");
        assert_eq!(r.header("season"), "");
        assert_eq!(r.header("missing"), "");
        assert_eq!(r.line_items().len(), 1);
        assert_eq!(r.line_items()[0].get("quantity"), "150");
        assert!(!r.headers().contains_key(LINE_ITEMS_KEY));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(PurchaseOrderRecord::from_value(&json!("text")).is_none());
        assert!(serde_json::from_value::<PurchaseOrderRecord>(json!([1, 2])).is_err());
    }

    #[test]
    fn missing_or_malformed_line_items_yield_empty() {
        let r = PurchaseOrderRecord::from_value(&json!({ "po_number": "1" })).unwrap();
        assert!(r.line_items().is_empty());
        let r = PurchaseOrderRecord::from_value(&json!({ "line_items": "none" })).unwrap();
        assert!(r.line_items().is_empty());
    }

    #[test]
    fn unique_po_count_dedups_by_number() {
        let records = vec![
            PurchaseOrderRecord::new().with_header("po_number", "A1"),
            PurchaseOrderRecord::new().with_header("po_number", "A1"),
            PurchaseOrderRecord::new().with_header("po_number", "B2"),
            PurchaseOrderRecord::new(),
        ];
        assert_eq!(count_unique_pos(&records), 3);
    }
}
