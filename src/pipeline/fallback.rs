//! Text-layer fallback parser.
//!
//! Best effort only. When the model returns nothing for a single-request
//! document and `text_fallback` is enabled, the orchestrator runs these
//! regexes over the PDF's embedded text and feeds whatever comes out through
//! the normal row mapper. Nothing here is validated: a country guessed from
//! the last line of an address is still a guess.
//!
//! Output keys are the same field names the extraction prompts ask for, so
//! both buyers' mapping tables pick them up unchanged.

use crate::record::{LineItem, PurchaseOrderRecord};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::debug;

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("valid fallback pattern")
}

static PO_START: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        ci(r"Purchase Order#?\s*\d+"),
        ci(r"PO NUMBER\s*\d+"),
        ci(r"P\.?O\.?\s*#?\s*\d+"),
    ]
});

/// `(output keys, patterns)`: the first pattern that matches fills every key.
static HEADER_FIELDS: Lazy<Vec<(&'static [&'static str], Vec<Regex>)>> = Lazy::new(|| {
    let table: &[(&'static [&'static str], &[&str])] = &[
        (&["po_number"], &[r"Purchase Order#?\s*([A-Z0-9]+)", r"PO NUMBER\s*([A-Z0-9]+)"]),
        (&["season"], &[r"Season\s*(?:Code)?\s*(\d+)"]),
        (&["currency"], &[r"PO Currency\s*([A-Z]{3})", r"Currency\s*([A-Z]{3})"]),
        (&["buyer_order_date"], &[r"DocDate\s*([\d/.\-]+)", r"PO Release Date\s*([\d/.\-]+)"]),
        (&["total_po_value"], &[r"Total PO Value\s*([\d,.]+)", r"PO Value\s*([\d,.]+)"]),
        (&["total_po_quantity"], &[r"Total PO Quantity\s*([\d,]+)", r"PO Quantity\s*([\d,]+)"]),
        (&["ffc_code"], &[r"FFC Code\s*([A-Z0-9]+)"]),
        (&["ffc_description"], &[r"FFC Description[ \t]*([^\n\r]+)"]),
        (&["manufacturer"], &[r"Manufacturer\s*(\d+)"]),
        (&["company_code"], &[r"Company Code\s*(\d+)"]),
        (&["product_division"], &[r"Division[ \t]*([^\n\r]+)"]),
        (&["sourcing_region"], &[r"Sourcing Region\s*([A-Z]+)"]),
        (&["branch_office"], &[r"Branch Office\s*([A-Z]+)"]),
        (&["inco_terms"], &[r"Inco Terms\s*([A-Z]+)"]),
        (&["payment_terms", "pay_terms"], &[r"Payment Terms[ \t]*([^\n\r]+)"]),
    ];
    table.iter()
        .map(|(keys, patterns)| (*keys, patterns.iter().map(|p| ci(p)).collect()))
        .collect()
});

static COUNTRIES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(USA|United States|America)\b",
        r"\b(India)\b",
        r"\b(China)\b",
        r"\b(Singapore)\b",
        r"\b(Korea)\b",
        r"\b(Thailand)\b",
        r"\b(Malaysia)\b",
        r"\b(Philippines)\b",
        r"\b(Germany)\b",
        r"\b(Brazil|Brasil)\b",
        r"\b(Chile)\b",
        r"\b(Mexico)\b",
        r"\b(Mauritius)\b",
        r"\b(Hong Kong)\b",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});

static ALPHA_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s]+$").expect("valid regex"));

static MATERIAL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+-\d+\w*)\s+([^\n\r]+?)\s+(\w+)\s+(\d+)\s+([\d.]+)\s+([\d.]+)").expect("valid regex")
});

static SIZE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s+(\d+)\s+([\d./\-]+)").expect("valid regex"));

static CURRENT_MATERIAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        ci(r"Generic Material\s+([A-Z0-9\-]+)"),
        ci(r"Material\s+([A-Z0-9\-]+)"),
        ci(r"Product\s+([A-Z0-9\-]+)"),
    ]
});

static UNIT_PRICE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        ci(r"PO Unit Price\s+([\d.]+)"),
        ci(r"Unit Price\s+([\d.]+)"),
        ci(r"Price\s+([\d.]+)"),
    ]
});

/// A postal address block and the country guessed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub lines: Vec<String>,
    pub country: Option<String>,
}

impl Address {
    pub fn full(&self) -> String {
        self.lines.join(", ")
    }
}

/// Parse raw text into purchase-order records.
///
/// Text is cut at every PO marker; with no marker the whole text is one PO.
/// Blank text yields nothing.
pub fn parse_text(text: &str) -> Vec<PurchaseOrderRecord> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let records: Vec<_> = segments(text)
        .into_iter()
        .map(parse_segment)
        .collect();
    debug!("Fallback parser produced {} record(s)", records.len());
    records
}

fn segments(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = PO_START
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.start()))
        .collect();
    starts.sort_unstable();
    starts.dedup();

    if starts.is_empty() {
        return vec![text];
    }
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

fn parse_segment(text: &str) -> PurchaseOrderRecord {
    let mut record = PurchaseOrderRecord::new();

    for (keys, patterns) in HEADER_FIELDS.iter() {
        let value = patterns
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        if let Some(value) = value {
            for key in keys.iter() {
                record.set_header(*key, value.clone());
            }
        }
    }

    if let Some(invoice) = extract_address(text, "Invoice To", &["seller", "manufacturer"]) {
        if let Some(first) = invoice.lines.first() {
            record.set_header("buyer_company", first.clone());
        }
        record.set_header("invoice_to", invoice.full());
    }
    if let Some(delivery) = extract_address(text, "Delivery Address", &["plant", "total"]) {
        record.set_header("delivery_address", delivery.full());
        if let Some(country) = delivery.country {
            record.set_header("delivery_country", country);
        }
    }

    let unit_price = unit_price(text);
    if let Some(price) = &unit_price {
        record.set_header("unit_price", price.clone());
    }

    let items = line_items(text, unit_price.as_deref());
    let base = items
        .first()
        .map(|i| i.get("base_material_code").to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| current_material(text));
    if let Some(base) = base {
        record.set_header("ship_under_po_ref", base);
    }
    for item in items {
        record.push_line_item(item);
    }
    record
}

/// Find `label` and collect the non-empty lines after it, stopping at a
/// blank line or a line starting with one of `stop_words`.
pub fn extract_address(text: &str, label: &str, stop_words: &[&str]) -> Option<Address> {
    let lower = text.to_ascii_lowercase();
    let at = lower.find(&label.to_ascii_lowercase())?;
    let rest = &text[at + label.len()..];

    let mut lines = Vec::new();
    let mut seen_content = false;
    for raw in rest.lines() {
        let line = raw.trim();
        if line.is_empty() {
            if seen_content {
                break;
            }
            continue;
        }
        let l = line.to_ascii_lowercase();
        if seen_content && stop_words.iter().any(|w| l.starts_with(w)) {
            break;
        }
        seen_content = true;
        lines.push(line.to_string());
    }

    if lines.is_empty() {
        return None;
    }
    let country = country_from_lines(&lines);
    Some(Address { lines, country })
}

/// Guess a country: a known name on any line, else a short alphabetic last
/// line.
pub fn country_from_lines(lines: &[String]) -> Option<String> {
    for line in lines {
        for re in COUNTRIES.iter() {
            if let Some(m) = re.captures(line).and_then(|c| c.get(1)) {
                return Some(capitalize(m.as_str()));
            }
        }
    }
    let last = lines.last()?;
    (last.len() < 20 && ALPHA_LINE.is_match(last)).then(|| last.clone())
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn base_code(code: &str) -> &str {
    code.trim_end_matches(|c: char| c.is_ascii_alphabetic())
}

fn current_material(text: &str) -> Option<String> {
    CURRENT_MATERIAL
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn unit_price(text: &str) -> Option<String> {
    UNIT_PRICE
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn line_items(text: &str, unit_price: Option<&str>) -> Vec<LineItem> {
    let items: Vec<LineItem> = MATERIAL_LINE
        .captures_iter(text)
        .map(|c| {
            LineItem::new()
                .with("variant_material_code", &c[1])
                .with("base_material_code", base_code(&c[1]))
                .with("description", c[2].trim())
                .with("size", &c[3])
                .with("quantity", &c[4])
                .with("cost", &c[5])
                .with("item_total", &c[6])
        })
        .collect();
    if !items.is_empty() {
        return items;
    }

    // No full material rows: read bare `size qty date` triples instead.
    let material = current_material(text);
    let price: f64 = unit_price.and_then(|p| p.parse().ok()).unwrap_or(1.0);
    SIZE_LINE
        .captures_iter(text)
        .filter_map(|c| {
            let quantity: u64 = c[2].parse().ok()?;
            if c[3].len() > 10 || quantity == 0 {
                return None;
            }
            let mut item = LineItem::new()
                .with("size", &c[1])
                .with("quantity", quantity.to_string())
                .with("cost", format!("{price:.2}"))
                .with("item_total", format!("{:.2}", quantity as f64 * price));
            if let Some(code) = &material {
                item.insert("variant_material_code", code.clone());
                item.insert("base_material_code", base_code(code));
            }
            Some(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVIS_TEXT: &str = "\
PO NUMBER 4531021625
Season Code 251
PO Currency USD
DocDate 13.06.2024
FFC Description WASHINGTON STRIPE II
Payment Terms TT 90 DAYS
Invoice To
Levi Strauss Global Trading Co. Ltd
Hong Kong

Delivery Address
Levi Strauss Korea
Seoul
Korea

PO Unit Price 9.78
A5772-0014M CLASSIC WORKER SHIRT M 150 9.78 1467.00
A5772-0014L CLASSIC WORKER SHIRT L 90 9.78 880.20
";

    #[test]
    fn parses_headers_and_items() {
        let records = parse_text(LEVIS_TEXT);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.po_number(), Some("4531021625"));
        assert_eq!(r.header("season"), "251");
        assert_eq!(r.header("currency"), "USD");
        assert_eq!(r.header("buyer_order_date"), "13.06.2024");
        assert_eq!(r.header("ffc_description"), "WASHINGTON STRIPE II");
        assert_eq!(r.header("pay_terms"), "TT 90 DAYS");
        assert_eq!(r.header("buyer_company"), "Levi Strauss Global Trading Co. Ltd");
        assert_eq!(r.header("delivery_country"), "Korea");
        assert_eq!(r.header("unit_price"), "9.78");
        assert_eq!(r.header("ship_under_po_ref"), "A5772-0014");

        let items = r.line_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("size"), "M");
        assert_eq!(items[0].get("quantity"), "150");
        assert_eq!(items[1].get("item_total"), "880.20");
        assert_eq!(items[1].get("base_material_code"), "A5772-0014");
    }

    #[test]
    fn splits_at_each_po_marker() {
        let text = "PO NUMBER 111\nSeason 1\nPO NUMBER 222\nSeason 2\n";
        let records = parse_text(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].po_number(), Some("222"));
        assert_eq!(records[1].header("season"), "2");
    }

    #[test]
    fn text_without_marker_is_one_po() {
        assert_eq!(parse_text("Season 9\nCurrency EUR").len(), 1);
        assert!(parse_text(" \n ").is_empty());
    }

    #[test]
    fn country_table_then_last_line() {
        let lines = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(country_from_lines(&lines(&["12 Main St", "united states"])), Some("United states".into()));
        assert_eq!(country_from_lines(&lines(&["Rua 1", "Sao Paulo BRASIL"])), Some("Brasil".into()));
        assert_eq!(country_from_lines(&lines(&["Calle 5", "Peru"])), Some("Peru".into()));
        assert_eq!(country_from_lines(&lines(&["Unit 5", "Postcode 12345"])), None);
    }

    #[test]
    fn address_stops_at_stop_word() {
        let text = "Invoice To\nACME Ltd\nLondon\nSeller\nOther Co";
        let a = extract_address(text, "Invoice To", &["seller"]).unwrap();
        assert_eq!(a.lines, vec!["ACME Ltd", "London"]);
        assert_eq!(a.full(), "ACME Ltd, London");
    }

    #[test]
    fn size_triples_used_when_no_material_rows() {
        let text = "Material 72625-0110\nUnit Price 2.50\nM 10 20241010\nL 0 20241010\n";
        let records = parse_text(text);
        let items = records[0].line_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("size"), "M");
        assert_eq!(items[0].get("item_total"), "25.00");
        assert_eq!(items[0].get("variant_material_code"), "72625-0110");
    }
}
