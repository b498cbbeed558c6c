//! Row Mapper: purchase-order records to canonical rows.
//!
//! Each buyer carries a table of `(Column, ColumnRule)` pairs. A rule names
//! where the column's value comes from: a header field, a line-item field, or
//! a fixed literal. Columns absent from a table are blank. Mapping is a pure
//! structural transform; field content is never validated.

use crate::buyer::Buyer;
use crate::record::{LineItem, PurchaseOrderRecord};
use crate::row::{CanonicalRow, Column};

/// Where a canonical column takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    /// Always `""`.
    Blank,
    /// A fixed value the source template never supplies.
    Literal(&'static str),
    /// A PO header field, verbatim.
    Header(&'static str),
    /// A PO header field, upper-cased.
    HeaderUpper(&'static str),
    /// A line-item field.
    Item(&'static str),
    /// A line-item field, falling back to the header field of the same name.
    ItemOrHeader(&'static str),
}

impl ColumnRule {
    fn resolve(&self, record: &PurchaseOrderRecord, item: &LineItem) -> String {
        match *self {
            ColumnRule::Blank => String::new(),
            ColumnRule::Literal(v) => v.to_string(),
            ColumnRule::Header(f) => record.header(f).to_string(),
            ColumnRule::HeaderUpper(f) => record.header(f).to_uppercase(),
            ColumnRule::Item(f) => item.get(f).to_string(),
            ColumnRule::ItemOrHeader(f) => match item.get(f) {
                "" => record.header(f).to_string(),
                v => v.to_string(),
            },
        }
    }
}

use ColumnRule::{Header, HeaderUpper, Item, ItemOrHeader, Literal};

pub const LEVIS_COLUMNS: &[(Column, ColumnRule)] = &[
    (Column::ShipUnderPoRef, Header("ship_under_po_ref")),
    (Column::Buyer, Header("buyer_company")),
    (Column::Currency, Header("currency")),
    (Column::Season, Header("season")),
    (Column::CountryOfOrigin, Literal("INDIA")),
    (Column::PaymentTerms, Literal("TT 90 DAYS")),
    (Column::BuyerPoNum, Header("po_number")),
    (Column::SummaryBuyerOrderRef, Header("po_number")),
    (Column::MarketBuyerOrderRef, Header("ship_under_po_ref")),
    (Column::DestinationBuyerOrderRef, HeaderUpper("delivery_country")),
    (Column::DeliveryBuyerOrderRef, Header("po_number")),
    (Column::BuyerOrderDate, Header("buyer_order_date")),
    (Column::OrderType, Literal("Confirmed")),
    (Column::ModeOfShipment, Literal("SEA")),
    (Column::BuyerDeliveryDate, Header("buyer_delivery_date")),
    (Column::OcDeliveryDate, Header("buyer_delivery_date")),
    (Column::CountryOfFinalDestination, HeaderUpper("delivery_country")),
    (Column::FinalDestination, HeaderUpper("delivery_country")),
    (Column::Market, Literal("SOUTH-AMERICA")),
    (Column::BuyerStyleRef, Header("ship_under_po_ref")),
    (Column::Color, Header("ffc_description")),
    (Column::Size, Item("size")),
    (Column::TotalQty, Item("quantity")),
    (Column::Price, Header("unit_price")),
    (Column::Units, Item("quantity")),
    (Column::DeliveryTerms, Literal("FOB")),
];

pub const PVH_TOMMY_COLUMNS: &[(Column, ColumnRule)] = &[
    (Column::ShipUnderPoRef, Header("po_number")),
    (Column::Buyer, Literal("TOMMY HILFIGER EUROPE BV")),
    (Column::BuyerDivisionDept, Header("product_division")),
    (Column::Currency, Header("currency")),
    (Column::CountryOfOrigin, Literal("INDIA")),
    (Column::PlaceOfReceiptByPreCarrier, HeaderUpper("consignee")),
    (Column::PaymentTerms, Header("pay_terms")),
    (Column::BuyerPoNum, Header("po_number")),
    (Column::DestinationBuyerOrderRef, Header("po_number")),
    (Column::BuyerOrderDate, Header("buyer_order_date")),
    (Column::OrderType, Literal("Confirmed")),
    (Column::ModeOfShipment, Header("ship_mode")),
    (Column::BuyerDeliveryDate, Header("buyer_delivery_date")),
    (Column::OcDeliveryDate, Header("buyer_delivery_date")),
    (Column::CountryOfFinalDestination, HeaderUpper("consignee")),
    (Column::FinalDestination, HeaderUpper("consignee")),
    (Column::Market, HeaderUpper("buyer")),
    // Style and colour are printed per line item; a header-level value only
    // fills in when the model put it on the PO instead.
    (Column::BuyerStyleRef, ItemOrHeader("style")),
    (Column::PackingType, Header("pack_method")),
    (Column::Color, ItemOrHeader("ffc_description")),
    (Column::Size, Item("size")),
    (Column::TotalQty, Item("quantity")),
    (Column::Price, Item("cost")),
    (Column::Units, Item("total_units")),
    (Column::DeliveryTerms, Header("inco_terms")),
];

/// Map one record to rows: one per line item, or a single row built from an
/// empty line item when the record has none.
pub fn map_record(buyer: Buyer, record: &PurchaseOrderRecord) -> Vec<CanonicalRow> {
    let rules = buyer.profile().columns;
    let build = |item: &LineItem| {
        let mut row = CanonicalRow::blank();
        for (column, rule) in rules {
            row.set(*column, rule.resolve(record, item));
        }
        row
    };

    if record.line_items().is_empty() {
        vec![build(&LineItem::new())]
    } else {
        record.line_items().iter().map(build).collect()
    }
}

/// Map records in order, concatenating their rows.
pub fn map_records(buyer: Buyer, records: &[PurchaseOrderRecord]) -> Vec<CanonicalRow> {
    records.iter().flat_map(|r| map_record(buyer, r)).collect()
}
