//! The canonical export row: a fixed, ordered set of string columns.
//!
//! Spreadsheet generation downstream depends on the column count and order
//! never changing, so a row is a fixed-size array indexed by [`Column`], not a
//! map. Every cell is a `String`; unknown values are `""`, never absent.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of canonical columns.
pub const COLUMN_COUNT: usize = 48;

macro_rules! columns {
    ($( $variant:ident => $key:literal, $label:literal; )*) => {
        /// One canonical export column, in export order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Column {
            $( $variant, )*
        }

        impl Column {
            /// Every column in export order.
            pub const ALL: [Column; COLUMN_COUNT] = [ $( Column::$variant, )* ];

            /// Stable snake_case key used in JSON payloads.
            pub fn key(self) -> &'static str {
                match self {
                    $( Column::$variant => $key, )*
                }
            }

            /// Human-readable spreadsheet header.
            pub fn label(self) -> &'static str {
                match self {
                    $( Column::$variant => $label, )*
                }
            }

            pub fn from_key(key: &str) -> Option<Column> {
                match key {
                    $( $key => Some(Column::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

columns! {
    Factory => "factory", "Factory";
    ShipUnderPoRef => "ship_under_po_ref", "Ship Under PO Ref";
    Article => "article", "Article";
    Buyer => "buyer", "Buyer";
    BuyerDivisionDept => "buyer_division_dept", "Buyer Division/Dept";
    Currency => "currency", "Currency";
    Season => "season", "Season";
    CountryOfOrigin => "country_of_origin", "Country of Origin";
    PlaceOfReceiptByPreCarrier => "place_of_receipt_by_pre_carrier", "Place of Receipt by Pre-Carrier";
    ProdCapacityBookingNo => "prod_capacity_booking_no", "Prod. Capacity Booking No";
    OrderInitiationDate => "order_initiation_date", "Order Initiation Date";
    PaymentTerms => "payment_terms", "Payment Terms";
    BuyerPoNum => "buyer_po_num", "Buyer PO Num";
    SummaryBuyerOrderRef => "summary_buyer_order_ref", "Summary Buyer Order Ref";
    MarketBuyerOrderRef => "market_buyer_order_ref", "Market Buyer Order Ref";
    DestinationBuyerOrderRef => "destination_buyer_order_ref", "Destination Buyer Order Ref";
    DeliveryBuyerOrderRef => "delivery_buyer_order_ref", "Delivery Buyer Order Ref";
    BuyerOrderDate => "buyer_order_date", "Buyer Order Date";
    OrderType => "order_type", "Order Type";
    ModeOfShipment => "mode_of_shipment", "Mode of Shipment";
    BuyerDeliveryDate => "buyer_delivery_date", "Buyer Delivery Date";
    OcDeliveryDate => "oc_delivery_date", "OC Delivery Date";
    PcdDate => "pcd_date", "PCD Date";
    OriginalGacDate => "original_gac_date", "Original GAC Date";
    GacDate => "gac_date", "GAC Date";
    RawMaterialEta => "raw_material_eta", "Raw Material ETA";
    CountryOfFinalDestination => "country_of_final_destination", "Country of Final Destination";
    FinalDestination => "final_destination", "Final Destination";
    Market => "market", "Market";
    BuyerStyleRef => "buyer_style_ref", "Buyer Style Ref.";
    PackingType => "packing_type", "Packing Type";
    PackingOptionFlatPack => "packing_option_flat_pack", "Packing Option/Flat Pack)";
    Color => "color", "Color";
    Size => "size", "Size";
    TotalQty => "total_qty", "Total Qty";
    Price => "price", "Price";
    Units => "units", "Units";
    DeliveryTerms => "delivery_terms", "Delivery Terms";
    Zone => "zone", "Zone";
    InternalLotNo => "internal_lot_no", "Internal Lot No";
    BuyerLotNo => "buyer_lot_no", "Buyer Lot No";
    DeliveryOcid => "delivery_ocid", "Delivery OCID";
    FulfillmentType => "fulfillment_type", "Fulfillment Type";
    InitialPcdDate => "initial_pcd_date", "Initial PCD Date";
    FirstBuyerDeliveryDate => "first_buyer_delivery_date", "First Buyer Delivery Date";
    PackingCode => "packing_code", "Packing Code";
    MakeToStock => "make_to_stock", "Make To Stock";
    Split => "split", "Split";
}

impl Column {
    /// Position of this column in export order (0-based).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Export labels in column order, ready for a header row.
pub fn header_labels() -> [&'static str; COLUMN_COUNT] {
    Column::ALL.map(Column::label)
}

/// One output row: every canonical column, always present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalRow {
    values: [String; COLUMN_COUNT],
}

impl Default for CanonicalRow {
    fn default() -> Self {
        Self::blank()
    }
}

impl CanonicalRow {
    /// A row with every column set to `""`.
    pub fn blank() -> Self {
        Self {
            values: std::array::from_fn(|_| String::new()),
        }
    }

    pub fn get(&self, column: Column) -> &str {
        &self.values[column.index()]
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        self.values[column.index()] = value.into();
    }

    /// Cell values in export order.
    pub fn values(&self) -> &[String; COLUMN_COUNT] {
        &self.values
    }

    /// `(column, value)` pairs in export order.
    pub fn iter(&self) -> impl Iterator<Item = (Column, &str)> + '_ {
        Column::ALL
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (*c, v.as_str()))
    }
}

impl Serialize for CanonicalRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMN_COUNT))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column.key(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CanonicalRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = CanonicalRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of canonical column keys to strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut row = CanonicalRow::blank();
                while let Some(key) = access.next_key::<String>()? {
                    let value: Option<String> = access.next_value()?;
                    if let Some(column) = Column::from_key(&key) {
                        row.set(column, value.unwrap_or_default());
                    }
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}
