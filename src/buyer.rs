//! The closed set of supported buyer templates.
//!
//! Each [`Buyer`] resolves, through [`Buyer::profile`], to a static
//! [`BuyerProfile`] carrying everything that differs between templates:
//! detection patterns, the extraction prompt, and the column mapping table.
//! Adding a buyer means adding a variant and one profile entry; no dispatch
//! code changes.

use crate::error::PipelineError;
use crate::pipeline::mapper::{ColumnRule, LEVIS_COLUMNS, PVH_TOMMY_COLUMNS};
use crate::prompts::{LEVIS_PROMPT, PVH_TOMMY_PROMPT};
use crate::row::Column;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported buyer template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Buyer {
    /// Levi Strauss purchase orders.
    Levis,
    /// PVH / Tommy Hilfiger purchase orders.
    PvhTommy,
}

/// Static, per-template data.
#[derive(Debug)]
pub struct BuyerProfile {
    pub buyer: Buyer,
    /// Stable identifier stored on documents (`"levis"`, `"pvh_tommy"`).
    pub id: &'static str,
    pub display_name: &'static str,
    /// Case-insensitive regex sources tested against the first pages' text.
    pub detection_patterns: &'static [&'static str],
    /// Extraction instructions sent with the document.
    pub prompt: &'static str,
    /// Column sources; columns not listed map to `""`.
    pub columns: &'static [(Column, ColumnRule)],
}

static PROFILES: [BuyerProfile; 2] = [
    BuyerProfile {
        buyer: Buyer::Levis,
        id: "levis",
        display_name: "Levi Strauss",
        detection_patterns: &[r"LEVIS", r"LEVI\s+STRAUSS"],
        prompt: LEVIS_PROMPT,
        columns: LEVIS_COLUMNS,
    },
    BuyerProfile {
        buyer: Buyer::PvhTommy,
        id: "pvh_tommy",
        display_name: "PVH Tommy Hilfiger",
        detection_patterns: &[r"PVH", r"TOMMY\s+HILFIGER"],
        prompt: PVH_TOMMY_PROMPT,
        columns: PVH_TOMMY_COLUMNS,
    },
];

impl Buyer {
    /// All buyers in detection order. The first match wins.
    pub const ALL: [Buyer; 2] = [Buyer::Levis, Buyer::PvhTommy];

    /// Look up the static profile for this buyer.
    pub fn profile(self) -> &'static BuyerProfile {
        match self {
            Buyer::Levis => &PROFILES[0],
            Buyer::PvhTommy => &PROFILES[1],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.profile().id
    }

    /// Resolve a stored identifier, failing for anything outside the set.
    pub fn from_id(id: &str) -> Result<Buyer, PipelineError> {
        Buyer::ALL
            .into_iter()
            .find(|b| b.as_str() == id.trim())
            .ok_or_else(|| PipelineError::UnknownBuyer(id.to_string()))
    }
}

impl fmt::Display for Buyer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Buyer {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Buyer::from_id(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_line_up_with_variants() {
        for buyer in Buyer::ALL {
            assert_eq!(buyer.profile().buyer, buyer);
        }
    }

    #[test]
    fn ids_round_trip() {
        assert_eq!("levis".parse::<Buyer>().unwrap(), Buyer::Levis);
        assert_eq!(Buyer::from_id("pvh_tommy").unwrap(), Buyer::PvhTommy);
        assert_eq!(Buyer::PvhTommy.to_string(), "pvh_tommy");
    }

    #[test]
    fn unknown_id_is_an_error() {
        let err = Buyer::from_id("gap").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownBuyer(ref id) if id == "gap"));
    }

    #[test]
    fn serde_uses_stored_identifier() {
        assert_eq!(serde_json::to_string(&Buyer::PvhTommy).unwrap(), r#""pvh_tommy""#);
        let b: Buyer = serde_json::from_str(r#""levis""#).unwrap();
        assert_eq!(b, Buyer::Levis);
    }
}
