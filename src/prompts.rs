//! Extraction prompts, one per buyer template.
//!
//! Every prompt asks for the same shape of answer: a JSON array with one
//! object per purchase order, header fields at the top level and a nested
//! `line_items` array. Field names differ per buyer and must line up with the
//! rules in [`crate::pipeline::mapper`]; the tests at the bottom of this file
//! check that they do.
//!
//! Prompts are static data. Nothing is interpolated at runtime.

use crate::buyer::Buyer;
use crate::error::PipelineError;

macro_rules! preamble {
    () => {
        r#"You are an expert at extracting structured data from Purchase Order PDFs. Extract ALL Purchase Orders from this document.

**CRITICAL INSTRUCTIONS:**
1. Split documents by PO NUMBER - each unique PO NUMBER is a separate Purchase Order
2. For each PO, extract ONLY the fields listed below - set fields to empty string if not found
3. Create one row per line item (size/quantity combination)
4. DO NOT use default values unless I explicitly specify them

"#
    };
}

macro_rules! output_rules {
    () => {
        r#"
**IMPORTANT:**
- Return ONLY valid JSON array
- No explanations or markdown
- Empty string for missing fields, never null
- One object per PO, with line_items array
- Extract ALL line items with their actual sizes and quantities
"#
    };
}

/// Prompt for Levi Strauss purchase orders.
pub const LEVIS_PROMPT: &str = concat!(
    preamble!(),
    r#"**EXTRACT THESE FIELDS PER PO:**

**Header Fields (same for all line items in a PO):**
- "po_number": Extract from "Purchase Order#", "PO NUMBER", or similar
- "buyer_company": Look for the "Invoice To" section first and take the company name from there. If there is no "Invoice To" section, take the first company name in the top-left area of the document, below any logos. Never use the "IMPORTER OF RECORD" section.
- "season": Extract from "Season" or "Season Code" (numbers only)
- "currency": Extract from "Currency" or "PO Currency" (USD, EUR, etc.)
- "buyer_order_date": Extract from "DocDate" or "PO Release Date" (format: DD.MM.YYYY)
- "buyer_delivery_date": Extract ONLY from the "Planned HOD", "Original Ex-facDate" or "Planned Ex-fac Date" column. If none of those is present, set to empty string.
- "ship_under_po_ref": Extract from the "Generic Material", "Material" or "Product" column, using the BASE code WITHOUT size suffix (e.g. "72625-0110" not "72625-0110M")
- "delivery_country": Extract ONLY the country name from "Delivery Address"
- "unit_price": Extract from "PO Unit Price"
- "ffc_description": Extract from the "FFC DESCRIPTION" field only. If it is not present, set to empty string.

**Line Item Fields (per size/quantity row):**
- "variant_material_code": Full material code with size suffix (e.g. "72625-0110M")
- "base_material_code": BASE material code WITHOUT size suffix (e.g. "72625-0110")
- "description": Product description
- "size": Size (M, L, XL, CH, EG, G, etc.)
- "quantity": Quantity for this size
- "item_total": Total value for this line item

**IMPORTANT FOR DATE EXTRACTION:**
- IGNORE "Planned Del. Date", "Planned Delivery Date" and "Planned Cut Date"
- If no "Planned HOD", "Original Ex-facDate" or "Planned Ex-fac Date" column exists, leave buyer_delivery_date empty

**IMPORTANT FOR COLOR EXTRACTION:**
- IGNORE "FFC CODE", "Description" and "Material Description" for ffc_description
- If no "FFC DESCRIPTION" column exists, leave ffc_description empty

**IMPORTANT FOR MATERIAL CODES:**
- "ship_under_po_ref" is always the BASE code (no letters at the end)
- "base_material_code" in line items should match "ship_under_po_ref"

**EXAMPLE OUTPUT FORMAT:**
[
  {
    "po_number": "4531021625",
    "buyer_company": "Levi Strauss Global Trading Co. Ltd",
    "season": "251",
    "currency": "USD",
    "buyer_order_date": "13.06.2024",
    "buyer_delivery_date": "10.10.2024",
    "ship_under_po_ref": "A5772-0014",
    "delivery_country": "KOREA",
    "unit_price": "9.78",
    "ffc_description": "WASHINGTON STRIPE II",
    "line_items": [
      {
        "variant_material_code": "A5772-0014",
        "base_material_code": "A5772-0014",
        "description": "CLASSIC WORKER -WORKWEAR WASHINGTON STRI",
        "size": "M",
        "quantity": "150",
        "item_total": "1467.00"
      }
    ]
  }
]
"#,
    output_rules!(),
    r#"- Always use BASE material codes for "ship_under_po_ref"
- For dates, be specific: "Original Ex-facDate", NOT "Planned Del. Date"
"#
);

/// Prompt for PVH / Tommy Hilfiger purchase orders.
pub const PVH_TOMMY_PROMPT: &str = concat!(
    preamble!(),
    r#"**EXTRACT THESE FIELDS PER PO:**

**Header Fields (same for all line items in a PO):**
- "po_number": Extract from the "PO Number:" field at the top of the document
- "product_division": Extract from "Product Division"
- "currency": Extract from "Currency" (USD, EUR, etc.)
- "pay_terms": Extract from "Pay Terms"
- "ship_mode": Extract from "Ship Mode"
- "style": Extract from "Style #"
- "pack_method": Extract from "Pack Method"
- "buyer": Extract the country name from the "Buyer" field in the top-left section
- "consignee": Extract the country name from the "CONSIGNEE" field (often printed vertically)
- "buyer_order_date": Extract from "PO Issue Date", converting YYYY/MM/DD to DD.MM.YYYY (e.g. "2025/08/18" becomes "18.08.2025")
- "buyer_delivery_date": Extract from "At Cons Date", converting YYYYMMDD to DD.MM.YYYY (e.g. "20251203" becomes "03.12.2025"). If not present, set to empty string.
- "ffc_description": Extract from the "Color Description" column
- "inco_terms": Extract from the "Inco Terms" column

**Line Item Fields (per size/quantity row):**
- "size": The "Size/Dim" column header (XS, S, M, L, XL, XXL, etc.)
- "quantity": The quantity for this size from the "Qty" row of the size breakdown table
- "cost": The cost for this size from the "Cost" row of the size breakdown table
- "total_units": The "Total Units [NUMBER]" value printed at the BOTTOM of the size breakdown table this line item belongs to, digits only, commas removed
- "style" and "ffc_description": Repeat them on the line item when a PO has several styles or colors

**IMPORTANT FOR SIZE EXTRACTION:**
- Each size column with a quantity is a separate line item
- Use the exact size from the column header

**IMPORTANT FOR TOTAL UNITS:**
- A PO with a SINGLE size breakdown table: every line item gets that table's total
- A PO with MULTIPLE tables (different Line#, colors): each group of line items gets the total from ITS OWN table
- DO NOT sum tables together

**EXAMPLE OUTPUT FORMAT:**
[
  {
    "po_number": "4300158881",
    "product_division": "TH MENSWEAR",
    "currency": "USD",
    "pay_terms": "NET 60",
    "ship_mode": "SEA",
    "style": "MW0MW42860",
    "pack_method": "FLAT",
    "buyer": "NETHERLANDS",
    "consignee": "GERMANY",
    "buyer_order_date": "18.08.2025",
    "buyer_delivery_date": "03.12.2025",
    "ffc_description": "Swt Bl / Strp",
    "inco_terms": "FOB",
    "line_items": [
      { "size": "XS", "quantity": "11", "cost": "10.40", "total_units": "657" },
      { "size": "S", "quantity": "32", "cost": "10.40", "total_units": "657" }
    ]
  }
]
"#,
    output_rules!(),
    r#"- Each size in the breakdown table is a separate line item
- If a PO has several tables, each table group has its own "total_units"
"#
);

/// The prompt for a buyer.
pub fn prompt_for(buyer: Buyer) -> &'static str {
    buyer.profile().prompt
}

/// The prompt for a stored buyer identifier.
pub fn prompt_for_id(id: &str) -> Result<&'static str, PipelineError> {
    Buyer::from_id(id).map(prompt_for)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mapper::ColumnRule;

    #[test]
    fn prompts_demand_bare_json_array() {
        for buyer in Buyer::ALL {
            let p = prompt_for(buyer);
            assert!(p.contains("Return ONLY valid JSON array"));
            assert!(p.contains("Empty string for missing fields, never null"));
            assert!(p.contains("line_items"));
        }
    }

    #[test]
    fn prompts_differ_per_buyer() {
        assert_ne!(prompt_for(Buyer::Levis), prompt_for(Buyer::PvhTommy));
        assert!(prompt_for(Buyer::Levis).contains("FFC DESCRIPTION"));
        assert!(prompt_for(Buyer::PvhTommy).contains("Total Units"));
    }

    #[test]
    fn unknown_id_fails() {
        assert!(prompt_for_id("levis").is_ok());
        assert!(matches!(
            prompt_for_id("acme"),
            Err(PipelineError::UnknownBuyer(_))
        ));
    }

    #[test]
    fn every_mapped_field_is_requested() {
        for buyer in Buyer::ALL {
            let prompt = prompt_for(buyer);
            for (column, rule) in buyer.profile().columns {
                let field = match rule {
                    ColumnRule::Header(f)
                    | ColumnRule::HeaderUpper(f)
                    | ColumnRule::Item(f)
                    | ColumnRule::ItemOrHeader(f) => f,
                    ColumnRule::Literal(_) | ColumnRule::Blank => continue,
                };
                assert!(
                    prompt.contains(&format!("\"{field}\"")),
                    "{buyer}: column {} reads \"{field}\" which the prompt never asks for",
                    column.key()
                );
            }
        }
    }
}
