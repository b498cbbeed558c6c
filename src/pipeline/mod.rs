//! Pipeline stages for purchase-order extraction.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ detect ──▶ split ──▶ encode ──▶ llm ──▶ mapper
//! (copy)    (buyer)    (batches) (base64)  (JSON)  (rows)
//!                                           │
//!                                           └─▶ fallback (text layer, opt-in)
//! ```
//!
//! 1. [`input`]: validate the stored file and write the transient working copy
//! 2. [`text`]: lopdf text layer shared by detection, splitting and fallback
//! 3. [`detect`]: match buyer patterns on the first pages
//! 4. [`split`]: find PO markers and cut page-range batches; runs in
//!    `spawn_blocking` because lopdf is synchronous
//! 5. [`encode`]: base64-wrap the document for the inline request part
//! 6. [`llm`]: one request with overload retry; the only stage with
//!    network I/O
//! 7. [`mapper`]: buyer column tables from records to canonical rows
//! 8. [`fallback`]: regex parser over the text layer

pub mod detect;
pub mod encode;
pub mod fallback;
pub mod input;
pub mod llm;
pub mod mapper;
pub mod split;
pub mod text;
