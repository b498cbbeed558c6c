//! Shared fixtures for integration tests: in-memory PDFs, a scripted
//! inference backend and a zero-delay config.

#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, Stream};
use po_extract::{
    Backoff, BackendError, ExtractionConfig, ExtractionConfigBuilder, InferenceBackend,
    InferenceRequest,
};
use std::sync::{Arc, Mutex};

/// Build a PDF with one page per entry, each line drawn in Courier.
///
/// An empty entry produces a page with no text layer.
pub fn build_pdf(pages: &[Vec<String>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut content = String::new();
        for (i, line) in lines.iter().enumerate() {
            let y = 750 - 14 * i as i64;
            content.push_str(&format!("BT /F1 10 Tf 40 {y} Td ({line}) Tj ET\n"));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save test pdf");
    bytes
}

/// A Levi's order with one page per PO number.
pub fn levis_order(po_numbers: &[&str]) -> Vec<u8> {
    let pages: Vec<Vec<String>> = po_numbers
        .iter()
        .enumerate()
        .map(|(i, po)| {
            let mut lines = Vec::new();
            if i == 0 {
                lines.push("LEVI STRAUSS & CO.".to_string());
            }
            lines.push(format!("PO NUMBER {po}"));
            lines.push("Season S25".to_string());
            lines
        })
        .collect();
    build_pdf(&pages)
}

/// A single page with no text at all.
pub fn textless_pdf() -> Vec<u8> {
    build_pdf(&[Vec::new()])
}

/// JSON for `count` POs numbered from `first`, each with `items` line items.
pub fn po_json(first: u32, count: u32, items: u32) -> String {
    let records: Vec<serde_json::Value> = (first..first + count)
        .map(|po| {
            let line_items: Vec<serde_json::Value> = (0..items)
                .map(|i| {
                    serde_json::json!({
                        "size": format!("S{i}"),
                        "quantity": (10 * (i + 1)).to_string(),
                    })
                })
                .collect();
            serde_json::json!({
                "po_number": po.to_string(),
                "season": "S25",
                "line_items": line_items,
            })
        })
        .collect();
    serde_json::to_string(&records).expect("serialise fixture json")
}

/// Replays scripted results in order, then keeps returning the last one.
pub struct ScriptedBackend {
    script: Mutex<Vec<Result<String, BackendError>>>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: impl Into<String>) -> Arc<Self> {
        Self::new(vec![Ok(text.into())])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        }
    }
}

/// Builder preset with every delay at zero.
pub fn fast_config() -> ExtractionConfigBuilder {
    ExtractionConfig::builder()
        .api_key("test-key")
        .retry_backoff(Backoff::NONE)
        .batch_delay_ms(0)
}
