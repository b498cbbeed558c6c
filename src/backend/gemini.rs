//! Direct Gemini `generateContent` REST backend.
//!
//! Request shape:
//!
//! ```text
//! POST {endpoint}/models/{model}:generateContent?key={api_key}
//! {
//!   "contents": [{ "parts": [ { "text": prompt },
//!                             { "inlineData": { "mimeType": ..., "data": base64 } } ] }],
//!   "generationConfig": { "temperature": 0.1, "maxOutputTokens": 8192 }
//! }
//! ```
//!
//! The completion text is `candidates[0].content.parts[0].text`. HTTP 503 is
//! the service's overload signal and the only status reported as retryable.

use super::{InferenceBackend, InferenceRequest};
use crate::config::ExtractionConfig;
use crate::error::{BackendError, PipelineError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Calls the Gemini REST API with the document inlined.
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    pub fn new(config: &ExtractionConfig) -> Result<Self, PipelineError> {
        if config.api_key.is_empty() {
            return Err(PipelineError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: "Set GOOGLE_GEMINI_API_KEY or pass --api-key.".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl InferenceBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<String, BackendError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: &request.prompt,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.document.mime_type,
                            data: &request.document.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        debug!("Gemini responded {}", status);

        if status == StatusCode::SERVICE_UNAVAILABLE {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Overloaded(truncate(&text)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("invalid response body: {e}")))?;

        Ok(parsed.first_text())
    }
}

// ── Wire types ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 500;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::InlineDocument;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (format!("http://{addr}/v1beta"), handle)
    }

    fn backend(endpoint: &str) -> GeminiBackend {
        let config = ExtractionConfig::builder()
            .api_endpoint(endpoint)
            .api_key("k-123")
            .build()
            .unwrap();
        GeminiBackend::new(&config).unwrap()
    }

    fn request() -> InferenceRequest {
        InferenceRequest {
            prompt: "Extract".to_string(),
            document: InlineDocument {
                mime_type: "application/pdf",
                data: "JVBERi0=".to_string(),
            },
            temperature: 0.1,
            max_output_tokens: 8192,
        }
    }

    #[tokio::test]
    async fn sends_inline_document_and_reads_first_part() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"[]"}]}}]}"#,
        )
        .await;
        let text = backend(&endpoint).complete(&request()).await.unwrap();
        assert_eq!(text, "[]");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent?key=k-123 "));
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Extract");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[1]["inlineData"]["data"], "JVBERi0=");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[tokio::test]
    async fn service_unavailable_is_overload() {
        let (endpoint, _server) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let err = backend(&endpoint).complete(&request()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn other_statuses_are_final() {
        let (endpoint, _server) = serve_once("400 Bad Request", r#"{"error":"bad"}"#).await;
        let err = backend(&endpoint).complete(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 400, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn missing_candidates_read_as_empty() {
        let (endpoint, _server) = serve_once("200 OK", r#"{"promptFeedback":{}}"#).await;
        let text = backend(&endpoint).complete(&request()).await.unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn requires_api_key() {
        let err = GeminiBackend::new(&ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "x".repeat(600);
        assert_eq!(truncate(&long).chars().count(), 501);
        assert_eq!(truncate("short"), "short");
    }
}
