use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::CompletionService;
use crate::config::GeminiConfig;
use crate::error::AnalysisError;
use crate::models::{AnalysisRequest, GenerationConfig};

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts joined.
    fn into_text(self) -> Result<String, AnalysisError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(AnalysisError::EmptyResponse { reason: block_reason });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse {
                reason: candidate.finish_reason.or(block_reason),
            });
        }

        Ok(text)
    }
}

/// Client for Gemini's `generateContent` endpoint.
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait::async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        if self.config.has_placeholder_key() {
            log::error!("❌ Gemini API key is not configured, refusing to send request");
            return Err(AnalysisError::Configuration(
                "Please configure your Gemini API key (GEMINI_API_KEY)".to_string(),
            ));
        }

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &request.image.media_type,
                            data: &request.image.data,
                        },
                    },
                ],
            }],
            generation_config: request.generation,
        };

        log::info!(
            "🤖 Sending label {} to Gemini with model: {}",
            &request.image.fingerprint[..12.min(request.image.fingerprint.len())],
            self.config.model
        );
        log::debug!("📤 Inline image payload: {} bytes", request.image.data.len());

        // The key travels in the query string, so URLs are stripped from transport errors.
        let response = self
            .client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Http(e.without_url()))?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        let response_text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Http(e.without_url()))?;

        if !status.is_success() {
            log::error!("❌ Gemini API error response: {}", response_text);
            return Err(AnalysisError::Upstream {
                status: status.as_u16(),
                body: response_text,
            });
        }

        log::debug!("📄 Raw Gemini response size: {} bytes", response_text.len());

        let envelope: GenerateContentResponse = match serde_json::from_str(&response_text) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::error!("❌ Gemini returned a non-JSON success body: {}", e);
                return Err(AnalysisError::Upstream {
                    status: status.as_u16(),
                    body: response_text,
                });
            }
        };

        let text = envelope.into_text()?;
        log::info!("💬 Gemini completion received ({} chars)", text.len());

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PLACEHOLDER_API_KEY;
    use crate::error::ErrorKind;
    use crate::models::EncodedImage;
    use crate::services::prompt::build_prompt;
    use axum::{
        extract::{Query, State},
        http::StatusCode,
        Json, Router,
    };
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct Stub {
        status: u16,
        body: &'static str,
        hits: Arc<AtomicUsize>,
        last_key: Arc<Mutex<Option<String>>>,
        last_body: Arc<Mutex<Option<Value>>>,
    }

    async fn stub_handler(
        State(stub): State<Stub>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, &'static str) {
        stub.hits.fetch_add(1, Ordering::SeqCst);
        *stub.last_key.lock().unwrap() = query.get("key").cloned();
        *stub.last_body.lock().unwrap() = Some(body);
        (StatusCode::from_u16(stub.status).unwrap(), stub.body)
    }

    /// Serves `body` with `status` for every request on a random local port.
    async fn spawn_stub(status: u16, body: &'static str) -> (String, Stub) {
        let stub = Stub {
            status,
            body,
            hits: Arc::new(AtomicUsize::new(0)),
            last_key: Arc::new(Mutex::new(None)),
            last_body: Arc::new(Mutex::new(None)),
        };
        let app = Router::new().fallback(stub_handler).with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1beta", addr), stub)
    }

    fn client_for(base: &str, key: &str) -> GeminiClient {
        let mut config = GeminiConfig::new(key);
        config.api_base = base.to_string();
        GeminiClient::new(config).unwrap()
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            prompt: build_prompt(),
            image: EncodedImage {
                media_type: "image/png".to_string(),
                data: "iVBORw0KGgo=".to_string(),
                fingerprint: "ab".repeat(32),
            },
            generation: GenerationConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_placeholder_key_makes_no_network_call() {
        let (base, stub) = spawn_stub(200, "{}").await;
        let client = client_for(&base, PLACEHOLDER_API_KEY);

        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sends_prompt_image_and_key() {
        let (base, stub) = spawn_stub(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"```json\n{}\n```"}],"role":"model"},"finishReason":"STOP"}]}"#,
        )
        .await;
        let client = client_for(&base, "test-key");

        let text = client.complete(&request()).await.unwrap();

        assert_eq!(text, "```json\n{}\n```");
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
        assert_eq!(stub.last_key.lock().unwrap().as_deref(), Some("test-key"));

        let body = stub.last_body.lock().unwrap().clone().unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], build_prompt());
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "iVBORw0KGgo=");
        assert_eq!(body["generationConfig"]["topK"], 32);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_body() {
        let (base, _stub) = spawn_stub(403, r#"{"error":{"message":"API key not valid"}}"#).await;
        let client = client_for(&base, "bad-key");

        match client.complete(&request()).await {
            Err(AnalysisError::Upstream { status, body }) => {
                assert_eq!(status, 403);
                assert!(body.contains("API key not valid"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_candidate_text_is_empty_response() {
        let (base, _stub) = spawn_stub(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"  "}]},"finishReason":"MAX_TOKENS"}]}"#,
        )
        .await;
        let client = client_for(&base, "test-key");

        match client.complete(&request()).await {
            Err(AnalysisError::EmptyResponse { reason }) => {
                assert_eq!(reason.as_deref(), Some("MAX_TOKENS"))
            }
            other => panic!("expected empty response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_response() {
        let (base, _stub) =
            spawn_stub(200, r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).await;
        let client = client_for(&base, "test-key");

        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResponse);
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_upstream_error() {
        let (base, _stub) = spawn_stub(200, "not json").await;
        let client = client_for(&base, "test-key");

        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        match err {
            AnalysisError::Upstream { status, body } => {
                assert_eq!(status, 200);
                assert_eq!(body, "not json");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error_without_key() {
        // Reserve a free port, then close it so the connection is refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = client_for(&format!("http://127.0.0.1:{}/v1beta", port), "secret-key");

        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!err.to_string().contains("secret-key"));
    }

    #[test]
    fn test_joins_text_parts_of_first_candidate() {
        let envelope: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}},{"content":{"parts":[{"text":"other"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.into_text().unwrap(), "{\"a\":1}");
    }
}
