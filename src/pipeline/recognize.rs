//! Recognition client: submit one image to the hosted vision model.
//!
//! Local files travel as base64 data URLs inside the chat-completions
//! request body; images already reachable by URL are passed through
//! untouched. The request carries the fixed prompt from [`crate::prompts`]
//! telling the model to answer with raw Markdown and nothing else.
//!
//! There is deliberately no retry here: a failed recognition propagates to
//! the pipeline, which discards the whole file. Retrying would multiply API
//! cost on systematically-failing inputs (corrupt pages, quota exhaustion)
//! without helping the common case.

use crate::error::StageError;
use crate::pipeline::Recognizer;
use crate::prompts::RECOGNITION_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout. Vision inference on a dense page can take tens of
/// seconds; two minutes is the point past which the call is considered dead.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The production [`Recognizer`], backed by the Together AI
/// chat-completions endpoint.
pub struct VisionOcr {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl VisionOcr {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    async fn submit(&self, image_url: String) -> Result<String, StageError> {
        let err = |detail: String| StageError::Recognition { detail };

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: RECOGNITION_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    err("request timed out".to_string())
                } else {
                    err(format!("transport error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(err(format!("HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| err(format!("malformed response: {e}")))?;

        let markdown = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if markdown.trim().is_empty() {
            return Err(err("empty response from vision model".to_string()));
        }

        debug!("Recognition returned {} chars", markdown.len());
        Ok(markdown)
    }
}

#[async_trait]
impl Recognizer for VisionOcr {
    async fn recognize_file(&self, image: &Path) -> Result<String, StageError> {
        let bytes = tokio::fs::read(image).await.map_err(|e| StageError::Recognition {
            detail: format!("cannot read '{}': {e}", image.display()),
        })?;
        self.submit(data_url(image, &bytes)).await
    }

    async fn recognize_url(&self, url: &str) -> Result<String, StageError> {
        self.submit(url.to_string()).await
    }
}

/// Base64 data URL for a local image, MIME derived from the extension.
fn data_url(path: &Path, bytes: &[u8]) -> String {
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_picks_mime_from_extension() {
        let url = data_url(Path::new("page-1.png"), b"abc");
        assert!(url.starts_with("data:image/png;base64,"));

        let url = data_url(Path::new("norm-1.jpg"), b"abc");
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn request_serialises_to_openai_shape() {
        let body = ChatRequest {
            model: "test-model",
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "read this" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,QUJD".into(),
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
    }

    #[test]
    fn response_with_no_choices_parses() {
        let parsed: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn response_content_parses() {
        let parsed: ChatResponse = serde_json::from_str(
            r##"{"choices":[{"message":{"role":"assistant","content":"# Title"}}]}"##,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content, "# Title");
    }
}
