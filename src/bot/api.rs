//! Minimal Telegram Bot API client over reqwest.
//!
//! Only the five methods the service needs: `getMe`, `getUpdates`,
//! `sendMessage`, `getFile`, plus the file-download endpoint. Every call
//! returns the API's `{ok, result, description, error_code}` envelope
//! unwrapped into `Result`, with HTTP 409 — another process consuming the
//! same update feed — preserved in [`BotApiError::Api`] so the connector can
//! classify it.
//!
//! The base URL is injectable to support local bot-API servers and tests.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport/API failures talking to Telegram.
///
/// Never fatal to the process: the connector maps these onto its backoff
/// state machine.
#[derive(Debug, Error)]
pub enum BotApiError {
    /// Network-level failure (DNS, connect, timeout, TLS).
    #[error("telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with `ok: false`.
    #[error("telegram API error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    /// The response did not match the documented envelope.
    #[error("malformed telegram response: {detail}")]
    Malformed { detail: String },
}

/// Telegram Bot API client.
pub struct BotClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl BotClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: base_url.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &impl Serialize,
        timeout: Duration,
    ) -> Result<T, BotApiError> {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await?;

        // Telegram sends the JSON envelope on error statuses too (including
        // the 409 conflict), so decode the body before looking at the status.
        let envelope: ApiEnvelope<T> =
            response.json().await.map_err(|e| BotApiError::Malformed {
                detail: format!("{method}: {e}"),
            })?;

        if !envelope.ok {
            return Err(BotApiError::Api {
                code: envelope.error_code,
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        envelope.result.ok_or_else(|| BotApiError::Malformed {
            detail: format!("{method}: ok but no result"),
        })
    }

    /// Validate the token and identify the bot account.
    pub async fn get_me(&self) -> Result<User, BotApiError> {
        self.call("getMe", &serde_json::json!({}), Duration::from_secs(30))
            .await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, BotApiError> {
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        // Request timeout must outlast the server-side poll window.
        self.call(
            "getUpdates",
            &payload,
            Duration::from_secs(timeout_secs + 15),
        )
        .await
    }

    /// Send a plain-text message to a chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotApiError> {
        let payload = serde_json::json!({ "chat_id": chat_id, "text": text });
        let _: Message = self
            .call("sendMessage", &payload, Duration::from_secs(30))
            .await?;
        Ok(())
    }

    /// Resolve a `file_id` to a downloadable path on the file endpoint.
    pub async fn get_file(&self, file_id: &str) -> Result<FileInfo, BotApiError> {
        let payload = serde_json::json!({ "file_id": file_id });
        self.call("getFile", &payload, Duration::from_secs(30)).await
    }

    /// Download a file (path from [`BotClient::get_file`]) to `dest`.
    pub async fn download_file(&self, file_path: &str, dest: &Path) -> Result<(), BotApiError> {
        let response = self
            .http
            .get(self.file_url(file_path))
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotApiError::Api {
                code: Some(response.status().as_u16() as i64),
                description: format!("file download failed for '{file_path}'"),
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| BotApiError::Malformed {
                detail: format!("cannot write download to '{}': {e}", dest.display()),
            })?;

        debug!("Downloaded {} bytes to {}", bytes.len(), dest.display());
        Ok(())
    }
}

// ── Wire types (subset of the Bot API the service consumes) ──────────────

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
    /// Telegram sends photos as size variants, smallest first.
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_and_file_urls_embed_the_token() {
        let client = BotClient::new("123:abc", "https://api.telegram.org");
        assert_eq!(
            client.method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
        assert_eq!(
            client.file_url("documents/file_1.pdf"),
            "https://api.telegram.org/file/bot123:abc/documents/file_1.pdf"
        );
    }

    #[test]
    fn update_with_document_deserialises() {
        let json = r#"{
            "update_id": 42,
            "message": {
                "chat": {"id": 7},
                "document": {
                    "file_id": "doc-1",
                    "file_name": "scan.pdf",
                    "mime_type": "application/pdf"
                }
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 42);
        let msg = update.message.unwrap();
        assert_eq!(msg.chat.id, 7);
        assert_eq!(msg.document.unwrap().mime_type.as_deref(), Some("application/pdf"));
        assert!(msg.photo.is_none());
    }

    #[test]
    fn conflict_envelope_surfaces_code_409() {
        let json = r#"{"ok": false, "error_code": 409,
            "description": "Conflict: terminated by other getUpdates request"}"#;
        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error_code, Some(409));
    }
}
