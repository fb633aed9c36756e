//! Per-message handling: dispatch inbound events, run the pipeline, reply.
//!
//! One explicit dispatch point instead of per-event callback registration:
//! the poll loop hands every message here, and the kind {text, document,
//! photo} selects the handler. All failures are answered in-chat and logged;
//! nothing propagates back into the receive loop.

use crate::bot::api::{BotApiError, BotClient, Document, Message, PhotoSize};
use crate::chunk::{split_into_chunks, MAX_CHUNK_CHARS};
use crate::error::ProcessingError;
use crate::process::{FilePipeline, SourceKind};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub const GREETING: &str = "Welcome! Send me any PDF document or image (JPEG, PNG) \
and I will convert it to text using OCR.";

pub const TEXT_HINT: &str = "Please send me a PDF document or image (JPEG, PNG) to \
convert it to text. I cannot process plain text messages.";

pub const UNSUPPORTED_NOTICE: &str = "Please send only PDF documents or images (JPEG, PNG).";

pub const PROCESSING_DOCUMENT: &str = "Processing your document...";
pub const PROCESSING_PHOTO: &str = "Processing your image...";

pub const DOCUMENT_APOLOGY: &str = "Sorry, there was an error processing your document. \
Please try again.";
pub const PHOTO_APOLOGY: &str = "Sorry, there was an error processing your image. \
Please try again.";

pub const PART_MISSING_NOTICE: &str = "Error sending part of the result. \
Some text might be missing.";

#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Api(#[from] BotApiError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    #[error("cannot stage download: {0}")]
    Staging(#[from] std::io::Error),
}

/// Route one inbound message to its handler.
pub async fn dispatch(
    client: &BotClient,
    pipeline: &FilePipeline,
    send_delay: Duration,
    message: Message,
) {
    let chat_id = message.chat.id;

    if let Some(document) = message.document {
        handle_document(client, pipeline, send_delay, chat_id, document).await;
    } else if let Some(photo) = message.photo {
        handle_photo(client, pipeline, send_delay, chat_id, photo).await;
    } else if let Some(text) = message.text {
        handle_text(client, chat_id, &text).await;
    }
}

async fn handle_text(client: &BotClient, chat_id: i64, text: &str) {
    let reply = if text.starts_with("/start") {
        GREETING
    } else if text.starts_with('/') {
        // Unknown command: stay quiet rather than spam every typo.
        return;
    } else {
        TEXT_HINT
    };
    if let Err(e) = client.send_message(chat_id, reply).await {
        error!("Failed to send text reply: {e}");
    }
}

async fn handle_document(
    client: &BotClient,
    pipeline: &FilePipeline,
    send_delay: Duration,
    chat_id: i64,
    document: Document,
) {
    let Some(kind) = document
        .mime_type
        .as_deref()
        .and_then(SourceKind::from_mime)
    else {
        send_or_log(client, chat_id, UNSUPPORTED_NOTICE).await;
        return;
    };

    info!(
        chat_id,
        name = document.file_name.as_deref().unwrap_or("<unnamed>"),
        "Inbound document"
    );
    send_or_log(client, chat_id, PROCESSING_DOCUMENT).await;

    match fetch_and_process(client, pipeline, &document.file_id, kind).await {
        Ok(markdown) => send_chunked(client, chat_id, &markdown, send_delay).await,
        Err(e) => {
            error!("Document processing failed: {e}");
            send_or_log(client, chat_id, DOCUMENT_APOLOGY).await;
        }
    }
}

async fn handle_photo(
    client: &BotClient,
    pipeline: &FilePipeline,
    send_delay: Duration,
    chat_id: i64,
    photo: Vec<PhotoSize>,
) {
    // Variants arrive smallest first; the last one is the full resolution.
    let Some(best) = photo.last() else { return };

    info!(chat_id, width = best.width, height = best.height, "Inbound photo");
    send_or_log(client, chat_id, PROCESSING_PHOTO).await;

    match fetch_and_process(client, pipeline, &best.file_id, SourceKind::Jpeg).await {
        Ok(markdown) => send_chunked(client, chat_id, &markdown, send_delay).await,
        Err(e) => {
            error!("Photo processing failed: {e}");
            send_or_log(client, chat_id, PHOTO_APOLOGY).await;
        }
    }
}

/// Download the attachment into an auto-deleted temp file, run the pipeline.
///
/// The `NamedTempFile` guard means the download never outlives this call,
/// whether the pipeline succeeds or not.
async fn fetch_and_process(
    client: &BotClient,
    pipeline: &FilePipeline,
    file_id: &str,
    kind: SourceKind,
) -> Result<String, HandlerError> {
    let info = client.get_file(file_id).await?;
    let remote_path = info.file_path.ok_or_else(|| BotApiError::Malformed {
        detail: format!("getFile returned no path for '{file_id}'"),
    })?;

    std::fs::create_dir_all(pipeline.work_dir())?;
    let temp = tempfile::Builder::new()
        .prefix("attachment-")
        .suffix(&format!(".{}", kind.extension()))
        .tempfile_in(pipeline.work_dir())?;

    client.download_file(&remote_path, temp.path()).await?;
    let markdown = pipeline.process_file(temp.path()).await?;
    Ok(markdown)
}

/// Deliver the result as sanitized chunks with a fixed inter-chunk delay to
/// stay under the outbound rate limit. A failed chunk produces a "part
/// missing" notice and delivery continues with the next chunk.
async fn send_chunked(client: &BotClient, chat_id: i64, markdown: &str, delay: Duration) {
    for chunk in split_into_chunks(markdown, MAX_CHUNK_CHARS) {
        if let Err(e) = client.send_message(chat_id, &chunk).await {
            error!("Failed to send result chunk: {e}");
            send_or_log(client, chat_id, PART_MISSING_NOTICE).await;
        }
        tokio::time::sleep(delay).await;
    }
}

async fn send_or_log(client: &BotClient, chat_id: i64, text: &str) {
    if let Err(e) = client.send_message(chat_id, text).await {
        error!("Failed to send notice: {e}");
    }
}
