//! Turns attachment file references into inline base64 payloads.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::AttachmentReadError;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Extension (lowercase, no dot) to MIME type.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("csv", "text/csv"),
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("html", "text/html"),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
    ("md", "text/markdown"),
];

/// A validated reference to a file on the server's filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRequest {
    /// Always absolute.
    pub file_path: PathBuf,
    pub file_name: Option<String>,
}

impl AttachmentRequest {
    /// Name the recipient sees: the override, else the final path segment.
    pub fn display_name(&self) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None => self
                .file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.file_path.display().to_string()),
        }
    }
}

/// Serialized directly into the Postmark `Attachments` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncodedAttachment {
    pub name: String,
    pub content: String,
    pub content_type: &'static str,
}

/// MIME type for a path, by lowercase extension. Never empty.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_CONTENT_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Read and encode one file.
pub async fn encode(request: &AttachmentRequest) -> Result<EncodedAttachment, AttachmentReadError> {
    let bytes = tokio::fs::read(&request.file_path)
        .await
        .map_err(|source| AttachmentReadError {
            path: request.file_path.clone(),
            source,
        })?;

    let attachment = EncodedAttachment {
        name: request.display_name(),
        content: STANDARD.encode(&bytes),
        content_type: content_type_for(&request.file_path),
    };
    debug!(
        name = %attachment.name,
        content_type = attachment.content_type,
        bytes = bytes.len(),
        "Encoded attachment"
    );
    Ok(attachment)
}

/// Encode every request in order. The first unreadable file aborts the batch.
pub async fn resolve(
    requests: &[AttachmentRequest],
) -> Result<Vec<EncodedAttachment>, AttachmentReadError> {
    let mut encoded = Vec::with_capacity(requests.len());
    for request in requests {
        encoded.push(encode(request).await?);
    }
    Ok(encoded)
}
