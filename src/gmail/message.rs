//! Gmail message payload parsing

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MessagesListResponse {
    pub messages: Option<Vec<MessageInfo>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageInfo {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    pub snippet: Option<String>,
    /// Epoch milliseconds, serialized as a string by the API
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePartBody {
    pub data: Option<String>,
}

/// Look up a header by name, case-insensitively
pub fn header_value(payload: &MessagePart, name: &str) -> Option<String> {
    payload
        .headers
        .as_ref()?
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Extract a message body from the payload tree.
///
/// Prefers text/plain, falls back to text/html. Within a multipart walk
/// the last matching part wins.
pub fn extract_body(payload: &MessagePart) -> Option<String> {
    find_part(payload, "text/plain").or_else(|| find_part(payload, "text/html"))
}

fn find_part(part: &MessagePart, mime_type: &str) -> Option<String> {
    let mut found = None;

    if part.mime_type.as_deref() == Some(mime_type) {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
            if let Some(text) = decode_body(data) {
                found = Some(text);
            }
        }
    }

    if let Some(parts) = &part.parts {
        for child in parts {
            if let Some(text) = find_part(child, mime_type) {
                found = Some(text);
            }
        }
    }

    found
}

/// Decode a base64url-encoded body, falling back to the standard alphabet
fn decode_body(data: &str) -> Option<String> {
    let trimmed = data.trim();
    let decoded = URL_SAFE_NO_PAD
        .decode(trimmed.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(trimmed))
        .ok()?;
    String::from_utf8(decoded).ok()
}
