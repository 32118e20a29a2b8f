//! Turns picked files and recorded voice notes into inline attachments.
//!
//! The payload is a data URL (`data:<mime>;base64,<bytes>`) so the
//! attachment lives inside the message record and needs no blob storage.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use huddle_store::Attachment;

const DEFAULT_MIME: &str = "application/octet-stream";
const VOICE_MIME: &str = "audio/webm";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("Attachment is empty")]
    Empty,

    #[error("Attachment is {size} bytes, the limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid inline payload: {0}")]
    InvalidPayload(String),
}

/// An attachment plus the token shown in the message body for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAttachment {
    pub attachment: Attachment,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentEncoder {
    max_bytes: usize,
}

impl AttachmentEncoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn encode(&self, name: &str, mime_type: &str, data: &[u8]) -> Result<EncodedAttachment, AttachmentError> {
        let mime_type = match mime_type.trim() {
            "" => DEFAULT_MIME,
            mime => mime,
        };
        let name = match name.trim() {
            "" => "file",
            name => name,
        };
        self.build(name, mime_type, data, false)
    }

    /// Encode a recorded voice note. Non-audio mime types are replaced by
    /// `audio/webm`.
    pub fn encode_voice(
        &self,
        data: &[u8],
        mime_type: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> Result<EncodedAttachment, AttachmentError> {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| m.starts_with("audio/"))
            .unwrap_or(VOICE_MIME);
        let name = format!("voice-{}.webm", recorded_at.timestamp_millis());
        self.build(&name, mime_type, data, true)
    }

    fn build(&self, name: &str, mime_type: &str, data: &[u8], is_voice: bool) -> Result<EncodedAttachment, AttachmentError> {
        if data.is_empty() {
            return Err(AttachmentError::Empty);
        }
        if data.len() > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size: data.len(),
                max: self.max_bytes,
            });
        }

        let attachment = Attachment {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes: data.len() as u64,
            inline_payload: format!("data:{mime_type};base64,{}", STANDARD.encode(data)),
            is_voice,
        };
        let token = format!("{} {}", token_emoji(mime_type, is_voice), name);
        debug!(name, mime_type, size = data.len(), is_voice, "Attachment encoded");
        Ok(EncodedAttachment { attachment, token })
    }
}

impl Default for AttachmentEncoder {
    fn default() -> Self {
        Self::new(huddle_shared::constants::MAX_ATTACHMENT_SIZE)
    }
}

fn token_emoji(mime_type: &str, is_voice: bool) -> &'static str {
    if is_voice {
        return "🎤";
    }
    match mime_type.split('/').next().unwrap_or_default() {
        "image" => "🖼️",
        "video" => "🎬",
        "audio" => "🎵",
        _ if mime_type == "application/pdf" => "📄",
        _ => "📎",
    }
}

/// Append attachment tokens to the composed text, one space apart.
pub fn compose_body(text: &str, attachments: &[EncodedAttachment]) -> String {
    let mut body = text.trim().to_string();
    for encoded in attachments {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(&encoded.token);
    }
    body
}

/// Split a data URL back into its mime type and bytes.
pub fn decode_payload(payload: &str) -> Result<(String, Vec<u8>), AttachmentError> {
    let rest = payload
        .strip_prefix("data:")
        .ok_or_else(|| AttachmentError::InvalidPayload("not a data URL".into()))?;
    let (mime_type, data) = rest
        .split_once(";base64,")
        .ok_or_else(|| AttachmentError::InvalidPayload("not base64 encoded".into()))?;
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| AttachmentError::InvalidPayload(e.to_string()))?;
    Ok((mime_type.to_string(), bytes))
}
