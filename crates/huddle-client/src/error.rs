use thiserror::Error;

use huddle_media::CallError;
use huddle_store::StoreError;

use crate::attachments::AttachmentError;

/// Errors returned by the client command surface.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("No conversation selected")]
    NoConversation,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// Absent targets are empty states for the UI, not failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Store(StoreError::NotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
