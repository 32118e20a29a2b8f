//! # huddle-shared
//!
//! Types shared by every huddle crate: identity and id newtypes, the
//! signaling envelope that travels over the broadcast hub, and the
//! constants both the store and the call layer agree on.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use types::{CallType, ChannelId, ConversationId, Identity, MessageId, SessionId};
