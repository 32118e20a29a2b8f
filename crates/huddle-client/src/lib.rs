//! # huddle-client
//!
//! One chat tab: the [`ChatClient`] command surface over the conversation
//! repository, the background [`sync`] loop that keeps the rendered view
//! current, call controls, mentions, attachments and the cross-component
//! event bus.

pub mod attachments;
pub mod commands;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod mentions;
pub mod notifications;
pub mod state;
pub mod sync;
pub mod tab;

pub use attachments::{AttachmentEncoder, AttachmentError, EncodedAttachment};
pub use commands::{CallController, CallStatus};
pub use config::{ClientConfig, StoreKind};
pub use directory::{Directory, Profile, StaticDirectory};
pub use error::{ClientError, Result};
pub use events::{AppEvent, EventBus, OpenChatPayload};
pub use mentions::MentionResolver;
pub use notifications::NotificationEmitter;
pub use state::ChatClient;
pub use sync::{spawn_sync_loop, SyncHandle, SyncLoop, SyncUpdate, SyncView};
