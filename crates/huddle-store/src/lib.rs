//! # huddle-store
//!
//! Persistence for Huddle: conversations, channels, members, reactions and
//! notifications, stored as whole JSON documents in a key/value backend.
//!
//! The default backend is SQLite ([`SqliteStore`]); [`MemoryStore`] keeps
//! everything in process. All reads and writes go through
//! [`ConversationRepository`], whose operations are split across modules
//! by concern.

pub mod backend;
pub mod channels;
pub mod database;
pub mod members;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod reactions;
pub mod repository;

mod collections;
mod error;

pub use backend::{KeyValueStore, MemoryStore, StoreChange};
pub use database::SqliteStore;
pub use error::{Result, StoreError};
pub use models::*;
pub use repository::ConversationRepository;
