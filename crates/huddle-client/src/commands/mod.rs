//! Command handlers of the [`ChatClient`](crate::state::ChatClient).
//!
//! Each sub-module adds an `impl ChatClient` block (or a controller built
//! from one) for a related group of commands.

pub mod channels;
pub mod media;
pub mod messaging;

pub use media::{CallController, CallStatus};
