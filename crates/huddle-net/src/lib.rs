// Same-origin broadcast transport: named topics every tab can publish to and subscribe on.

pub mod hub;

pub use hub::{BroadcastHub, HubError, Topic};
