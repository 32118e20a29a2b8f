//! Cross-component events consumed by the UI around the chat core.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use huddle_store::Notification;

pub const EVENT_NEW_NOTIFICATION: &str = "newNotification";
pub const EVENT_OPEN_CHAT: &str = "openChat";
pub const EVENT_SWITCH_TAB: &str = "switchTab";

const BUS_CAPACITY: usize = 64;

/// Request to open (or create) a DM, e.g. from a profile card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChatPayload {
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum AppEvent {
    NewNotification(Notification),
    OpenChat(OpenChatPayload),
    SwitchTab(String),
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::NewNotification(_) => EVENT_NEW_NOTIFICATION,
            AppEvent::OpenChat(_) => EVENT_OPEN_CHAT,
            AppEvent::SwitchTab(_) => EVENT_SWITCH_TAB,
        }
    }
}

/// Fire-and-forget event bus. Clones share listeners.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AppEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(listeners) => debug!(event = name, listeners, "Event emitted"),
            Err(_) => debug!(event = name, "Event emitted with no listeners"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        let event = AppEvent::OpenChat(OpenChatPayload {
            username: "@bob".into(),
            name: "Bob".into(),
            message: Some("hi".into()),
            avatar: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "openChat");
        assert_eq!(json["payload"]["username"], "@bob");
        assert!(json["payload"].get("avatar").is_none());

        let tab = serde_json::to_value(AppEvent::SwitchTab("chat".into())).unwrap();
        assert_eq!(tab["event"], EVENT_SWITCH_TAB);
    }

    #[tokio::test]
    async fn listeners_receive_events() {
        let bus = EventBus::new();
        bus.emit(AppEvent::SwitchTab("lost".into()));

        let mut rx = bus.subscribe();
        bus.clone().emit(AppEvent::SwitchTab("chat".into()));
        assert_eq!(rx.recv().await.unwrap(), AppEvent::SwitchTab("chat".into()));
    }
}
