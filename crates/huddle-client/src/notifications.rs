use tracing::{info, warn};

use huddle_store::{ConversationRepository, Notification};

use crate::events::{AppEvent, EventBus};

/// Persists in-app alerts and announces them on the event bus.
#[derive(Clone)]
pub struct NotificationEmitter {
    repo: ConversationRepository,
    bus: EventBus,
}

impl NotificationEmitter {
    pub fn new(repo: ConversationRepository, bus: EventBus) -> Self {
        Self { repo, bus }
    }

    /// Store and announce a notification. Never fails: a storage error is
    /// logged and the event still goes out.
    pub fn notify(&self, kind: &str, title: &str, message: &str) -> Notification {
        let notification = Notification::new(kind, title, message);
        if let Err(e) = self.repo.push_notification(notification.clone()) {
            warn!(error = %e, kind, "Failed to store notification");
        }
        info!(id = %notification.id, kind, "New notification");
        self.bus.emit(AppEvent::NewNotification(notification.clone()));
        notification
    }
}
