//! The `notifications` collection: newest first, capped.

use tracing::debug;

use huddle_shared::constants::{KEY_NOTIFICATIONS, MAX_NOTIFICATIONS};

use crate::collections;
use crate::error::{Result, StoreError};
use crate::models::Notification;
use crate::repository::ConversationRepository;

impl ConversationRepository {
    /// Newest first.
    pub fn notifications(&self) -> Result<Vec<Notification>> {
        collections::load_list(self.store(), KEY_NOTIFICATIONS)
    }

    /// Prepend `notification`, dropping the oldest entries past the cap.
    pub fn push_notification(&self, notification: Notification) -> Result<()> {
        let mut list = self.notifications()?;
        debug!(id = %notification.id, kind = %notification.kind, "Notification stored");
        list.insert(0, notification);
        list.truncate(MAX_NOTIFICATIONS);
        collections::save(self.store(), KEY_NOTIFICATIONS, &list)
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<()> {
        let mut list = self.notifications()?;
        let entry = list
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))?;
        if entry.read {
            return Ok(());
        }
        entry.read = true;
        collections::save(self.store(), KEY_NOTIFICATIONS, &list)
    }

    pub fn unread_notifications(&self) -> Result<usize> {
        Ok(self.notifications()?.iter().filter(|n| !n.read).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::repo;

    #[test]
    fn newest_first_and_capped() {
        let repo = repo();
        for i in 0..(MAX_NOTIFICATIONS + 5) {
            repo.push_notification(Notification::new("message", "New message", format!("n{i}")))
                .unwrap();
        }

        let list = repo.notifications().unwrap();
        assert_eq!(list.len(), MAX_NOTIFICATIONS);
        assert_eq!(list[0].message, format!("n{}", MAX_NOTIFICATIONS + 4));
        assert_eq!(list.last().unwrap().message, "n5");
    }

    #[test]
    fn mark_read() {
        let repo = repo();
        let call = Notification::new("call", "Incoming call", "@bob is calling");
        let id = call.id.clone();
        repo.push_notification(call).unwrap();
        repo.push_notification(Notification::new("message", "New message", "hi"))
            .unwrap();
        assert_eq!(repo.unread_notifications().unwrap(), 2);

        repo.mark_notification_read(&id).unwrap();
        assert_eq!(repo.unread_notifications().unwrap(), 1);
        assert!(matches!(
            repo.mark_notification_read("nope"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn wire_format_uses_type() {
        let json = serde_json::to_value(Notification::new("call", "t", "m")).unwrap();
        assert_eq!(json["type"], "call");
        assert_eq!(json["read"], false);
    }
}
