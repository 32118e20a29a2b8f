use tracing::debug;

use huddle_shared::types::{ChannelId, ConversationId, MessageId};

use crate::error::{Result, StoreError};
use crate::messages::find_record_mut;
use crate::repository::ConversationRepository;

impl ConversationRepository {
    /// Bump the counter of `emoji` on a message and return the new count.
    ///
    /// Counters carry no per-user attribution: the same caller reacting
    /// twice counts twice.
    pub fn react(
        &self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        emoji: &str,
        channel: Option<&ChannelId>,
    ) -> Result<u32> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(StoreError::InvalidInput("reaction emoji is empty".into()));
        }

        let count = self.update(conversation_id, |conversation| {
            let record = find_record_mut(conversation, message_id, channel)
                .ok_or_else(|| StoreError::NotFound(format!("message {message_id}")))?;
            let counter = record.reactions.entry(emoji.to_string()).or_insert(0);
            *counter = counter.saturating_add(1);
            Ok(*counter)
        })?;

        debug!(conversation = %conversation_id, msg_id = %message_id, emoji, count, "Reaction added");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutgoingMessage;
    use crate::repository::tests::{group, repo};

    #[test]
    fn repeated_reactions_keep_counting() {
        let repo = repo();
        let conv = repo
            .ensure_direct_conversation(&"alice".into(), &"bob".into())
            .unwrap();
        let msg = repo
            .append_message(&conv, OutgoingMessage::text("bob", "ship it"), None)
            .unwrap();

        assert_eq!(repo.react(&conv, msg.id, "🚀", None).unwrap(), 1);
        assert_eq!(repo.react(&conv, msg.id, "🚀", None).unwrap(), 2);
        assert_eq!(repo.react(&conv, msg.id, "🚀", None).unwrap(), 3);
        assert_eq!(repo.react(&conv, msg.id, "👍", None).unwrap(), 1);

        let stored = repo.get_messages(&conv, None).unwrap();
        let reactions = &stored[0].record().reactions;
        assert_eq!(reactions.get("🚀"), Some(&3));
        assert_eq!(reactions.get("👍"), Some(&1));
    }

    #[test]
    fn reacting_in_a_channel() {
        let repo = repo();
        let conv = group(&repo);
        let ideas = repo.create_channel(&conv, "Ideas").unwrap();
        let msg = repo
            .append_message(&conv, OutgoingMessage::text("ana", "idea"), Some(&ideas.id))
            .unwrap();

        assert!(matches!(
            repo.react(&conv, msg.id, "🔥", None),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(repo.react(&conv, msg.id, "🔥", Some(&ideas.id)).unwrap(), 1);
    }

    #[test]
    fn unknown_message_or_blank_emoji_fails() {
        let repo = repo();
        let conv = repo
            .ensure_direct_conversation(&"alice".into(), &"bob".into())
            .unwrap();
        assert!(matches!(
            repo.react(&conv, MessageId(7), "👍", None),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.react(&conv, MessageId(7), " ", None),
            Err(StoreError::InvalidInput(_))
        ));
    }
}
