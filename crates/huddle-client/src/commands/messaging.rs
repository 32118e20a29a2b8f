use chrono::Utc;
use tracing::{debug, info};

use huddle_shared::types::{ConversationId, Identity, MessageId};
use huddle_store::{Member, Message, MessageRecord, OutgoingMessage, StoreError, Thread};

use crate::attachments::{compose_body, EncodedAttachment};
use crate::directory::Profile;
use crate::error::{ClientError, Result};
use crate::events::{AppEvent, OpenChatPayload};
use crate::mentions::{Completion, MentionResolver, Segment};
use crate::state::ChatClient;
use crate::sync::{conversation_item, ConversationItem};

impl ChatClient {
    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    pub fn list_conversations(&self) -> Result<Vec<ConversationItem>> {
        Ok(self
            .repo
            .list_for_identity(&self.identity)?
            .into_iter()
            .map(|summary| conversation_item(summary, self.directory.as_ref()))
            .collect())
    }

    /// Show a conversation. Opening a DM marks the peer's messages read.
    pub fn select_conversation(&self, conversation_id: &ConversationId) -> Result<()> {
        if self.repo.conversation(conversation_id)?.is_none() {
            return Err(StoreError::NotFound(format!("conversation {conversation_id}")).into());
        }
        self.set_selected(Some(conversation_id.clone()));
        let read = self.repo.mark_read(conversation_id, &self.identity)?;
        debug!(conversation = %conversation_id, read, "Conversation selected");
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.set_selected(None);
    }

    /// Ensure the DM with `payload.username`, select it and send the carried
    /// message, if any.
    pub fn open_chat(&self, payload: &OpenChatPayload) -> Result<ConversationId> {
        let peer = Identity::new(&payload.username);
        if peer.is_empty() {
            return Err(ClientError::InvalidInput("openChat without a username".into()));
        }

        self.directory.remember(Profile {
            username: peer.clone(),
            name: payload.name.clone(),
            avatar: payload.avatar.clone(),
        });

        let conversation_id = self.repo.ensure_direct_conversation(&self.identity, &peer)?;
        self.select_conversation(&conversation_id)?;

        if let Some(text) = payload.message.as_deref().filter(|t| !t.trim().is_empty()) {
            self.send_message(text, Vec::new())?;
        }
        info!(conversation = %conversation_id, peer = %peer, "Chat opened");
        Ok(conversation_id)
    }

    /// React to events other components put on the bus.
    pub fn handle_event(&self, event: &AppEvent) -> Result<()> {
        match event {
            AppEvent::OpenChat(payload) => self.open_chat(payload).map(|_| ()),
            AppEvent::NewNotification(_) | AppEvent::SwitchTab(_) => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Messages of the selected conversation
    // ------------------------------------------------------------------

    /// Messages of the selected conversation (active channel for groups).
    pub fn messages(&self) -> Result<Vec<Message>> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.get_messages(&conversation_id, None)?)
    }

    /// Send text plus attachments. Attachment tokens are appended to the
    /// body.
    pub fn send_message(&self, text: &str, attachments: Vec<EncodedAttachment>) -> Result<MessageRecord> {
        let conversation_id = self.require_selected()?;
        let body = compose_body(text, &attachments);
        let outgoing = OutgoingMessage::text(self.identity.clone(), body)
            .with_attachments(attachments.into_iter().map(|a| a.attachment).collect());
        Ok(self.repo.append_message(&conversation_id, outgoing, None)?)
    }

    /// Encode a picked file for [`send_message`](Self::send_message).
    pub fn attach(&self, name: &str, mime_type: &str, data: &[u8]) -> Result<EncodedAttachment> {
        Ok(self.encoder.encode(name, mime_type, data)?)
    }

    pub fn send_voice_note(&self, data: &[u8], mime_type: Option<&str>) -> Result<MessageRecord> {
        let voice = self.encoder.encode_voice(data, mime_type, Utc::now())?;
        self.send_message("", vec![voice])
    }

    pub fn edit_message(&self, message_id: MessageId, new_body: &str) -> Result<()> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.edit_message(&conversation_id, message_id, new_body, None)?)
    }

    /// Returns whether a message was removed.
    pub fn delete_message(&self, message_id: MessageId) -> Result<bool> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.delete_message(&conversation_id, message_id, None)?)
    }

    pub fn react(&self, message_id: MessageId, emoji: &str) -> Result<u32> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.react(&conversation_id, message_id, emoji, None)?)
    }

    pub fn mark_read(&self) -> Result<usize> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.mark_read(&conversation_id, &self.identity)?)
    }

    // ------------------------------------------------------------------
    // Mentions
    // ------------------------------------------------------------------

    /// Members of the selected group. Empty for DMs.
    pub fn members(&self) -> Result<Vec<Member>> {
        let conversation_id = self.require_selected()?;
        Ok(self
            .repo
            .conversation(&conversation_id)?
            .and_then(|c| match c.thread {
                Thread::Group(group) => Some(group.members),
                Thread::Direct { .. } => None,
            })
            .unwrap_or_default())
    }

    pub fn mention_candidates(&self, text: &str, cursor: usize) -> Result<Vec<Member>> {
        let members = self.members()?;
        Ok(MentionResolver::candidates(&members, text, cursor)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn complete_mention(&self, text: &str, cursor: usize, username: &Identity) -> Option<Completion> {
        MentionResolver::complete(text, cursor, username)
    }

    pub fn highlight(&self, body: &str) -> Result<Vec<Segment>> {
        Ok(MentionResolver::highlight(body, &self.members()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{client, client_on};
    use huddle_store::{ConversationRepository, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn open_chat_creates_selects_and_sends() {
        let alice = client("alice");
        let id = alice
            .open_chat(&OpenChatPayload {
                username: "@bob".into(),
                name: "Bob Builder".into(),
                message: Some("hey bob".into()),
                avatar: None,
            })
            .unwrap();

        assert_eq!(alice.selected(), Some(id.clone()));
        let messages = alice.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body(), "hey bob");
        assert_eq!(messages[0].sender(), &Identity::new("alice"));

        let list: Vec<ConversationItem> = alice.list_conversations().unwrap();
        assert_eq!(list[0].display_name, "Bob Builder");

        // Same DM the second time.
        let again = alice
            .handle_event(&AppEvent::OpenChat(OpenChatPayload {
                username: "bob".into(),
                name: "Bob".into(),
                message: None,
                avatar: None,
            }));
        assert!(again.is_ok());
        assert_eq!(alice.list_conversations().unwrap().len(), 1);
    }

    #[test]
    fn selecting_a_dm_marks_peer_messages_read() {
        let store = MemoryStore::new();
        let alice = client_on(ConversationRepository::new(Arc::new(store.clone())), "alice");
        let bob = client_on(ConversationRepository::new(Arc::new(store)), "bob");

        let id = alice.repository().ensure_direct_conversation(&"alice".into(), &"bob".into()).unwrap();
        alice.select_conversation(&id).unwrap();
        alice.send_message("unread for bob", Vec::new()).unwrap();

        bob.select_conversation(&id).unwrap();
        assert_eq!(bob.messages().unwrap()[0].is_read(), Some(true));
        assert_eq!(bob.mark_read().unwrap(), 0);
    }

    #[test]
    fn unknown_conversation_is_not_found() {
        let alice = client("alice");
        let err = alice.select_conversation(&ConversationId::from("conv_nope")).unwrap_err();
        assert!(err.is_not_found());
        assert!(alice.selected().is_none());
    }

    #[test]
    fn edit_react_delete_round() {
        let alice = client("alice");
        alice
            .open_chat(&OpenChatPayload {
                username: "bob".into(),
                name: "Bob".into(),
                message: None,
                avatar: None,
            })
            .unwrap();
        let sent = alice.send_message("typo", Vec::new()).unwrap();

        alice.edit_message(sent.id, "fixed").unwrap();
        assert_eq!(alice.react(sent.id, "👍").unwrap(), 1);
        assert_eq!(alice.react(sent.id, "👍").unwrap(), 2);

        let message = &alice.messages().unwrap()[0];
        assert_eq!(message.body(), "fixed");
        assert!(message.record().edited);

        assert!(matches!(
            alice.edit_message(sent.id, "  "),
            Err(ClientError::Store(StoreError::InvalidInput(_)))
        ));
        assert!(alice.delete_message(sent.id).unwrap());
        assert!(!alice.delete_message(sent.id).unwrap());
    }

    #[test]
    fn attachments_and_voice_notes() {
        let alice = client("alice");
        alice
            .open_chat(&OpenChatPayload {
                username: "bob".into(),
                name: "Bob".into(),
                message: None,
                avatar: None,
            })
            .unwrap();

        let photo = alice.attach("cat.png", "image/png", b"png").unwrap();
        let sent = alice.send_message("look", vec![photo]).unwrap();
        assert_eq!(sent.body, "look 🖼️ cat.png");
        assert_eq!(sent.attachments[0].name, "cat.png");

        let voice = alice.send_voice_note(b"opus", None).unwrap();
        assert!(voice.attachments[0].is_voice);
        assert!(voice.body.starts_with("🎤 voice-"));

        let list = alice.list_conversations().unwrap();
        assert!(list[0].summary.last_message.as_deref().unwrap_or_default().starts_with("🎤"));
    }

    #[test]
    fn mentions_come_from_group_members() {
        let alice = client("alice");
        let group = alice
            .create_group("Crew", None, vec![Member::new("bob", "Bob", huddle_store::MemberRole::Member)])
            .unwrap();
        alice.select_conversation(&group).unwrap();

        let found = alice.mention_candidates("hi @bo", 6).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, Identity::new("bob"));

        let done = alice.complete_mention("hi @bo", 6, &found[0].username).unwrap();
        assert_eq!(done.text, "hi @bob ");

        let segments = alice.highlight("ping @bob").unwrap();
        assert_eq!(segments.len(), 2);
    }
}
