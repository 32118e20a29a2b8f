//! Message operations on [`ConversationRepository`].
//!
//! DM messages live in the conversation's own list; group messages live in
//! the list of the channel they were posted to. A `channel` argument of
//! `None` means the group's active channel and is ignored for DMs.

use chrono::Utc;
use tracing::{debug, info};

use huddle_shared::types::{ChannelId, ConversationId, Identity, MessageId};

use crate::error::{Result, StoreError};
use crate::models::{
    ChannelMessage, Conversation, DirectMessage, Message, MessageRecord, OutgoingMessage, Thread,
};
use crate::repository::ConversationRepository;

impl ConversationRepository {
    /// Messages in append order. An unknown conversation or channel yields
    /// an empty list.
    pub fn get_messages(
        &self,
        conversation_id: &ConversationId,
        channel: Option<&ChannelId>,
    ) -> Result<Vec<Message>> {
        let Some(conversation) = self.conversation(conversation_id)? else {
            return Ok(Vec::new());
        };

        let messages = match conversation.thread {
            Thread::Direct { messages } => messages.into_iter().map(Message::Direct).collect(),
            Thread::Group(mut group) => {
                let channel = channel.cloned().unwrap_or(group.active_channel);
                group
                    .messages_by_channel
                    .remove(&channel)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|record| {
                        Message::Channel(ChannelMessage {
                            channel: channel.clone(),
                            record,
                        })
                    })
                    .collect()
            }
        };
        Ok(messages)
    }

    /// Append a message and return it with its issued id and timestamp.
    pub fn append_message(
        &self,
        conversation_id: &ConversationId,
        message: OutgoingMessage,
        channel: Option<&ChannelId>,
    ) -> Result<MessageRecord> {
        if message.body.trim().is_empty() && message.attachments.is_empty() {
            return Err(StoreError::InvalidInput("message is empty".into()));
        }

        let record = self.update(conversation_id, |conversation| {
            let now = Utc::now();
            let id = MessageId::issue(now.timestamp_millis(), conversation.last_message_id);
            let record = MessageRecord {
                id,
                sender: message.sender,
                body: message.body,
                timestamp: now,
                edited: false,
                reactions: Default::default(),
                attachments: message.attachments,
            };

            match &mut conversation.thread {
                Thread::Direct { messages } => messages.push(DirectMessage {
                    record: record.clone(),
                    read: false,
                }),
                Thread::Group(group) => {
                    let channel = channel.cloned().unwrap_or_else(|| group.active_channel.clone());
                    if !group.has_channel(&channel) {
                        return Err(StoreError::NotFound(format!("channel {channel}")));
                    }
                    group
                        .messages_by_channel
                        .entry(channel)
                        .or_default()
                        .push(record.clone());
                }
            }
            conversation.last_message_id = Some(id);
            Ok(record)
        })?;

        info!(
            conversation = %conversation_id,
            msg_id = %record.id,
            sender = %record.sender,
            "Message appended"
        );
        Ok(record)
    }

    /// Replace a message body and mark it edited. Id and timestamp stay.
    pub fn edit_message(
        &self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        new_body: &str,
        channel: Option<&ChannelId>,
    ) -> Result<()> {
        if new_body.trim().is_empty() {
            return Err(StoreError::InvalidInput("edited text is empty".into()));
        }

        self.update(conversation_id, |conversation| {
            let record = find_record_mut(conversation, message_id, channel)
                .ok_or_else(|| StoreError::NotFound(format!("message {message_id}")))?;
            record.body = new_body.to_string();
            record.edited = true;
            Ok(())
        })?;

        debug!(conversation = %conversation_id, msg_id = %message_id, "Message edited");
        Ok(())
    }

    /// Hard-delete a message. Returns `false` (and writes nothing) when the
    /// id is not there.
    pub fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        channel: Option<&ChannelId>,
    ) -> Result<bool> {
        let removed = self.update(conversation_id, |conversation| {
            let removed = match &mut conversation.thread {
                Thread::Direct { messages } => {
                    let before = messages.len();
                    messages.retain(|m| m.record.id != message_id);
                    messages.len() != before
                }
                Thread::Group(group) => {
                    let channel = channel.unwrap_or(&group.active_channel).clone();
                    match group.messages_by_channel.get_mut(&channel) {
                        Some(messages) => {
                            let before = messages.len();
                            messages.retain(|m| m.id != message_id);
                            messages.len() != before
                        }
                        None => false,
                    }
                }
            };
            Ok(removed)
        })?;

        if removed {
            debug!(conversation = %conversation_id, msg_id = %message_id, "Message deleted");
        }
        Ok(removed)
    }

    /// Mark every DM message not sent by `reader` as read. Returns how many
    /// changed. Groups have no read flag.
    pub fn mark_read(&self, conversation_id: &ConversationId, reader: &Identity) -> Result<usize> {
        self.update(conversation_id, |conversation| {
            let mut changed = 0;
            if let Thread::Direct { messages } = &mut conversation.thread {
                for message in messages.iter_mut() {
                    if !message.read && &message.record.sender != reader {
                        message.read = true;
                        changed += 1;
                    }
                }
            }
            Ok(changed)
        })
    }
}

pub(crate) fn find_record_mut<'a>(
    conversation: &'a mut Conversation,
    message_id: MessageId,
    channel: Option<&ChannelId>,
) -> Option<&'a mut MessageRecord> {
    match &mut conversation.thread {
        Thread::Direct { messages } => messages
            .iter_mut()
            .map(|m| &mut m.record)
            .find(|r| r.id == message_id),
        Thread::Group(group) => {
            let channel = channel.unwrap_or(&group.active_channel).clone();
            group
                .messages_by_channel
                .get_mut(&channel)?
                .iter_mut()
                .find(|r| r.id == message_id)
        }
    }
}
