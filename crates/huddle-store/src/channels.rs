//! Channel operations on group conversations.

use tracing::info;

use huddle_shared::constants::CUSTOM_CHANNEL_ICON;
use huddle_shared::types::{ChannelId, ConversationId};

use crate::error::{Result, StoreError};
use crate::models::Channel;
use crate::repository::ConversationRepository;

impl ConversationRepository {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Add a channel whose id is derived from `name` (`"Fun Zone"` ->
    /// `fun-zone`), with an empty message list.
    pub fn create_channel(&self, conversation_id: &ConversationId, name: &str) -> Result<Channel> {
        let name = name.trim();
        let id = ChannelId::from_name(name);
        if id.as_str().is_empty() {
            return Err(StoreError::InvalidInput("channel name is empty".into()));
        }

        let channel = self.update(conversation_id, |conversation| {
            let group = conversation.group_mut().ok_or_else(|| {
                StoreError::InvalidInput(format!("{} is not a group", conversation_id))
            })?;
            if group.has_channel(&id) {
                return Err(StoreError::InvalidInput(format!("channel {id} already exists")));
            }

            let channel = Channel {
                id: id.clone(),
                name: name.to_string(),
                icon: CUSTOM_CHANNEL_ICON.to_string(),
            };
            group.channels.push(channel.clone());
            group.messages_by_channel.insert(id.clone(), Vec::new());
            Ok(channel)
        })?;

        info!(conversation = %conversation_id, channel = %channel.id, "Channel created");
        Ok(channel)
    }

    // ------------------------------------------------------------------
    // Read / select
    // ------------------------------------------------------------------

    pub fn channels(&self, conversation_id: &ConversationId) -> Result<Vec<Channel>> {
        Ok(self
            .conversation(conversation_id)?
            .and_then(|c| c.group().map(|g| g.channels.clone()))
            .unwrap_or_default())
    }

    /// Persist which channel the group shows by default.
    pub fn set_active_channel(&self, conversation_id: &ConversationId, channel: &ChannelId) -> Result<()> {
        self.update(conversation_id, |conversation| {
            let group = conversation.group_mut().ok_or_else(|| {
                StoreError::InvalidInput(format!("{} is not a group", conversation_id))
            })?;
            if !group.has_channel(channel) {
                return Err(StoreError::NotFound(format!("channel {channel}")));
            }
            group.active_channel = channel.clone();
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove a channel and its messages. `general` cannot be removed.
    pub fn delete_channel(&self, conversation_id: &ConversationId, channel: &ChannelId) -> Result<()> {
        self.update(conversation_id, |conversation| {
            let group = conversation.group_mut().ok_or_else(|| {
                StoreError::InvalidInput(format!("{} is not a group", conversation_id))
            })?;
            let position = group
                .channels
                .iter()
                .position(|c| &c.id == channel)
                .ok_or_else(|| StoreError::NotFound(format!("channel {channel}")))?;
            if group.channels[position].is_default() {
                return Err(StoreError::InvalidOperation(
                    "the default channel cannot be deleted".into(),
                ));
            }

            group.channels.remove(position);
            group.messages_by_channel.remove(channel);
            if &group.active_channel == channel {
                group.active_channel = Channel::general().id;
            }
            Ok(())
        })?;

        info!(conversation = %conversation_id, channel = %channel, "Channel deleted");
        Ok(())
    }
}
