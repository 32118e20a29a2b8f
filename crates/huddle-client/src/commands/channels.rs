use tracing::info;

use huddle_shared::types::{ChannelId, ConversationId, Identity};
use huddle_store::{Channel, Member, MemberRole};

use crate::error::Result;
use crate::state::ChatClient;

impl ChatClient {
    /// Create a group led by this tab's identity and select it.
    pub fn create_group(&self, name: &str, team_id: Option<String>, mut members: Vec<Member>) -> Result<ConversationId> {
        members.retain(|m| m.username != self.identity);
        let display_name = self
            .directory
            .lookup(&self.identity)
            .map(|p| p.name)
            .unwrap_or_else(|| self.identity.to_string());
        members.insert(0, Member::new(self.identity.clone(), display_name, MemberRole::Leader));

        let conversation_id = self.repo.create_group_conversation(name, team_id, members)?;
        self.select_conversation(&conversation_id)?;
        Ok(conversation_id)
    }

    pub fn channels(&self) -> Result<Vec<Channel>> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.channels(&conversation_id)?)
    }

    /// Create a channel in the selected group and switch to it.
    pub fn create_channel(&self, name: &str) -> Result<Channel> {
        let conversation_id = self.require_selected()?;
        let channel = self.repo.create_channel(&conversation_id, name)?;
        self.repo.set_active_channel(&conversation_id, &channel.id)?;
        Ok(channel)
    }

    pub fn switch_channel(&self, channel: &ChannelId) -> Result<()> {
        let conversation_id = self.require_selected()?;
        self.repo.set_active_channel(&conversation_id, channel)?;
        info!(conversation = %conversation_id, channel = %channel, "Channel switched");
        Ok(())
    }

    pub fn delete_channel(&self, channel: &ChannelId) -> Result<()> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.delete_channel(&conversation_id, channel)?)
    }

    /// Remove a member from the selected group, acting as this tab's identity.
    pub fn remove_member(&self, member: &Identity) -> Result<()> {
        let conversation_id = self.require_selected()?;
        Ok(self.repo.remove_member(&conversation_id, member, &self.identity)?)
    }
}
