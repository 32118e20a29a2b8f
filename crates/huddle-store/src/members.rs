use serde_json::Value;
use tracing::{info, warn};

use huddle_shared::constants::KEY_TEAMS;
use huddle_shared::types::{ConversationId, Identity};

use crate::collections;
use crate::error::{Result, StoreError};
use crate::repository::ConversationRepository;

impl ConversationRepository {
    /// Remove `member` from a group on behalf of `requester`.
    ///
    /// Only a leader may remove, and never a leader (themselves included).
    /// The member also leaves the roster of the group's team, if it has one.
    pub fn remove_member(
        &self,
        conversation_id: &ConversationId,
        member: &Identity,
        requester: &Identity,
    ) -> Result<()> {
        let team_id = self.update(conversation_id, |conversation| {
            let group = conversation.group_mut().ok_or_else(|| {
                StoreError::InvalidInput(format!("{} is not a group", conversation_id))
            })?;

            let requester_is_leader = group.member(requester).is_some_and(|m| m.is_leader());
            if !requester_is_leader {
                return Err(StoreError::PermissionDenied(format!(
                    "{requester} is not a leader of {conversation_id}"
                )));
            }

            let target = group
                .member(member)
                .ok_or_else(|| StoreError::NotFound(format!("member {member}")))?;
            if target.is_leader() || member == requester {
                return Err(StoreError::InvalidOperation(format!(
                    "leader {member} cannot be removed"
                )));
            }

            group.members.retain(|m| &m.username != member);
            let team_id = group.team_id.clone();
            conversation.participants.retain(|p| p != member);
            Ok(team_id)
        })?;

        info!(conversation = %conversation_id, member = %member, by = %requester, "Member removed");

        if let Some(team_id) = team_id {
            self.remove_from_team(&team_id, member)?;
        }
        Ok(())
    }

    /// Works on the raw documents so rosters keep their stored spelling
    /// (`@ana` stays `@ana`) and other teams are written back as read.
    fn remove_from_team(&self, team_id: &str, member: &Identity) -> Result<()> {
        let mut teams: Vec<Value> = collections::load_list(self.store(), KEY_TEAMS)?;
        let roster = teams
            .iter_mut()
            .find(|t| t.get("id").and_then(Value::as_str) == Some(team_id))
            .and_then(|t| t.get_mut("acceptedMembers"))
            .and_then(Value::as_array_mut);
        let Some(roster) = roster else {
            warn!(team = team_id, "Linked team not found, roster left alone");
            return Ok(());
        };

        let before = roster.len();
        roster.retain(|entry| entry.as_str().map_or(true, |raw| member != raw));
        if roster.len() != before {
            collections::save(self.store(), KEY_TEAMS, &teams)?;
        }
        Ok(())
    }
}
