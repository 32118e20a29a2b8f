//! The [`ConversationRepository`]: every read and write of the persisted
//! conversations goes through it.
//!
//! Each operation is a synchronous read-modify-write of the whole
//! `conversations` document. There is no lock across tabs: two tabs
//! writing at once race, and the later full write wins.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use huddle_shared::constants::{KEY_CONVERSATIONS, KEY_TEAMS, KEY_USER};
use huddle_shared::types::{ConversationId, Identity};

use crate::backend::{KeyValueStore, StoreChange};
use crate::collections;
use crate::error::{Result, StoreError};
use crate::models::{
    Attachment, Conversation, ConversationSummary, GroupThread, Member, SessionUser, Team, Thread,
};

#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn KeyValueStore>,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Feed of writes made through this repository's backend.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    pub(crate) fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------
    // Raw collection access
    // ------------------------------------------------------------------

    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        collections::load_list(self.store(), KEY_CONVERSATIONS)
    }

    pub fn conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.conversations()?.into_iter().find(|c| &c.id == id))
    }

    fn save_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        collections::save(self.store(), KEY_CONVERSATIONS, conversations)
    }

    /// Apply `f` to one conversation and write the collection back if `f`
    /// succeeded and actually changed something.
    pub(crate) fn update<R>(
        &self,
        id: &ConversationId,
        f: impl FnOnce(&mut Conversation) -> Result<R>,
    ) -> Result<R> {
        let mut conversations = self.conversations()?;
        let conversation = conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))?;

        let before = conversation.clone();
        let result = f(conversation)?;
        if *conversation != before {
            self.save_conversations(&conversations)?;
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Conversations `identity` takes part in, most recent activity first.
    /// Conversations without messages sort last.
    pub fn list_for_identity(&self, identity: &Identity) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations()?
            .iter()
            .filter(|c| c.involves(identity))
            .map(|c| summarize(c, identity))
            .collect();

        // Stable: ties keep collection order.
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Find the DM between `a` and `b`, creating it if needed.
    pub fn ensure_direct_conversation(&self, a: &Identity, b: &Identity) -> Result<ConversationId> {
        let mut wanted = vec![a.clone(), b.clone()];
        wanted.sort();
        wanted.dedup();

        let mut conversations = self.conversations()?;
        if let Some(existing) = conversations
            .iter()
            .find(|c| !c.is_group() && same_members(&c.participants, &wanted))
        {
            return Ok(existing.id.clone());
        }

        let id = ConversationId::generate();
        conversations.push(Conversation {
            id: id.clone(),
            participants: wanted,
            last_message_id: None,
            thread: Thread::Direct {
                messages: Vec::new(),
            },
        });
        self.save_conversations(&conversations)?;

        info!(conversation = %id, a = %a, b = %b, "Direct conversation created");
        Ok(id)
    }

    /// Create a group with the `general` channel. Members become participants.
    pub fn create_group_conversation(
        &self,
        name: &str,
        team_id: Option<String>,
        members: Vec<Member>,
    ) -> Result<ConversationId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("group name is empty".into()));
        }
        if !members.iter().any(Member::is_leader) {
            return Err(StoreError::InvalidInput("a group needs a leader".into()));
        }

        let mut participants: Vec<Identity> = members.iter().map(|m| m.username.clone()).collect();
        participants.sort();
        participants.dedup();

        let id = ConversationId::generate();
        let mut conversations = self.conversations()?;
        conversations.push(Conversation {
            id: id.clone(),
            participants,
            last_message_id: None,
            thread: Thread::Group(GroupThread::new(name, team_id, members)),
        });
        self.save_conversations(&conversations)?;

        info!(conversation = %id, name, "Group conversation created");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Neighbouring collections
    // ------------------------------------------------------------------

    /// The signed-in user, as written by the session bootstrap.
    pub fn session_user(&self) -> Result<Option<SessionUser>> {
        collections::load_record(self.store(), KEY_USER)
    }

    pub fn teams(&self) -> Result<Vec<Team>> {
        collections::load_list(self.store(), KEY_TEAMS)
    }

    pub fn save_teams(&self, teams: &[Team]) -> Result<()> {
        debug!(count = teams.len(), "Saving teams");
        collections::save(self.store(), KEY_TEAMS, teams)
    }
}

fn same_members(participants: &[Identity], wanted: &[Identity]) -> bool {
    let mut have = participants.to_vec();
    have.sort();
    have.dedup();
    have == wanted
}

fn summarize(conversation: &Conversation, viewer: &Identity) -> ConversationSummary {
    let last = conversation.last_message();
    let (title, peer) = match &conversation.thread {
        Thread::Group(group) => (group.name.clone(), None),
        Thread::Direct { .. } => {
            let peer = conversation
                .participants
                .iter()
                .find(|p| *p != viewer)
                .unwrap_or(viewer)
                .clone();
            (peer.to_string(), Some(peer))
        }
    };

    ConversationSummary {
        id: conversation.id.clone(),
        is_group: conversation.is_group(),
        title,
        peer,
        last_message: last.map(|m| preview(&m.body, &m.attachments)),
        timestamp: last.map(|m| m.timestamp),
        unread: 0,
    }
}

fn preview(body: &str, attachments: &[Attachment]) -> String {
    if !body.trim().is_empty() {
        return body.to_string();
    }
    match attachments.first() {
        Some(a) if a.is_voice => "🎤 Voice message".to_string(),
        Some(a) => format!("📎 {}", a.name),
        None => String::new(),
    }
}
