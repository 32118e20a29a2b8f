//! Domain records persisted in the `conversations`, `notifications`,
//! `teams` and `user` collections.
//!
//! Every record derives `Serialize` and `Deserialize`; collections are
//! stored as JSON documents, so field names use the camelCase the other
//! consumers of the same store expect.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use huddle_shared::constants::{DEFAULT_CHANNEL_ICON, DEFAULT_CHANNEL_ID, DEFAULT_CHANNEL_NAME};
use huddle_shared::types::{ChannelId, ConversationId, Identity, MessageId};

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A DM between two identities or a multi-channel group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique, stable for the conversation's lifetime.
    pub id: ConversationId,
    /// Canonical identities taking part. Treated as a set.
    pub participants: Vec<Identity>,
    /// Highest message id ever issued here. Ids are never reused, even
    /// after the newest message is deleted.
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
    pub thread: Thread,
}

impl Conversation {
    pub fn is_group(&self) -> bool {
        matches!(self.thread, Thread::Group(_))
    }

    pub fn group(&self) -> Option<&GroupThread> {
        match &self.thread {
            Thread::Group(group) => Some(group),
            Thread::Direct { .. } => None,
        }
    }

    pub fn group_mut(&mut self) -> Option<&mut GroupThread> {
        match &mut self.thread {
            Thread::Group(group) => Some(group),
            Thread::Direct { .. } => None,
        }
    }

    /// Whether `identity` is a participant or, for groups, a member.
    pub fn involves(&self, identity: &Identity) -> bool {
        self.participants.contains(identity)
            || self
                .group()
                .is_some_and(|g| g.members.iter().any(|m| &m.username == identity))
    }

    /// Timestamp of the newest message across the whole conversation.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message().map(|m| m.timestamp)
    }

    /// Newest message across the whole conversation (every channel for groups).
    pub fn last_message(&self) -> Option<&MessageRecord> {
        match &self.thread {
            Thread::Direct { messages } => messages.last().map(|m| &m.record),
            Thread::Group(group) => group
                .messages_by_channel
                .values()
                .filter_map(|msgs| msgs.last())
                .max_by_key(|m| (m.timestamp, m.id)),
        }
    }
}

/// Message storage, which differs between DMs and groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Thread {
    Direct {
        #[serde(default)]
        messages: Vec<DirectMessage>,
    },
    Group(GroupThread),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupThread {
    pub name: String,
    /// Team whose roster mirrors the member list.
    #[serde(default)]
    pub team_id: Option<String>,
    pub members: Vec<Member>,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub messages_by_channel: BTreeMap<ChannelId, Vec<MessageRecord>>,
    pub active_channel: ChannelId,
}

impl GroupThread {
    /// A fresh group holding only the `general` channel.
    pub fn new(name: impl Into<String>, team_id: Option<String>, members: Vec<Member>) -> Self {
        let general = Channel::general();
        let mut messages_by_channel = BTreeMap::new();
        messages_by_channel.insert(general.id.clone(), Vec::new());
        Self {
            name: name.into(),
            team_id,
            members,
            active_channel: general.id.clone(),
            channels: vec![general],
            messages_by_channel,
        }
    }

    pub fn member(&self, username: &Identity) -> Option<&Member> {
        self.members.iter().find(|m| &m.username == username)
    }

    pub fn has_channel(&self, id: &ChannelId) -> bool {
        self.channels.iter().any(|c| &c.id == id)
    }
}

// ---------------------------------------------------------------------------
// Members and channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Leader,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub username: Identity,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub role: MemberRole,
}

impl Member {
    pub fn new(username: impl Into<Identity>, name: impl Into<String>, role: MemberRole) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            avatar: None,
            role,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == MemberRole::Leader
    }
}

/// A named sub-stream of a group conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub icon: String,
}

impl Channel {
    pub fn general() -> Self {
        Self {
            id: ChannelId::from(DEFAULT_CHANNEL_ID),
            name: DEFAULT_CHANNEL_NAME.to_string(),
            icon: DEFAULT_CHANNEL_ICON.to_string(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.id.as_str() == DEFAULT_CHANNEL_ID
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Fields every message carries, whatever thread it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender: Identity,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    /// Emoji -> count. A plain counter with no per-user attribution.
    #[serde(default)]
    pub reactions: BTreeMap<String, u32>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A DM message. `read` is local bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    #[serde(flatten)]
    pub record: MessageRecord,
    #[serde(default)]
    pub read: bool,
}

/// A message as handed out by the repository, resolved once from the
/// thread it was stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum Message {
    Direct(DirectMessage),
    Channel(ChannelMessage),
}

/// A group message together with the channel it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMessage {
    pub channel: ChannelId,
    #[serde(flatten)]
    pub record: MessageRecord,
}

impl Message {
    pub fn record(&self) -> &MessageRecord {
        match self {
            Message::Direct(dm) => &dm.record,
            Message::Channel(cm) => &cm.record,
        }
    }

    pub fn id(&self) -> MessageId {
        self.record().id
    }

    pub fn sender(&self) -> &Identity {
        &self.record().sender
    }

    pub fn body(&self) -> &str {
        &self.record().body
    }

    /// `Some` for DMs only.
    pub fn is_read(&self) -> Option<bool> {
        match self {
            Message::Direct(dm) => Some(dm.read),
            Message::Channel(_) => None,
        }
    }
}

/// What a caller hands to `append_message`; the repository issues the id
/// and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub sender: Identity,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    pub fn text(sender: impl Into<Identity>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// A file or voice note embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// `data:<mime>;base64,<payload>`
    pub inline_payload: String,
    #[serde(default)]
    pub is_voice: bool,
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub is_group: bool,
    /// Group name, or the peer's username for DMs.
    pub title: String,
    /// The other party of a DM.
    pub peer: Option<Identity>,
    pub last_message: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Always 0: unread counting is not tracked for the list.
    pub unread: u32,
}

// ---------------------------------------------------------------------------
// Other collections
// ---------------------------------------------------------------------------

/// In-app alert, newest first in the `notifications` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    pub fn new(kind: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
            read: false,
        }
    }
}

/// Team roster owned by the team screens. Fields this crate does not know
/// about are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub accepted_members: Vec<Identity>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Team {
    pub fn new(id: impl Into<String>, accepted_members: Vec<Identity>) -> Self {
        Self {
            id: id.into(),
            accepted_members,
            extra: serde_json::Map::new(),
        }
    }
}

/// The signed-in user. Written by the session bootstrap, read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub username: Identity,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_type: String,
}
