use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SIGNALING_TOPIC_PREFIX;

/// A username. Stored and compared without the leading `@`, so `@alice`
/// and `alice` are the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let canonical = trimmed.strip_prefix('@').unwrap_or(trimmed);
        Self(canonical.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `@name`, the form inserted into message bodies.
    pub fn mention(&self) -> String {
        format!("@{}", self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl PartialEq<str> for Identity {
    fn eq(&self, other: &str) -> bool {
        *self == Identity::new(other)
    }
}

impl PartialEq<&str> for Identity {
    fn eq(&self, other: &&str) -> bool {
        *self == Identity::new(*other)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(format!("conv_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Broadcast topic carrying call signaling for this conversation.
    pub fn to_signaling_topic(&self) -> String {
        format!("{SIGNALING_TOPIC_PREFIX}{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Lower-cases the display name and joins its words with `-`:
    /// `"Fun Zone"` becomes `fun-zone`.
    pub fn from_name(name: &str) -> Self {
        let slug = name
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time-derived message id (Unix epoch millis at issue time, bumped past
/// the previous id when the clock has not advanced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    pub fn issue(now_millis: i64, high_water: Option<MessageId>) -> Self {
        match high_water {
            Some(MessageId(last)) if last >= now_millis => Self(last + 1),
            _ => Self(now_millis),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Opaque id of one call session (one per tab and call). Local sessions
/// mint UUIDs, but any string from the wire is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for logs.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn wants_video(self) -> bool {
        matches!(self, CallType::Video)
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallType::Audio => f.write_str("audio"),
            CallType::Video => f.write_str("video"),
        }
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(CallType::Audio),
            "video" => Ok(CallType::Video),
            other => Err(format!("unknown call type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_strips_at_prefix() {
        assert_eq!(Identity::new("@alice"), Identity::new("alice"));
        assert_eq!(Identity::new(" @bob ").as_str(), "bob");
        assert_eq!(Identity::new("alice").mention(), "@alice");
        assert!(Identity::new("@carol") == "carol");
    }

    #[test]
    fn identity_canonicalizes_on_deserialize() {
        let id: Identity = serde_json::from_str("\"@dave\"").unwrap();
        assert_eq!(id.as_str(), "dave");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dave\"");
    }

    #[test]
    fn channel_id_from_name() {
        assert_eq!(ChannelId::from_name("Fun Zone").as_str(), "fun-zone");
        assert_eq!(ChannelId::from_name("  Late   Night Ideas ").as_str(), "late-night-ideas");
        assert_eq!(ChannelId::from_name("general").as_str(), "general");
    }

    #[test]
    fn message_id_never_goes_backwards() {
        assert_eq!(MessageId::issue(1_000, None), MessageId(1_000));
        assert_eq!(MessageId::issue(1_000, Some(MessageId(999))), MessageId(1_000));
        assert_eq!(MessageId::issue(1_000, Some(MessageId(1_000))), MessageId(1_001));
        assert_eq!(MessageId::issue(1_000, Some(MessageId(5_000))), MessageId(5_001));
    }

    #[test]
    fn signaling_topic_is_scoped_to_conversation() {
        let id = ConversationId::from("conv_1");
        assert_eq!(id.to_signaling_topic(), "webrtc-conv_1");
    }

    #[test]
    fn call_type_parses() {
        assert_eq!("Video".parse::<CallType>().unwrap(), CallType::Video);
        assert!("fax".parse::<CallType>().is_err());
        assert!(!CallType::Audio.wants_video());
    }
}
