//! Display names and avatars of people outside the conversation records.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use huddle_shared::types::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: Identity,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// The following/members directory maintained by other screens.
pub trait Directory: Send + Sync {
    fn lookup(&self, username: &Identity) -> Option<Profile>;

    /// Learn a profile seen elsewhere, e.g. in an `openChat` request.
    /// Read-only directories ignore it.
    fn remember(&self, _profile: Profile) {}
}

/// In-memory directory, filled from `openChat` payloads and the binary's
/// command line.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    profiles: RwLock<HashMap<Identity, Profile>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let directory = Self::new();
        for profile in profiles {
            directory.insert(profile);
        }
        directory
    }

    /// Add or replace a profile.
    pub fn insert(&self, profile: Profile) {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        profiles.insert(profile.username.clone(), profile);
    }
}

impl Directory for StaticDirectory {
    fn lookup(&self, username: &Identity) -> Option<Profile> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        profiles.get(username).cloned()
    }

    fn remember(&self, profile: Profile) {
        self.insert(profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_prefix_insensitive() {
        let directory = StaticDirectory::with([Profile {
            username: Identity::new("@bob"),
            name: "Bob Builder".into(),
            avatar: Some("https://example.org/bob.png".into()),
        }]);

        assert_eq!(directory.lookup(&"bob".into()).unwrap().name, "Bob Builder");
        assert!(directory.lookup(&"alice".into()).is_none());

        directory.insert(Profile {
            username: "bob".into(),
            name: "Robert".into(),
            avatar: None,
        });
        assert_eq!(directory.lookup(&"@bob".into()).unwrap().name, "Robert");
    }
}
