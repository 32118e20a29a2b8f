//! The [`ChatClient`]: state of one tab, shared by every command.
//!
//! Commands live in [`crate::commands`] as further `impl ChatClient`
//! blocks grouped by domain.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use huddle_shared::types::{ConversationId, Identity};
use huddle_store::ConversationRepository;

use crate::attachments::AttachmentEncoder;
use crate::config::ClientConfig;
use crate::directory::Directory;
use crate::error::{ClientError, Result};
use crate::events::EventBus;
use crate::notifications::NotificationEmitter;
use crate::sync::{spawn_sync_loop, SyncHandle, SyncLoop};

/// Username used when neither the configuration nor the `user` collection
/// names one.
pub const GUEST_USERNAME: &str = "guest";

pub struct ChatClient {
    pub(crate) repo: ConversationRepository,
    pub(crate) identity: Identity,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) bus: EventBus,
    pub(crate) notifier: NotificationEmitter,
    pub(crate) encoder: AttachmentEncoder,
    selected: Mutex<Option<ConversationId>>,
    sync: Option<SyncHandle>,
}

impl ChatClient {
    pub fn new(
        repo: ConversationRepository,
        identity: Identity,
        directory: Arc<dyn Directory>,
        config: &ClientConfig,
    ) -> Self {
        let bus = EventBus::new();
        let notifier = NotificationEmitter::new(repo.clone(), bus.clone());
        info!(identity = %identity, "Chat client ready");
        Self {
            repo,
            identity,
            directory,
            bus,
            notifier,
            encoder: AttachmentEncoder::new(config.max_attachment_bytes),
            selected: Mutex::new(None),
            sync: None,
        }
    }

    /// Configured username, else the signed-in user, else `guest`.
    pub fn resolve_identity(repo: &ConversationRepository, config: &ClientConfig) -> Identity {
        if let Some(name) = &config.username {
            return Identity::new(name);
        }
        match repo.session_user() {
            Ok(Some(user)) if !user.username.is_empty() => user.username,
            Ok(_) => Identity::new(GUEST_USERNAME),
            Err(e) => {
                warn!(error = %e, "Could not read the session user");
                Identity::new(GUEST_USERNAME)
            }
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn repository(&self) -> &ConversationRepository {
        &self.repo
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn notifier(&self) -> &NotificationEmitter {
        &self.notifier
    }

    pub fn encoder(&self) -> &AttachmentEncoder {
        &self.encoder
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn selected(&self) -> Option<ConversationId> {
        self.lock_selected().clone()
    }

    pub(crate) fn require_selected(&self) -> Result<ConversationId> {
        self.selected().ok_or(ClientError::NoConversation)
    }

    pub(crate) fn set_selected(&self, conversation: Option<ConversationId>) {
        *self.lock_selected() = conversation.clone();
        if let Some(sync) = &self.sync {
            sync.select(conversation);
        }
    }

    fn lock_selected(&self) -> MutexGuard<'_, Option<ConversationId>> {
        self.selected.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Sync loop
    // ------------------------------------------------------------------

    /// Start reconciling this tab's view in the background.
    pub fn start_sync(&mut self, config: &ClientConfig) -> &SyncHandle {
        let mut sync = SyncLoop::new(
            self.repo.clone(),
            self.identity.clone(),
            Arc::clone(&self.directory),
            config.scroll_threshold_px,
        );
        sync.select(self.selected());
        self.sync.insert(spawn_sync_loop(sync, config.sync_interval))
    }

    pub fn sync(&self) -> Option<&SyncHandle> {
        self.sync.as_ref()
    }

    pub async fn shutdown(mut self) {
        if let Some(sync) = self.sync.take() {
            sync.shutdown().await;
        }
        info!(identity = %self.identity, "Chat client stopped");
    }
}
