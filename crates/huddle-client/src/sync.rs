//! Keeps a tab's view of the conversations in step with the store.
//!
//! [`SyncLoop`] is the synchronous core: it re-derives the whole view from
//! the repository and decides whether the thread should scroll to the
//! newest message. [`spawn_sync_loop`] drives it from a tokio task that
//! wakes on a fixed interval, on writes announced by the store's change
//! feed and on commands from the UI.
//!
//! Writes made by another process never reach the change feed; the
//! interval is what picks them up.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use huddle_shared::constants::KEY_CONVERSATIONS;
use huddle_shared::types::{ChannelId, ConversationId, Identity};
use huddle_store::{Channel, ConversationRepository, ConversationSummary, Member, Message, StoreError, Thread};

use crate::directory::Directory;

/// One row of the conversation list, with the DM peer resolved through
/// the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationItem {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// Everything a tab renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncView {
    pub conversations: Vec<ConversationItem>,
    pub selected: Option<ConversationId>,
    /// Active channel of the selected group.
    pub active_channel: Option<ChannelId>,
    pub channels: Vec<Channel>,
    pub members: Vec<Member>,
    pub messages: Vec<Message>,
}

impl SyncView {
    pub fn selected_item(&self) -> Option<&ConversationItem> {
        let selected = self.selected.as_ref()?;
        self.conversations.iter().find(|c| &c.summary.id == selected)
    }
}

#[derive(Debug, Clone)]
pub struct SyncUpdate {
    /// Same `Arc` as the previous update when nothing changed.
    pub view: Arc<SyncView>,
    pub scroll_to_bottom: bool,
    pub changed: bool,
}

pub struct SyncLoop {
    repo: ConversationRepository,
    identity: Identity,
    directory: Arc<dyn Directory>,
    scroll_threshold_px: f64,
    selected: Option<ConversationId>,
    user_scrolled_up: bool,
    last: Arc<SyncView>,
}

impl SyncLoop {
    pub fn new(
        repo: ConversationRepository,
        identity: Identity,
        directory: Arc<dyn Directory>,
        scroll_threshold_px: f64,
    ) -> Self {
        Self {
            repo,
            identity,
            directory,
            scroll_threshold_px,
            selected: None,
            user_scrolled_up: false,
            last: Arc::new(SyncView::default()),
        }
    }

    pub fn select(&mut self, conversation: Option<ConversationId>) {
        self.selected = conversation;
    }

    /// Record where the user scrolled the thread to. The flag clears only
    /// once they come back within the threshold of the bottom.
    pub fn on_scroll(&mut self, distance_from_bottom_px: f64) {
        self.user_scrolled_up = distance_from_bottom_px > self.scroll_threshold_px;
    }

    pub fn user_scrolled_up(&self) -> bool {
        self.user_scrolled_up
    }

    pub fn view(&self) -> Arc<SyncView> {
        Arc::clone(&self.last)
    }

    /// Re-derive the view. Running it again without a store change yields
    /// the same view and no scroll request.
    pub fn reconcile(&mut self) -> Result<SyncUpdate, StoreError> {
        let view = self.derive()?;

        let selection_changed =
            view.selected != self.last.selected || view.active_channel != self.last.active_channel;
        if selection_changed {
            self.user_scrolled_up = false;
        }
        let thread_changed = view.messages != self.last.messages;
        let scroll_to_bottom = selection_changed || (!self.user_scrolled_up && thread_changed);

        let changed = view != *self.last;
        if changed {
            debug!(
                conversations = view.conversations.len(),
                messages = view.messages.len(),
                scroll_to_bottom,
                "View changed"
            );
            self.last = Arc::new(view);
        }

        Ok(SyncUpdate {
            view: self.view(),
            scroll_to_bottom,
            changed,
        })
    }

    fn derive(&self) -> Result<SyncView, StoreError> {
        let conversations = self
            .repo
            .list_for_identity(&self.identity)?
            .into_iter()
            .map(|summary| conversation_item(summary, self.directory.as_ref()))
            .collect();

        let mut view = SyncView {
            conversations,
            selected: self.selected.clone(),
            ..SyncView::default()
        };

        let Some(id) = &self.selected else {
            return Ok(view);
        };
        let Some(conversation) = self.repo.conversation(id)? else {
            return Ok(view);
        };

        if let Thread::Group(group) = &conversation.thread {
            view.active_channel = Some(group.active_channel.clone());
            view.channels = group.channels.clone();
            view.members = group.members.clone();
        }
        view.messages = self.repo.get_messages(id, view.active_channel.as_ref())?;
        Ok(view)
    }
}

pub(crate) fn conversation_item(summary: ConversationSummary, directory: &dyn Directory) -> ConversationItem {
    let profile = summary.peer.as_ref().and_then(|peer| directory.lookup(peer));
    let display_name = profile
        .as_ref()
        .map(|p| p.name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| summary.title.clone());
    ConversationItem {
        avatar: profile.and_then(|p| p.avatar),
        display_name,
        summary,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    Select(Option<ConversationId>),
    /// Distance of the viewport from the bottom of the thread, in px.
    Scrolled(f64),
    Reconcile,
    Shutdown,
}

/// Control side of a running sync task.
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    updates: watch::Receiver<SyncUpdate>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    fn send(&self, command: SyncCommand) {
        if self.commands.send(command).is_err() {
            debug!("Sync task already stopped");
        }
    }

    pub fn select(&self, conversation: Option<ConversationId>) {
        self.send(SyncCommand::Select(conversation));
    }

    pub fn scrolled(&self, distance_from_bottom_px: f64) {
        self.send(SyncCommand::Scrolled(distance_from_bottom_px));
    }

    pub fn reconcile_now(&self) {
        self.send(SyncCommand::Reconcile);
    }

    /// Updates that changed the view or asked for a scroll.
    pub fn subscribe(&self) -> watch::Receiver<SyncUpdate> {
        self.updates.clone()
    }

    pub fn current(&self) -> SyncUpdate {
        self.updates.borrow().clone()
    }

    pub async fn shutdown(self) {
        self.send(SyncCommand::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sync task ended abnormally");
        }
    }
}

/// Run `sync` until [`SyncHandle::shutdown`] or until the handle is dropped.
pub fn spawn_sync_loop(mut sync: SyncLoop, interval: Duration) -> SyncHandle {
    let (commands_tx, mut commands) = mpsc::unbounded_channel();
    let (updates_tx, updates) = watch::channel(SyncUpdate {
        view: sync.view(),
        scroll_to_bottom: false,
        changed: false,
    });
    let mut changes = sync.repo.subscribe();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut feed_open = true;

        info!(identity = %sync.identity, ?interval, "Sync loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                change = changes.recv(), if feed_open => match change {
                    Ok(change) if change.key != KEY_CONVERSATIONS => continue,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change feed lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Change feed closed, polling only");
                        feed_open = false;
                        continue;
                    }
                },
                command = commands.recv() => match command {
                    Some(SyncCommand::Select(conversation)) => sync.select(conversation),
                    Some(SyncCommand::Scrolled(px)) => sync.on_scroll(px),
                    Some(SyncCommand::Reconcile) => {}
                    Some(SyncCommand::Shutdown) | None => break,
                },
            }

            match sync.reconcile() {
                Ok(update) if update.changed || update.scroll_to_bottom => {
                    updates_tx.send_replace(update);
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Reconciliation failed, keeping previous view"),
            }
        }
        info!(identity = %sync.identity, "Sync loop stopped");
    });

    SyncHandle {
        commands: commands_tx,
        updates,
        task,
    }
}
