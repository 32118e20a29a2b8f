use serde::Serialize;
use tracing::{info, warn};

use huddle_media::{CallContext, CallError, CallOptions, CallSession, CallState};
use huddle_shared::types::{CallType, ConversationId, Identity};
use huddle_store::Notification;

use crate::config::ClientConfig;
use crate::notifications::NotificationEmitter;
use crate::state::ChatClient;

/// Notification kinds raised by calls.
pub const NOTIFICATION_CALL: &str = "call";
pub const NOTIFICATION_CALL_ERROR: &str = "call-error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatus {
    pub state: CallState,
    pub call_type: Option<CallType>,
    pub is_muted: bool,
    pub is_camera_on: bool,
    pub elapsed_seconds: u64,
    pub remote_tracks: usize,
}

/// Call controls of one tab. Failures are surfaced as `call-error`
/// notifications as well as returned.
pub struct CallController {
    session: CallSession,
    notifier: NotificationEmitter,
    identity: Identity,
}

impl CallController {
    pub fn new(session: CallSession, notifier: NotificationEmitter, identity: Identity) -> Self {
        Self {
            session,
            notifier,
            identity,
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn status(&self) -> CallStatus {
        CallStatus {
            state: self.session.state(),
            call_type: self.session.call_type(),
            is_muted: self.session.is_muted(),
            is_camera_on: self.session.is_camera_on(),
            elapsed_seconds: self.session.elapsed_seconds(),
            remote_tracks: self.session.remote_tracks().len(),
        }
    }

    pub async fn start_call(
        &self,
        call_type: CallType,
        conversation: Option<&ConversationId>,
    ) -> Result<CallStatus, CallError> {
        if let Err(e) = self.session.start_call(call_type, conversation).await {
            warn!(error = %e, call_type = %call_type, "Call could not start");
            self.notifier.notify(NOTIFICATION_CALL_ERROR, "Call failed", &e.to_string());
            return Err(e);
        }
        Ok(self.status())
    }

    pub async fn end_call(&self) -> CallStatus {
        self.session.end_call().await;
        self.status()
    }

    pub fn toggle_mute(&self) -> Result<bool, CallError> {
        self.session.toggle_mute()
    }

    pub fn toggle_camera(&self) -> Result<bool, CallError> {
        self.session.toggle_camera()
    }

    /// Let `participant` know a call is on. Only a notification: the call
    /// itself is unchanged.
    pub fn invite(&self, participant: &Identity) -> Notification {
        let kind = self
            .session
            .call_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "audio".to_string());
        info!(participant = %participant, "Invited to call");
        self.notifier.notify(
            NOTIFICATION_CALL,
            "Call invitation",
            &format!("{} invited {} to join the {kind} call", self.identity.mention(), participant.mention()),
        )
    }
}

impl ChatClient {
    /// Call controls bound to this tab's identity and notifications.
    pub fn call_controller(&self, context: CallContext, config: &ClientConfig) -> CallController {
        let options = CallOptions {
            offer_timeout: config.offer_timeout,
            ..CallOptions::default()
        };
        CallController::new(
            CallSession::new(context, options),
            self.notifier.clone(),
            self.identity.clone(),
        )
    }
}
