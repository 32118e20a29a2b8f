//! Call session state machine.
//!
//! ```text
//! Idle -> Requesting -> Offering -> Answering -> Connected -> Ended
//!                          \______________________/
//!             (any non-terminal state) -> Failed
//! ```
//!
//! [`CallSession::start_call`] acquires local media, opens the signaling
//! channel, creates the peer connection and publishes an offer. From then
//! on a driver task owns the signaling channel: it answers offers from the
//! other party, applies answers and ICE candidates, forwards local
//! candidates and moves the session to `Connected` when the peer
//! connection says so.
//!
//! Everything acquired for a call lives in one [`CallResources`] bundle.
//! Dropping the bundle stops the tracks, closes the peer connection and
//! stops the driver (which owns and thereby closes the signaling channel),
//! so every way out of a call releases the same things.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use huddle_net::BroadcastHub;
use huddle_shared::protocol::{IceCandidate, SignalEnvelope, SignalKind};
use huddle_shared::types::{CallType, ConversationId, SessionId};

use crate::constraints::MediaConstraints;
use crate::devices::{MediaDevices, MediaError, MediaStream, RemoteTrack};
use crate::peer::{
    PeerConnection, PeerConnectionError, PeerConnectionFactory, PeerConnectionState, PeerEvent,
    PeerHandle, RtcConfig,
};
use crate::signaling::{SignalingChannel, SignalingError};

const EVENT_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum CallError {
    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid call state: {0}")]
    InvalidState(String),

    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    #[error("Peer connection error: {0}")]
    PeerConnection(#[from] PeerConnectionError),

    #[error("No answer within {0:?}")]
    Timeout(Duration),
}

impl From<MediaError> for CallError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Unavailable => CallError::MediaUnavailable(e.to_string()),
            MediaError::PermissionDenied(reason) => CallError::PermissionDenied(reason),
            MediaError::Device(reason) => CallError::MediaUnavailable(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Idle,
    Requesting,
    Offering,
    Answering,
    Connected,
    Ended,
    Failed,
}

impl CallState {
    /// Whether a new call may start from this state.
    pub fn is_startable(self) -> bool {
        matches!(self, Self::Idle | Self::Ended | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.is_startable()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    StateChanged(CallState),
    RemoteTrack(RemoteTrack),
    MuteChanged(bool),
    CameraChanged(bool),
    Failed(String),
}

/// Platform capabilities a session works with.
#[derive(Clone)]
pub struct CallContext {
    pub devices: Arc<dyn MediaDevices>,
    pub peers: Arc<dyn PeerConnectionFactory>,
    pub hub: BroadcastHub,
}

#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub rtc: RtcConfig,
    /// Give up on an offer nobody answered. `None` waits forever.
    pub offer_timeout: Option<Duration>,
}

/// Everything a running call holds. Released on drop.
struct CallResources {
    stream: MediaStream,
    peer: Arc<dyn PeerConnection>,
    driver: Option<JoinHandle<()>>,
}

impl CallResources {
    /// Release and wait until the driver, and with it the signaling
    /// subscription, is gone.
    async fn release(mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
            let _ = driver.await;
        }
    }
}

impl Drop for CallResources {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.stream.stop();
        self.peer.close();
        debug!("Call resources released");
    }
}

struct Inner {
    state: CallState,
    call_type: Option<CallType>,
    resources: Option<CallResources>,
    remote_tracks: Vec<RemoteTrack>,
    connected_at: Option<Instant>,
    muted: bool,
    camera_on: bool,
}

struct Shared {
    session: SessionId,
    inner: Mutex<Inner>,
    events: broadcast::Sender<CallEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: CallEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn set_state(&self, inner: &mut Inner, state: CallState) {
        if inner.state == state {
            return;
        }
        debug!(session = %self.session.short(), from = ?inner.state, to = ?state, "Call state");
        inner.state = state;
        if state == CallState::Connected {
            inner.connected_at = Some(Instant::now());
        }
        self.emit(CallEvent::StateChanged(state));
    }

    /// Move to `Failed` and release the call. Returns the resources so the
    /// caller decides where they drop.
    fn fail(&self, reason: String) -> Option<CallResources> {
        let mut inner = self.lock();
        if !inner.state.is_active() {
            return None;
        }
        warn!(session = %self.session.short(), reason = %reason, "Call failed");
        self.set_state(&mut inner, CallState::Failed);
        inner.connected_at = None;
        self.emit(CallEvent::Failed(reason));
        inner.resources.take()
    }
}

/// One tab's call. Not persisted; a new session per page load.
pub struct CallSession {
    shared: Arc<Shared>,
    context: CallContext,
    options: CallOptions,
}

impl CallSession {
    pub fn new(context: CallContext, options: CallOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                session: SessionId::new(),
                inner: Mutex::new(Inner {
                    state: CallState::Idle,
                    call_type: None,
                    resources: None,
                    remote_tracks: Vec::new(),
                    connected_at: None,
                    muted: false,
                    camera_on: false,
                }),
                events,
            }),
            context,
            options,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.shared.session
    }

    pub fn state(&self) -> CallState {
        self.shared.lock().state
    }

    pub fn call_type(&self) -> Option<CallType> {
        self.shared.lock().call_type
    }

    pub fn is_muted(&self) -> bool {
        self.shared.lock().muted
    }

    pub fn is_camera_on(&self) -> bool {
        self.shared.lock().camera_on
    }

    pub fn remote_tracks(&self) -> Vec<RemoteTrack> {
        self.shared.lock().remote_tracks.clone()
    }

    /// Whole seconds since the session reached `Connected`; 0 otherwise.
    pub fn elapsed_seconds(&self) -> u64 {
        let inner = self.shared.lock();
        match (inner.state, inner.connected_at) {
            (CallState::Connected, Some(at)) => at.elapsed().as_secs(),
            _ => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.shared.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Start
    // ------------------------------------------------------------------

    /// Acquire media and publish an offer on the conversation's signaling
    /// topic (or the fallback topic without a conversation).
    ///
    /// `MediaUnavailable` is reported before anything changes. A declined
    /// permission prompt returns the session to `Idle` without opening
    /// signaling.
    pub async fn start_call(
        &self,
        call_type: CallType,
        conversation: Option<&ConversationId>,
    ) -> Result<(), CallError> {
        let shared = &self.shared;
        {
            let mut inner = shared.lock();
            if !inner.state.is_startable() {
                return Err(CallError::InvalidState(format!(
                    "a call is already {:?}",
                    inner.state
                )));
            }
            if !self.context.devices.is_supported() {
                return Err(MediaError::Unavailable.into());
            }
            inner.call_type = Some(call_type);
            inner.remote_tracks.clear();
            inner.connected_at = None;
            inner.muted = false;
            inner.camera_on = call_type.wants_video();
            shared.set_state(&mut inner, CallState::Requesting);
        }
        info!(session = %shared.session.short(), call_type = %call_type, "Starting call");

        let constraints = MediaConstraints::for_call(call_type);
        let stream = match self.context.devices.get_user_media(&constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                let mut inner = shared.lock();
                if inner.state == CallState::Requesting {
                    shared.set_state(&mut inner, CallState::Idle);
                }
                inner.call_type = None;
                warn!(session = %shared.session.short(), error = %e, "Media acquisition failed");
                return Err(e.into());
            }
        };

        if shared.lock().state != CallState::Requesting {
            stream.stop();
            return Err(CallError::InvalidState("call ended while requesting media".into()));
        }

        let mut signaling =
            SignalingChannel::open(&self.context.hub, conversation, shared.session.clone());

        let PeerHandle { connection, events } = match self.context.peers.create(&self.options.rtc) {
            Ok(handle) => handle,
            Err(e) => {
                stream.stop();
                signaling.close();
                drop(shared.fail(e.to_string()));
                return Err(e.into());
            }
        };

        // From here on the bundle owns the tracks and the connection.
        let mut resources = CallResources {
            stream,
            peer: connection.clone(),
            driver: None,
        };

        if let Err(e) = publish_offer(&resources, &signaling).await {
            signaling.close();
            drop(shared.fail(e.to_string()));
            resources.release().await;
            return Err(e);
        }

        let driver = Driver {
            shared: shared.clone(),
            peer: connection,
            signaling,
            peer_events: events,
            pending_ice: VecDeque::new(),
            offer_timeout: self.options.offer_timeout,
        };

        let abandoned = {
            let mut inner = shared.lock();
            if inner.state == CallState::Requesting {
                resources.driver = Some(tokio::spawn(driver.run()));
                inner.resources = Some(resources);
                shared.set_state(&mut inner, CallState::Offering);
                None
            } else {
                // Never spawned: dropping the driver drops its subscription.
                drop(driver);
                Some(resources)
            }
        };

        match abandoned {
            None => Ok(()),
            Some(resources) => {
                resources.release().await;
                Err(CallError::InvalidState("call ended while connecting".into()))
            }
        }
    }

    // ------------------------------------------------------------------
    // In-call controls
    // ------------------------------------------------------------------

    /// Flip the microphone. Returns whether it is now muted.
    pub fn toggle_mute(&self) -> Result<bool, CallError> {
        let mut inner = self.shared.lock();
        let resources = inner
            .resources
            .as_ref()
            .ok_or_else(|| CallError::InvalidState("no call in progress".into()))?;

        let muted = !inner.muted;
        for track in resources.stream.audio_tracks() {
            track.set_enabled(!muted);
        }
        inner.muted = muted;
        debug!(muted, "Microphone toggled");
        self.shared.emit(CallEvent::MuteChanged(muted));
        Ok(muted)
    }

    /// Flip the camera of a video call. Returns whether it is now on.
    pub fn toggle_camera(&self) -> Result<bool, CallError> {
        let mut inner = self.shared.lock();
        let resources = inner
            .resources
            .as_ref()
            .ok_or_else(|| CallError::InvalidState("no call in progress".into()))?;
        if !resources.stream.has_video() {
            return Err(CallError::InvalidState("audio call has no camera".into()));
        }

        let camera_on = !inner.camera_on;
        for track in resources.stream.video_tracks() {
            track.set_enabled(camera_on);
        }
        inner.camera_on = camera_on;
        debug!(camera_on, "Camera toggled");
        self.shared.emit(CallEvent::CameraChanged(camera_on));
        Ok(camera_on)
    }

    // ------------------------------------------------------------------
    // End
    // ------------------------------------------------------------------

    /// Hang up and release everything. Safe in any state, any number of
    /// times; an idle session stays idle.
    pub async fn end_call(&self) {
        let resources = {
            let mut inner = self.shared.lock();
            if inner.state.is_active() {
                info!(session = %self.shared.session.short(), "Ending call");
                self.shared.set_state(&mut inner, CallState::Ended);
            }
            inner.connected_at = None;
            inner.remote_tracks.clear();
            inner.resources.take()
        };
        if let Some(resources) = resources {
            resources.release().await;
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        // The driver holds `shared`; break the cycle.
        drop(self.shared.lock().resources.take());
    }
}

async fn publish_offer(resources: &CallResources, signaling: &SignalingChannel) -> Result<(), CallError> {
    for track in resources.stream.tracks() {
        resources.peer.add_track(track)?;
    }
    let offer = resources.peer.create_offer().await?;
    resources.peer.set_local_description(offer.clone()).await?;
    signaling.send(&SignalEnvelope::offer(signaling.session().clone(), offer))?;
    Ok(())
}

// ----------------------------------------------------------------------
// Driver
// ----------------------------------------------------------------------

struct Driver {
    shared: Arc<Shared>,
    peer: Arc<dyn PeerConnection>,
    signaling: SignalingChannel,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    /// Candidates that arrived before the remote description.
    pending_ice: VecDeque<IceCandidate>,
    offer_timeout: Option<Duration>,
}

impl Driver {
    async fn run(mut self) {
        let offer_timer = tokio::time::sleep(self.offer_timeout.unwrap_or(Duration::ZERO));
        tokio::pin!(offer_timer);
        let mut awaiting_answer = self.offer_timeout.is_some();

        loop {
            tokio::select! {
                envelope = self.signaling.recv() => {
                    let Some(envelope) = envelope else { break };
                    if let Err(e) = self.handle_signal(envelope).await {
                        self.abort(e.to_string());
                        break;
                    }
                    if self.peer.has_remote_description() {
                        awaiting_answer = false;
                    }
                }
                event = self.peer_events.recv() => {
                    let Some(event) = event else { break };
                    if !self.handle_peer_event(event) {
                        break;
                    }
                }
                () = &mut offer_timer, if awaiting_answer => {
                    awaiting_answer = false;
                    if self.shared.lock().state == CallState::Offering {
                        let timeout = self.offer_timeout.unwrap_or_default();
                        self.abort(CallError::Timeout(timeout).to_string());
                        break;
                    }
                }
            }
        }
        self.signaling.close();
    }

    fn abort(&mut self, reason: String) {
        self.signaling.close();
        // Also aborts this task. `run` returns before its next await.
        drop(self.shared.fail(reason));
    }

    async fn handle_signal(&mut self, envelope: SignalEnvelope) -> Result<(), CallError> {
        match envelope.kind {
            SignalKind::Offer => {
                let Some(offer) = envelope.sdp else { return Ok(()) };
                self.peer.set_remote_description(offer).await?;
                self.flush_pending_ice().await;

                let answer = self.peer.create_answer().await?;
                self.peer.set_local_description(answer.clone()).await?;
                self.signaling
                    .send(&SignalEnvelope::answer(self.shared.session.clone(), answer))?;

                let mut inner = self.shared.lock();
                if inner.state == CallState::Offering {
                    self.shared.set_state(&mut inner, CallState::Answering);
                }
                info!(session = %self.shared.session.short(), to = %envelope.from.short(), "Answered offer");
            }
            SignalKind::Answer => {
                if self.peer.has_remote_description() {
                    debug!(from = %envelope.from.short(), "Ignoring answer, already negotiated");
                    return Ok(());
                }
                let Some(answer) = envelope.sdp else { return Ok(()) };
                self.peer.set_remote_description(answer).await?;
                self.flush_pending_ice().await;
                info!(session = %self.shared.session.short(), from = %envelope.from.short(), "Offer answered");
            }
            SignalKind::Ice => {
                let Some(candidate) = envelope.candidate else { return Ok(()) };
                if self.peer.has_remote_description() {
                    self.add_ice(candidate).await;
                } else {
                    self.pending_ice.push_back(candidate);
                }
            }
        }
        Ok(())
    }

    async fn flush_pending_ice(&mut self) {
        while let Some(candidate) = self.pending_ice.pop_front() {
            self.add_ice(candidate).await;
        }
    }

    async fn add_ice(&self, candidate: IceCandidate) {
        if let Err(e) = self.peer.add_ice_candidate(candidate).await {
            warn!(error = %e, "Rejected ICE candidate");
        }
    }

    /// Returns `false` once the call is over.
    fn handle_peer_event(&mut self, event: PeerEvent) -> bool {
        match event {
            PeerEvent::IceCandidate(candidate) => {
                let envelope = SignalEnvelope::ice(self.shared.session.clone(), candidate);
                if let Err(e) = self.signaling.send(&envelope) {
                    warn!(error = %e, "Could not publish ICE candidate");
                }
            }
            PeerEvent::StateChanged(state) if state.is_connected() => {
                let mut inner = self.shared.lock();
                if matches!(inner.state, CallState::Offering | CallState::Answering) {
                    info!(session = %self.shared.session.short(), "Call connected");
                    self.shared.set_state(&mut inner, CallState::Connected);
                }
            }
            PeerEvent::StateChanged(PeerConnectionState::Failed) => {
                self.abort("peer connection failed".into());
                return false;
            }
            PeerEvent::StateChanged(PeerConnectionState::Disconnected) => {
                warn!(session = %self.shared.session.short(), "Peer disconnected");
            }
            PeerEvent::StateChanged(state) => {
                debug!(?state, "Peer connection state");
            }
            PeerEvent::RemoteTrack(track) => {
                debug!(track = %track.id, kind = ?track.kind, "Remote track");
                self.shared.lock().remote_tracks.push(track.clone());
                self.shared.emit(CallEvent::RemoteTrack(track));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevices, FakePeerFactory};
    use huddle_shared::protocol::SessionDescription;

    fn context(devices: FakeDevices, peers: &FakePeerFactory, hub: &BroadcastHub) -> CallContext {
        CallContext {
            devices: Arc::new(devices),
            peers: Arc::new(peers.clone()),
            hub: hub.clone(),
        }
    }

    async fn wait_for(session: &CallSession, state: CallState) {
        for _ in 0..200 {
            if session.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session stuck in {:?}, wanted {:?}", session.state(), state);
    }

    #[tokio::test]
    async fn unsupported_platform_fails_before_any_change() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let session = CallSession::new(
            context(FakeDevices::unsupported(), &peers, &hub),
            CallOptions::default(),
        );
        let mut events = session.subscribe();

        let result = session.start_call(CallType::Audio, None).await;
        assert!(matches!(result, Err(CallError::MediaUnavailable(_))));
        assert_eq!(session.state(), CallState::Idle);
        assert!(events.try_recv().is_err());
        assert_eq!(peers.created(), 0);
    }

    #[tokio::test]
    async fn denied_permission_returns_to_idle_without_signaling() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let conv = ConversationId::from("conv_1");
        let session = CallSession::new(
            context(FakeDevices::denying(), &peers, &hub),
            CallOptions::default(),
        );

        let result = session.start_call(CallType::Video, Some(&conv)).await;
        assert!(matches!(result, Err(CallError::PermissionDenied(_))));
        assert_eq!(session.state(), CallState::Idle);
        assert_eq!(hub.subscriber_count("webrtc-conv_1"), 0);
        assert_eq!(peers.created(), 0);
    }

    #[tokio::test]
    async fn start_publishes_an_offer() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let conv = ConversationId::from("conv_1");
        let mut observer = SignalingChannel::open(&hub, Some(&conv), SessionId::new());
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );

        session.start_call(CallType::Video, Some(&conv)).await.unwrap();

        assert_eq!(session.state(), CallState::Offering);
        assert_eq!(session.call_type(), Some(CallType::Video));
        let offer = observer.recv().await.unwrap();
        assert_eq!(offer.kind, SignalKind::Offer);
        assert_eq!(&offer.from, session.session_id());
        assert_eq!(peers.peer(0).tracks().len(), 2);
        assert!(matches!(
            session.start_call(CallType::Audio, Some(&conv)).await,
            Err(CallError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn ice_before_remote_description_is_queued() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::manual();
        let conv = ConversationId::from("conv_q");
        let remote = SessionId::new();
        let remote_channel = SignalingChannel::open(&hub, Some(&conv), remote.clone());
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );
        session.start_call(CallType::Audio, Some(&conv)).await.unwrap();

        remote_channel
            .send(&SignalEnvelope::ice(remote.clone(), IceCandidate::new("candidate:early")))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(peers.peer(0).remote_candidates().is_empty());

        remote_channel
            .send(&SignalEnvelope::answer(remote, SessionDescription::answer("remote")))
            .unwrap();
        for _ in 0..100 {
            if !peers.peer(0).remote_candidates().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            peers.peer(0).remote_candidates(),
            vec![IceCandidate::new("candidate:early")]
        );
        assert_eq!(session.state(), CallState::Offering);
    }

    #[tokio::test]
    async fn incoming_offer_is_answered_and_connects() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let conv = ConversationId::from("conv_a");
        let remote = SessionId::new();
        let mut remote_channel = SignalingChannel::open(&hub, Some(&conv), remote.clone());
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );
        let mut events = session.subscribe();
        session.start_call(CallType::Audio, Some(&conv)).await.unwrap();

        remote_channel
            .send(&SignalEnvelope::offer(remote, SessionDescription::offer("remote offer")))
            .unwrap();

        // Our offer, our ICE candidate, then the answer.
        let mut kinds = Vec::new();
        while !kinds.contains(&SignalKind::Answer) {
            kinds.push(remote_channel.recv().await.unwrap().kind);
        }
        wait_for(&session, CallState::Connected).await;

        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let CallEvent::StateChanged(state) = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                CallState::Requesting,
                CallState::Offering,
                CallState::Answering,
                CallState::Connected
            ]
        );
        assert_eq!(session.remote_tracks().len(), 1);
    }

    #[tokio::test]
    async fn end_call_releases_everything_and_is_idempotent() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let devices = FakeDevices::available();
        let conv = ConversationId::from("conv_e");
        let session = CallSession::new(context(devices.clone(), &peers, &hub), CallOptions::default());
        session.start_call(CallType::Video, Some(&conv)).await.unwrap();
        assert_eq!(hub.subscriber_count("webrtc-conv_e"), 1);

        session.end_call().await;
        session.end_call().await;

        assert_eq!(session.state(), CallState::Ended);
        assert!(devices.all_stopped());
        assert!(peers.peer(0).is_closed());
        assert_eq!(hub.subscriber_count("webrtc-conv_e"), 0);
        assert!(matches!(session.toggle_mute(), Err(CallError::InvalidState(_))));

        // A fresh call may follow.
        session.start_call(CallType::Audio, Some(&conv)).await.unwrap();
        assert_eq!(session.state(), CallState::Offering);
    }

    #[tokio::test]
    async fn end_call_on_idle_session_is_a_no_op() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );
        session.end_call().await;
        assert_eq!(session.state(), CallState::Idle);
    }

    #[tokio::test]
    async fn toggles_flip_tracks_without_renegotiation() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let devices = FakeDevices::available();
        let session = CallSession::new(context(devices.clone(), &peers, &hub), CallOptions::default());
        session.start_call(CallType::Video, None).await.unwrap();
        let offers_before = peers.peer(0).offers_created();

        assert!(session.toggle_mute().unwrap());
        assert!(!devices.last_stream().unwrap().audio_tracks().any(|t| t.is_enabled()));
        assert!(!session.toggle_mute().unwrap());

        assert!(!session.toggle_camera().unwrap());
        assert!(!devices.last_stream().unwrap().video_tracks().any(|t| t.is_enabled()));
        assert!(!session.is_camera_on());

        assert_eq!(peers.peer(0).offers_created(), offers_before);
    }

    #[tokio::test]
    async fn audio_call_has_no_camera_to_toggle() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::new();
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );
        session.start_call(CallType::Audio, None).await.unwrap();
        assert!(matches!(session.toggle_camera(), Err(CallError::InvalidState(_))));
    }

    #[tokio::test]
    async fn peer_failure_fails_the_call() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::manual();
        let devices = FakeDevices::available();
        let session = CallSession::new(context(devices.clone(), &peers, &hub), CallOptions::default());
        session.start_call(CallType::Audio, None).await.unwrap();

        peers
            .peer(0)
            .emit(PeerEvent::StateChanged(PeerConnectionState::Failed));
        wait_for(&session, CallState::Failed).await;

        assert!(devices.all_stopped());
        assert!(peers.peer(0).is_closed());
        session.end_call().await;
        assert_eq!(session.state(), CallState::Failed);
    }

    /// Setup failed partway: nothing held, nothing published.
    async fn assert_setup_released(
        devices: &FakeDevices,
        hub: &BroadcastHub,
        observer: &mut SignalingChannel,
        session: &CallSession,
    ) {
        assert_eq!(session.state(), CallState::Failed);
        assert!(devices.all_stopped());
        // Only the observer is still subscribed.
        assert_eq!(hub.subscriber_count(observer.name()), 1);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), observer.recv())
                .await
                .is_err(),
            "an envelope reached the topic"
        );
    }

    #[tokio::test]
    async fn peer_creation_failure_releases_media_and_signaling() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::failing();
        let devices = FakeDevices::available();
        let conv = ConversationId::from("conv_pf");
        let mut observer = SignalingChannel::open(&hub, Some(&conv), SessionId::new());
        let session = CallSession::new(context(devices.clone(), &peers, &hub), CallOptions::default());

        let result = session.start_call(CallType::Video, Some(&conv)).await;
        assert!(matches!(
            result,
            Err(CallError::PeerConnection(PeerConnectionError::Setup(_)))
        ));
        assert_eq!(devices.acquired(), 1);
        assert_eq!(peers.created(), 0);
        assert_setup_released(&devices, &hub, &mut observer, &session).await;
    }

    #[tokio::test]
    async fn offer_failure_releases_media_peer_and_signaling() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::rejecting_offers();
        let devices = FakeDevices::available();
        let conv = ConversationId::from("conv_of");
        let mut observer = SignalingChannel::open(&hub, Some(&conv), SessionId::new());
        let session = CallSession::new(context(devices.clone(), &peers, &hub), CallOptions::default());

        let result = session.start_call(CallType::Audio, Some(&conv)).await;
        assert!(matches!(
            result,
            Err(CallError::PeerConnection(PeerConnectionError::Negotiation(_)))
        ));
        assert!(peers.peer(0).is_closed());
        assert_setup_released(&devices, &hub, &mut observer, &session).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_offer_times_out_when_configured() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::manual();
        let devices = FakeDevices::available();
        let options = CallOptions {
            offer_timeout: Some(Duration::from_secs(30)),
            ..CallOptions::default()
        };
        let session = CallSession::new(context(devices.clone(), &peers, &hub), options);
        let mut events = session.subscribe();
        session.start_call(CallType::Audio, None).await.unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(session.state(), CallState::Offering);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(session.state(), CallState::Failed);
        assert!(devices.all_stopped());

        let mut failure = None;
        while let Ok(event) = events.try_recv() {
            if let CallEvent::Failed(reason) = event {
                failure = Some(reason);
            }
        }
        assert!(failure.unwrap().contains("No answer"));
    }

    #[tokio::test(start_paused = true)]
    async fn offers_wait_forever_by_default() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::manual();
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );
        session.start_call(CallType::Audio, None).await.unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(session.state(), CallState::Offering);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_counts_from_connected() {
        let hub = BroadcastHub::new();
        let peers = FakePeerFactory::manual();
        let session = CallSession::new(
            context(FakeDevices::available(), &peers, &hub),
            CallOptions::default(),
        );
        session.start_call(CallType::Audio, None).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.elapsed_seconds(), 0);

        peers
            .peer(0)
            .emit(PeerEvent::StateChanged(PeerConnectionState::Connected));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.state(), CallState::Connected);

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(session.elapsed_seconds(), 65);

        session.end_call().await;
        assert_eq!(session.elapsed_seconds(), 0);
    }
}
