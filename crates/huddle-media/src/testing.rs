//! In-process stand-ins for the platform capabilities, for tests and for
//! running two tabs in one process.
//!
//! [`FakePeerFactory::new`] builds peers that report `Connected` as soon as
//! both descriptions are set, so two sessions on one hub negotiate a call
//! end to end. [`FakePeerFactory::manual`] peers never change state on
//! their own; tests drive them with [`FakePeer::emit`].
//! [`FakePeerFactory::failing`] and [`FakePeerFactory::rejecting_offers`]
//! break call setup at peer creation and at offer creation.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use huddle_shared::protocol::{IceCandidate, SessionDescription};

use crate::constraints::MediaConstraints;
use crate::devices::{LocalTrack, MediaDevices, MediaError, MediaStream, RemoteTrack, TrackKind};
use crate::peer::{
    PeerConnection, PeerConnectionError, PeerConnectionFactory, PeerConnectionState, PeerEvent,
    PeerHandle, RtcConfig,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceMode {
    Available,
    Unsupported,
    Denying,
}

/// Capture devices that hand out fresh tracks, refuse, or do not exist.
#[derive(Clone)]
pub struct FakeDevices {
    mode: DeviceMode,
    streams: Arc<Mutex<Vec<MediaStream>>>,
}

impl FakeDevices {
    pub fn available() -> Self {
        Self::with_mode(DeviceMode::Available)
    }

    pub fn unsupported() -> Self {
        Self::with_mode(DeviceMode::Unsupported)
    }

    /// Every request behaves like a declined permission prompt.
    pub fn denying() -> Self {
        Self::with_mode(DeviceMode::Denying)
    }

    fn with_mode(mode: DeviceMode) -> Self {
        Self {
            mode,
            streams: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Streams handed out so far.
    pub fn acquired(&self) -> usize {
        lock(&self.streams).len()
    }

    pub fn last_stream(&self) -> Option<MediaStream> {
        lock(&self.streams).last().cloned()
    }

    /// Whether every track ever handed out has been released.
    pub fn all_stopped(&self) -> bool {
        lock(&self.streams).iter().all(MediaStream::is_stopped)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    fn is_supported(&self) -> bool {
        self.mode != DeviceMode::Unsupported
    }

    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, MediaError> {
        match self.mode {
            DeviceMode::Unsupported => Err(MediaError::Unavailable),
            DeviceMode::Denying => Err(MediaError::PermissionDenied(
                "user dismissed the permission prompt".into(),
            )),
            DeviceMode::Available => {
                let mut tracks = vec![LocalTrack::new(TrackKind::Audio)];
                if constraints.wants_video() {
                    tracks.push(LocalTrack::new(TrackKind::Video));
                }
                let stream = MediaStream::new(tracks);
                lock(&self.streams).push(stream.clone());
                Ok(stream)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerFault {
    None,
    Create,
    Offer,
}

#[derive(Clone)]
pub struct FakePeerFactory {
    auto_connect: bool,
    fault: PeerFault,
    peers: Arc<Mutex<Vec<Arc<FakePeer>>>>,
}

impl FakePeerFactory {
    pub fn new() -> Self {
        Self {
            auto_connect: true,
            fault: PeerFault::None,
            peers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn manual() -> Self {
        Self {
            auto_connect: false,
            ..Self::new()
        }
    }

    /// Every `create` fails as if the platform refused a connection.
    pub fn failing() -> Self {
        Self {
            fault: PeerFault::Create,
            ..Self::new()
        }
    }

    /// Peers are created but cannot produce an offer.
    pub fn rejecting_offers() -> Self {
        Self {
            fault: PeerFault::Offer,
            ..Self::manual()
        }
    }

    pub fn created(&self) -> usize {
        lock(&self.peers).len()
    }

    /// The `index`-th peer created. Panics if there is none.
    pub fn peer(&self, index: usize) -> Arc<FakePeer> {
        lock(&self.peers)[index].clone()
    }
}

impl Default for FakePeerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerConnectionFactory for FakePeerFactory {
    fn create(&self, _config: &RtcConfig) -> Result<PeerHandle, PeerConnectionError> {
        if self.fault == PeerFault::Create {
            return Err(PeerConnectionError::Setup("no peer connections available".into()));
        }
        let (tx, events) = mpsc::unbounded_channel();
        let mut peers = lock(&self.peers);
        let peer = Arc::new(FakePeer {
            id: peers.len(),
            auto_connect: self.auto_connect,
            rejects_offers: self.fault == PeerFault::Offer,
            events: tx,
            state: Mutex::new(PeerState::default()),
        });
        peers.push(peer.clone());
        Ok(PeerHandle {
            connection: peer,
            events,
        })
    }
}

#[derive(Default)]
struct PeerState {
    tracks: Vec<LocalTrack>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
    offers_created: usize,
    connected: bool,
    closed: bool,
}

pub struct FakePeer {
    id: usize,
    auto_connect: bool,
    rejects_offers: bool,
    events: mpsc::UnboundedSender<PeerEvent>,
    state: Mutex<PeerState>,
}

impl FakePeer {
    /// Inject an event as if the platform had reported it.
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    pub fn tracks(&self) -> Vec<LocalTrack> {
        lock(&self.state).tracks.clone()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        lock(&self.state).local.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        lock(&self.state).remote.clone()
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        lock(&self.state).remote_candidates.clone()
    }

    pub fn offers_created(&self) -> usize {
        lock(&self.state).offers_created
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn check_open(state: &PeerState) -> Result<(), PeerConnectionError> {
        if state.closed {
            Err(PeerConnectionError::Closed)
        } else {
            Ok(())
        }
    }

    fn maybe_connect(&self, state: &mut PeerState) {
        if !self.auto_connect || state.connected || state.local.is_none() || state.remote.is_none() {
            return;
        }
        state.connected = true;
        self.emit(PeerEvent::StateChanged(PeerConnectionState::Connecting));
        self.emit(PeerEvent::StateChanged(PeerConnectionState::Connected));

        let mut kinds: Vec<TrackKind> = state.tracks.iter().map(LocalTrack::kind).collect();
        kinds.dedup();
        for kind in kinds {
            self.emit(PeerEvent::RemoteTrack(RemoteTrack {
                id: format!("remote-{}-{:?}", self.id, kind).to_lowercase(),
                kind,
            }));
        }
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn add_track(&self, track: &LocalTrack) -> Result<(), PeerConnectionError> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.tracks.push(track.clone());
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, PeerConnectionError> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        if self.rejects_offers {
            return Err(PeerConnectionError::Negotiation("offer rejected".into()));
        }
        state.offers_created += 1;
        Ok(SessionDescription::offer(format!(
            "v=0 fake-offer peer={} tracks={}",
            self.id,
            state.tracks.len()
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerConnectionError> {
        let state = lock(&self.state);
        Self::check_open(&state)?;
        if state.remote.is_none() {
            return Err(PeerConnectionError::NoRemoteDescription);
        }
        Ok(SessionDescription::answer(format!(
            "v=0 fake-answer peer={} tracks={}",
            self.id,
            state.tracks.len()
        )))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerConnectionError> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        let first = state.local.is_none();
        state.local = Some(description);
        if first {
            self.emit(PeerEvent::IceCandidate(IceCandidate::new(format!(
                "candidate:{} 1 udp 2122260223 127.0.0.1 {} typ host",
                self.id,
                50000 + self.id
            ))));
        }
        self.maybe_connect(&mut state);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), PeerConnectionError> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.remote = Some(description);
        self.maybe_connect(&mut state);
        Ok(())
    }

    fn has_remote_description(&self) -> bool {
        lock(&self.state).remote.is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerConnectionError> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        if state.remote.is_none() {
            return Err(PeerConnectionError::NoRemoteDescription);
        }
        state.remote_candidates.push(candidate);
        Ok(())
    }

    fn close(&self) {
        let mut state = lock(&self.state);
        if !state.closed {
            state.closed = true;
            self.emit(PeerEvent::StateChanged(PeerConnectionState::Closed));
        }
    }
}
