//! # huddle-media
//!
//! Calls between tabs: local capture, peer connections, the signaling
//! channel and the [`CallSession`] state machine that ties them together.
//! Also tracks playback of voice attachments.
//!
//! The platform side (camera/microphone, WebRTC stack) is reached only
//! through the [`MediaDevices`] and [`PeerConnectionFactory`] traits.

pub mod constraints;
pub mod devices;
pub mod peer;
pub mod playback;
pub mod session;
pub mod signaling;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use constraints::{AudioConstraints, MediaConstraints, VideoConstraints};
pub use devices::{LocalTrack, MediaDevices, MediaError, MediaStream, RemoteTrack, TrackKind};
pub use peer::{
    PeerConnection, PeerConnectionError, PeerConnectionFactory, PeerConnectionState, PeerEvent,
    PeerHandle, RtcConfig,
};
pub use playback::AudioPlaybackTracker;
pub use session::{CallContext, CallError, CallEvent, CallOptions, CallSession, CallState};
pub use signaling::{SignalingChannel, SignalingError};
