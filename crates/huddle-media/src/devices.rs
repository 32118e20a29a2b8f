//! Local capture: the platform's camera/microphone capability and the
//! tracks it hands out.
//!
//! Tracks share their `enabled`/`stopped` flags between clones, so the
//! call session, the peer connection and the UI all observe the same
//! mute state without renegotiating anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::constraints::MediaConstraints;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The platform has no capture capability at all.
    #[error("Media capture is not available on this platform")]
    Unavailable,

    /// The user (or policy) declined camera/microphone access.
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    #[error("Media device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A captured audio or video track.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Disabled tracks keep the device open but send silence/black frames.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Release the device. Stopping twice is harmless.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(track = %self.id, kind = ?self.kind, "Track stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// The tracks acquired for one call.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<LocalTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &LocalTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &LocalTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn has_video(&self) -> bool {
        self.video_tracks().next().is_some()
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks.iter().all(LocalTrack::is_stopped)
    }
}

/// A track received from the other party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// The platform's media-capture capability.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether capture exists at all. Checked before a call touches any state.
    fn is_supported(&self) -> bool;

    /// Acquire a microphone track, plus a camera track when `constraints`
    /// ask for video.
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flags() {
        let track = LocalTrack::new(TrackKind::Audio);
        let seen_by_peer = track.clone();

        track.set_enabled(false);
        assert!(!seen_by_peer.is_enabled());

        let stream = MediaStream::new(vec![track, LocalTrack::new(TrackKind::Video)]);
        assert!(stream.has_video());
        stream.stop();
        stream.stop();
        assert!(seen_by_peer.is_stopped());
        assert!(stream.is_stopped());
    }
}
