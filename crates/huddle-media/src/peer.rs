//! Peer-connection abstraction.
//!
//! A [`PeerConnection`] is one direct media link to the other party. The
//! platform implementation reports ICE candidates, connection-state changes
//! and incoming tracks as [`PeerEvent`]s on the channel handed out by its
//! [`PeerConnectionFactory`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use huddle_shared::constants::DEFAULT_STUN_SERVER;
use huddle_shared::protocol::{IceCandidate, SessionDescription};

use crate::devices::{LocalTrack, RemoteTrack};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerConnectionError {
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("No remote description set")]
    NoRemoteDescription,

    #[error("Peer connection is closed")]
    Closed,

    #[error("Peer connection setup failed: {0}")]
    Setup(String),
}

/// ICE configuration of a peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcConfig {
    pub ice_servers: Vec<String>,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    /// ICE finished checking every pair. Media flows as in `Connected`.
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// A local candidate to forward to the other party.
    IceCandidate(IceCandidate),
    StateChanged(PeerConnectionState),
    RemoteTrack(RemoteTrack),
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn add_track(&self, track: &LocalTrack) -> Result<(), PeerConnectionError>;

    async fn create_offer(&self) -> Result<SessionDescription, PeerConnectionError>;

    async fn create_answer(&self) -> Result<SessionDescription, PeerConnectionError>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerConnectionError>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), PeerConnectionError>;

    fn has_remote_description(&self) -> bool;

    /// Fails with [`PeerConnectionError::NoRemoteDescription`] before the
    /// remote description is set.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerConnectionError>;

    /// Tear the connection down. Safe to call more than once.
    fn close(&self);
}

/// A fresh connection together with its event feed.
pub struct PeerHandle {
    pub connection: Arc<dyn PeerConnection>,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
}

pub trait PeerConnectionFactory: Send + Sync {
    fn create(&self, config: &RtcConfig) -> Result<PeerHandle, PeerConnectionError>;
}
