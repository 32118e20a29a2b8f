//! Signaling channel: the pub/sub topic a call exchanges offer/answer/ICE
//! envelopes over.
//!
//! Every tab subscribed to the same topic receives every envelope,
//! including the ones it published itself. [`SignalingChannel::recv`]
//! drops those by comparing the envelope's `from` with the local session
//! id, so callers only ever see the other party's envelopes.

use thiserror::Error;
use tracing::{debug, warn};

use huddle_net::{BroadcastHub, HubError, Topic};
use huddle_shared::constants::FALLBACK_SIGNALING_TOPIC;
use huddle_shared::protocol::SignalEnvelope;
use huddle_shared::types::{ConversationId, SessionId};
use huddle_shared::ProtocolError;

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("Signaling transport error: {0}")]
    Transport(#[from] HubError),

    #[error("Signaling envelope error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Topic name for a call in `conversation`, or the global fallback.
pub fn topic_name(conversation: Option<&ConversationId>) -> String {
    conversation
        .map(ConversationId::to_signaling_topic)
        .unwrap_or_else(|| FALLBACK_SIGNALING_TOPIC.to_string())
}

pub struct SignalingChannel {
    topic: Topic,
    session: SessionId,
}

impl SignalingChannel {
    pub fn open(hub: &BroadcastHub, conversation: Option<&ConversationId>, session: SessionId) -> Self {
        let topic = hub.open(&topic_name(conversation));
        debug!(topic = %topic.name(), session = %session.short(), "Signaling channel opened");
        Self { topic, session }
    }

    pub fn name(&self) -> &str {
        self.topic.name()
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.topic.is_closed()
    }

    pub fn send(&self, envelope: &SignalEnvelope) -> Result<(), SignalingError> {
        let data = envelope.to_bytes()?;
        let delivered = self.topic.publish(data)?;
        debug!(
            topic = %self.topic.name(),
            kind = ?envelope.kind,
            delivered,
            "Signal published"
        );
        Ok(())
    }

    /// Next envelope from another session. Undecodable payloads are
    /// logged and skipped. Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<SignalEnvelope> {
        loop {
            let data = self.topic.recv().await?;
            let envelope = match SignalEnvelope::from_bytes(&data) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(topic = %self.topic.name(), error = %e, "Dropping malformed signal");
                    continue;
                }
            };
            if envelope.from == self.session {
                continue;
            }
            debug!(
                topic = %self.topic.name(),
                kind = ?envelope.kind,
                from = %envelope.from.short(),
                "Signal received"
            );
            return Some(envelope);
        }
    }

    pub fn close(&mut self) {
        self.topic.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_shared::protocol::{IceCandidate, SessionDescription, SignalKind};

    #[tokio::test]
    async fn own_envelopes_are_never_delivered() {
        let hub = BroadcastHub::new();
        let conv = ConversationId::from("conv_1");
        let me = SessionId::new();
        let other = SessionId::new();
        let mut mine = SignalingChannel::open(&hub, Some(&conv), me.clone());
        let theirs = SignalingChannel::open(&hub, Some(&conv), other.clone());
        assert_eq!(mine.name(), "webrtc-conv_1");

        mine.send(&SignalEnvelope::offer(me, SessionDescription::offer("mine")))
            .unwrap();
        theirs
            .send(&SignalEnvelope::ice(other.clone(), IceCandidate::new("candidate:1")))
            .unwrap();

        let received = mine.recv().await.unwrap();
        assert_eq!(received.kind, SignalKind::Ice);
        assert_eq!(received.from, other);
    }

    #[tokio::test]
    async fn malformed_payloads_are_skipped() {
        let hub = BroadcastHub::new();
        let mut channel = SignalingChannel::open(&hub, None, SessionId::new());
        assert_eq!(channel.name(), FALLBACK_SIGNALING_TOPIC);

        let raw = hub.open(FALLBACK_SIGNALING_TOPIC);
        raw.publish(&b"not json"[..]).unwrap();
        raw.publish(&br#"{"kind":"offer","from":"6f1c1f9e-4a8e-4f53-9d3a-0c6d1e2f3a4b"}"#[..])
            .unwrap();
        let other = SessionId::new();
        raw.publish(
            SignalEnvelope::answer(other, SessionDescription::answer("ok"))
                .to_bytes()
                .unwrap(),
        )
        .unwrap();

        let received = channel.recv().await.unwrap();
        assert_eq!(received.kind, SignalKind::Answer);
    }

    #[tokio::test]
    async fn peers_with_non_uuid_session_ids_are_heard() {
        let hub = BroadcastHub::new();
        let mut channel = SignalingChannel::open(&hub, None, SessionId::new());

        let raw = hub.open(FALLBACK_SIGNALING_TOPIC);
        raw.publish(&br#"{"kind":"ice","candidate":{"candidate":"c"},"from":"tab-7"}"#[..])
            .unwrap();

        let received = channel.recv().await.unwrap();
        assert_eq!(received.from.as_str(), "tab-7");
    }

    #[tokio::test]
    async fn closed_channel_rejects_and_ends() {
        let hub = BroadcastHub::new();
        let session = SessionId::new();
        let mut channel = SignalingChannel::open(&hub, None, session.clone());
        channel.close();
        channel.close();

        assert!(channel.is_closed());
        assert!(channel.recv().await.is_none());
        assert!(matches!(
            channel.send(&SignalEnvelope::ice(session, IceCandidate::new("c"))),
            Err(SignalingError::Transport(_))
        ));
    }
}
