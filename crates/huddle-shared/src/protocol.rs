use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::SessionId;

/// Which step of the offer/answer/ICE exchange an envelope carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP offer or answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A network path proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// Signaling message as it travels over a broadcast topic:
/// `{"kind": "offer"|"answer"|"ice", "sdp"?: .., "candidate"?: .., "from": <session id>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub kind: SignalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidate>,
    pub from: SessionId,
}

impl SignalEnvelope {
    pub fn offer(from: SessionId, sdp: SessionDescription) -> Self {
        Self {
            kind: SignalKind::Offer,
            sdp: Some(sdp),
            candidate: None,
            from,
        }
    }

    pub fn answer(from: SessionId, sdp: SessionDescription) -> Self {
        Self {
            kind: SignalKind::Answer,
            sdp: Some(sdp),
            candidate: None,
            from,
        }
    }

    pub fn ice(from: SessionId, candidate: IceCandidate) -> Self {
        Self {
            kind: SignalKind::Ice,
            sdp: None,
            candidate: Some(candidate),
            from,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and check that the payload required by `kind` is present.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Self = serde_json::from_slice(data)?;
        match envelope.kind {
            SignalKind::Offer | SignalKind::Answer if envelope.sdp.is_none() => Err(
                ProtocolError::Malformed(format!("{:?} without sdp", envelope.kind)),
            ),
            SignalKind::Ice if envelope.candidate.is_none() => Err(ProtocolError::Malformed(
                "ice without candidate".to_string(),
            )),
            _ => Ok(envelope),
        }
    }
}
