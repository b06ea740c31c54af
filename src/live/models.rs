use crate::api::models::Poll;
use crate::error::ChannelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POLL_CREATED: &str = "poll_created";
pub const VOTE: &str = "vote";
pub const LIKE: &str = "like";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteUpdate {
    pub poll_id: i64,
    pub option_id: i64,
    pub votes_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeUpdate {
    pub poll_id: i64,
    pub likes_count: u64,
}

/// A decoded push-channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    PollCreated(Poll),
    Vote(VoteUpdate),
    Like(LikeUpdate),
    Unknown { kind: String, payload: Value },
}

/// Wire envelope: `{"type": "...", "payload": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl PollEvent {
    pub fn kind(&self) -> &str {
        match self {
            PollEvent::PollCreated(_) => POLL_CREATED,
            PollEvent::Vote(_) => VOTE,
            PollEvent::Like(_) => LIKE,
            PollEvent::Unknown { kind, .. } => kind,
        }
    }

    pub fn poll_id(&self) -> Option<i64> {
        match self {
            PollEvent::PollCreated(poll) => Some(poll.id),
            PollEvent::Vote(update) => Some(update.poll_id),
            PollEvent::Like(update) => Some(update.poll_id),
            PollEvent::Unknown { .. } => None,
        }
    }

    /// Decodes one text frame. A known `type` with a payload that does not
    /// fit its shape is malformed, not unknown.
    pub fn decode(frame: &str) -> Result<Self, ChannelError> {
        let envelope: Envelope = serde_json::from_str(frame)?;

        let event = match envelope.kind.as_str() {
            POLL_CREATED => PollEvent::PollCreated(serde_json::from_value(envelope.payload)?),
            VOTE => PollEvent::Vote(serde_json::from_value(envelope.payload)?),
            LIKE => PollEvent::Like(serde_json::from_value(envelope.payload)?),
            _ => PollEvent::Unknown {
                kind: envelope.kind,
                payload: envelope.payload,
            },
        };

        Ok(event)
    }

    pub fn encode(&self) -> Result<String, ChannelError> {
        let payload = match self {
            PollEvent::PollCreated(poll) => serde_json::to_value(poll),
            PollEvent::Vote(update) => serde_json::to_value(update),
            PollEvent::Like(update) => serde_json::to_value(update),
            PollEvent::Unknown { payload, .. } => Ok(payload.clone()),
        }
        .map_err(|e| ChannelError::Encode(e.to_string()))?;

        let envelope = Envelope {
            kind: self.kind().to_string(),
            payload,
        };

        serde_json::to_string(&envelope).map_err(|e| ChannelError::Encode(e.to_string()))
    }
}
