// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Voice-agent envelopes.
//!
//! The conversational-AI agent speaks JSON over its own WebSocket. Only the
//! messages this engine acts on are modeled:
//!
//! - `audio` - an agent speech chunk as base64 mu-law. Two payload shapes
//!   exist in the wild (`audio.chunk` and `audio_event.audio_base_64`);
//!   both are accepted.
//! - `interruption` - the caller barged in; the telephony queue should be
//!   cleared.
//! - `ping` - keepalive carrying an event id that must be echoed in a
//!   `pong`.
//! - `conversation_initiation_metadata` - informational.
//!
//! Toward the agent, caller audio is forwarded as a `user_audio_chunk`
//! message.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::utils::helpers::decode_base64;

/// Top-level incoming agent message.
#[derive(Deserialize, Debug)]
struct AgentMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    audio: Option<AudioChunkPayload>,
    #[serde(default)]
    audio_event: Option<AudioEventPayload>,
    #[serde(default)]
    ping_event: Option<PingPayload>,
}

/// `audio.chunk` payload shape.
#[derive(Deserialize, Debug)]
struct AudioChunkPayload {
    #[serde(default)]
    chunk: Option<String>,
}

/// `audio_event.audio_base_64` payload shape.
#[derive(Deserialize, Debug)]
struct AudioEventPayload {
    #[serde(default)]
    audio_base_64: Option<String>,
}

/// `ping_event` payload.
#[derive(Deserialize, Debug)]
struct PingPayload {
    #[serde(default)]
    event_id: Option<u64>,
}

/// A parsed agent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// An agent speech chunk, decoded to raw mu-law bytes.
    Audio(Vec<u8>),
    /// The caller interrupted the agent.
    Interruption,
    /// Keepalive; answer with [`pong_message`].
    Ping { event_id: u64 },
    /// Conversation metadata; informational.
    InitMetadata,
}

/// Parse an incoming agent message.
///
/// Returns `None` for unparseable, unknown, or payload-less input; the
/// caller treats that as a malformed event.
pub fn parse(data: &[u8]) -> Option<AgentEvent> {
    let text = std::str::from_utf8(data).ok()?;
    let msg: AgentMessage = serde_json::from_str(text).ok()?;

    match msg.kind.as_str() {
        "conversation_initiation_metadata" => {
            debug!("agent: received initiation metadata");
            Some(AgentEvent::InitMetadata)
        }
        "audio" => {
            let payload = msg
                .audio
                .and_then(|a| a.chunk)
                .or_else(|| msg.audio_event.and_then(|a| a.audio_base_64));
            let payload = match payload {
                Some(p) => p,
                None => {
                    warn!("agent: audio message missing payload");
                    return None;
                }
            };
            match decode_base64(&payload) {
                Some(bytes) => Some(AgentEvent::Audio(bytes)),
                None => {
                    warn!("agent: failed to decode base64 audio payload");
                    None
                }
            }
        }
        "interruption" => Some(AgentEvent::Interruption),
        "ping" => {
            let event_id = match msg.ping_event.and_then(|p| p.event_id) {
                Some(id) => id,
                None => {
                    warn!("agent: ping missing event id");
                    return None;
                }
            };
            Some(AgentEvent::Ping { event_id })
        }
        other => {
            debug!("agent: unhandled message type '{}'", other);
            None
        }
    }
}

/// Build the `pong` reply for a ping event id.
pub fn pong_message(event_id: u64) -> String {
    serde_json::json!({
        "type": "pong",
        "event_id": event_id,
    })
    .to_string()
}

/// Wrap a caller audio payload (base64 mu-law) for forwarding to the agent.
pub fn user_audio_message(payload_b64: &str) -> String {
    serde_json::json!({
        "user_audio_chunk": payload_b64,
    })
    .to_string()
}
