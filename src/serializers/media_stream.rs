// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Telephony media-stream envelopes.
//!
//! The telephony side sends JSON messages over a WebSocket with the
//! following event types:
//!
//! - `connected` - initial connection established
//! - `start` - stream started, carries the stream and call ids
//! - `media` - caller audio payload as base64-encoded mu-law at 8 kHz mono
//! - `mark` - playback acknowledgment for a previously sent mark
//! - `stop` - stream stopped
//!
//! Outgoing messages:
//!
//! - `media` - base64 mu-law audio with a track label (`background` for the
//!   ambient loop, `outbound` for mixed agent audio), a monotonically
//!   increasing chunk number, and a millisecond timestamp
//! - `mark` - playback-tracking marker; the far end answers with a `mark`
//!   event once the audio sent before it has finished playing
//! - `clear` - flush the remote audio queue (interruptions)

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Outgoing messages
// ---------------------------------------------------------------------------

/// Track label on outbound media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// The ambient background loop.
    Background,
    /// Mixed agent audio.
    Outbound,
}

/// Outgoing media payload.
#[derive(Debug, Clone, Serialize)]
pub struct MediaPayload {
    /// Base64-encoded mu-law bytes.
    pub payload: String,
    pub track: Track,
    /// Monotonically increasing sequence number, as a decimal string.
    pub chunk: String,
    /// Milliseconds since the epoch, as a decimal string.
    pub timestamp: String,
}

/// Outgoing media message.
#[derive(Debug, Clone, Serialize)]
pub struct MediaMessage {
    pub event: &'static str,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    pub media: MediaPayload,
}

/// Outgoing mark payload.
#[derive(Debug, Clone, Serialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Outgoing mark message.
#[derive(Debug, Clone, Serialize)]
pub struct MarkMessage {
    pub event: &'static str,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    pub mark: MarkPayload,
}

/// Outgoing clear message.
#[derive(Debug, Clone, Serialize)]
pub struct ClearMessage {
    pub event: &'static str,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

/// Any message the engine emits toward the telephony side.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Media(MediaMessage),
    Mark(MarkMessage),
    Clear(ClearMessage),
}

impl OutboundMessage {
    /// Build a media message for the given destination.
    pub fn media(
        stream_sid: &str,
        payload: String,
        track: Track,
        sequence: u64,
        timestamp: String,
    ) -> Self {
        Self::Media(MediaMessage {
            event: "media",
            stream_sid: stream_sid.to_string(),
            media: MediaPayload {
                payload,
                track,
                chunk: sequence.to_string(),
                timestamp,
            },
        })
    }

    /// Build a mark message requesting a playback acknowledgment.
    pub fn mark(stream_sid: &str, name: String) -> Self {
        Self::Mark(MarkMessage {
            event: "mark",
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload { name },
        })
    }

    /// Build a clear message flushing the remote audio queue.
    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear(ClearMessage {
            event: "clear",
            stream_sid: stream_sid.to_string(),
        })
    }

    /// Serialize to wire JSON.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// The media message, if this is one.
    pub fn as_media(&self) -> Option<&MediaMessage> {
        match self {
            Self::Media(m) => Some(m),
            _ => None,
        }
    }

    /// The mark message, if this is one.
    pub fn as_mark(&self) -> Option<&MarkMessage> {
        match self {
            Self::Mark(m) => Some(m),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Incoming messages
// ---------------------------------------------------------------------------

/// Top-level incoming message.
#[derive(Deserialize, Debug)]
struct StreamMessage {
    event: String,
    #[serde(default)]
    start: Option<StartPayload>,
    #[serde(default)]
    media: Option<MediaIn>,
    #[serde(default)]
    mark: Option<MarkIn>,
}

/// Payload for the "start" event.
#[derive(Deserialize, Debug)]
struct StartPayload {
    #[serde(rename = "streamSid")]
    stream_sid: String,
    #[serde(rename = "callSid", default)]
    call_sid: Option<String>,
}

/// Payload for the "media" event.
#[derive(Deserialize, Debug)]
struct MediaIn {
    payload: String,
}

/// Payload for the "mark" event.
#[derive(Deserialize, Debug)]
struct MarkIn {
    name: String,
}

/// A parsed telephony event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Connection established; informational.
    Connected,
    /// Stream started; carries the destination and call identifiers.
    Start {
        stream_sid: String,
        call_sid: Option<String>,
    },
    /// Caller audio, still base64-encoded mu-law.
    Media { payload: String },
    /// A previously sent mark has finished playing.
    Mark { name: String },
    /// Stream stopped.
    Stop,
}

/// Parse an incoming telephony message.
///
/// Returns `None` for unparseable or unknown input; the caller is expected
/// to treat that as a malformed event (log, drop, reset the session to
/// idle).
pub fn parse(data: &[u8]) -> Option<StreamEvent> {
    let text = std::str::from_utf8(data).ok()?;
    let msg: StreamMessage = serde_json::from_str(text).ok()?;

    match msg.event.as_str() {
        "connected" => {
            debug!("media stream: connected");
            Some(StreamEvent::Connected)
        }
        "start" => {
            let start = match msg.start {
                Some(start) => start,
                None => {
                    warn!("media stream: start event missing start payload");
                    return None;
                }
            };
            debug!("media stream: started, streamSid={}", start.stream_sid);
            Some(StreamEvent::Start {
                stream_sid: start.stream_sid,
                call_sid: start.call_sid,
            })
        }
        "media" => {
            let media = msg.media?;
            Some(StreamEvent::Media {
                payload: media.payload,
            })
        }
        "mark" => {
            let mark = match msg.mark {
                Some(mark) => mark,
                None => {
                    warn!("media stream: mark event missing mark payload");
                    return None;
                }
            };
            debug!("media stream: mark received, name={}", mark.name);
            Some(StreamEvent::Mark { name: mark.name })
        }
        "stop" => {
            debug!("media stream: stopped");
            Some(StreamEvent::Stop)
        }
        other => {
            warn!("media stream: unknown event type '{}'", other);
            None
        }
    }
}
