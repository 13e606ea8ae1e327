// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Common re-exports for convenient use of the engine.
//!
//! ```
//! use undertone::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::audio::ambient::{
    generate_office_ambience, generate_white_noise, AmbientParams, AmbientTrack,
};
pub use crate::audio::codec::{linear_to_mulaw, mulaw_to_linear, mulaw_to_pcm, pcm_to_mulaw};
pub use crate::audio::mixer::BackgroundMixer;
pub use crate::audio::{FRAME_BYTES, FRAME_DURATION, FRAME_SAMPLES, SAMPLE_RATE};
pub use crate::error::EngineError;
pub use crate::serializers::agent::AgentEvent;
pub use crate::serializers::media_stream::{OutboundMessage, StreamEvent, Track};
pub use crate::session::background::BackgroundPlayer;
pub use crate::session::sync::{PlaybackCoordinator, PlaybackState, SyncAction};
pub use crate::session::{AgentLink, CallControl, CallSession, SessionConfig, SessionEvent};
