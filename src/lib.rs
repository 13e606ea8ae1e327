// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Undertone - ambient background audio for telephony voice agents.
//!
//! Undertone sits between a telephony media stream and a conversational-AI
//! voice agent. It keeps a looping ambient track playing underneath the call,
//! mixes the agent's speech over that background, and pauses/resumes the
//! background loop in lockstep with agent activity: the loop stops the moment
//! agent audio arrives and resumes once the telephony side has acknowledged
//! playback of every agent chunk.
//!
//! The transports themselves (WebSocket plumbing, HTTP call setup, vendor
//! authentication) live outside this crate; Undertone consumes and produces
//! the wire envelopes and owns the real-time audio path.

pub mod audio;
pub mod error;
pub mod prelude;
pub mod serializers;
pub mod session;
pub mod utils;
