// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Foreground/background mixing for agent audio.
//!
//! [`BackgroundMixer`] blends each inbound mu-law chunk of agent speech with
//! the next slice of the shared ambient track. The chain per sample:
//!
//! 1. mu-law decode, one-pole smoothing of the voice path
//! 2. pull the next background sample (independent wrapping cursor), apply
//!    the background gain and a gentler one-pole smoother
//! 3. sum, remove DC bias with a single-pole high-pass
//! 4. soft-limit with a tanh knee, hard clamp, mu-law encode
//!
//! All filter state is persistent across chunks and owned by the mixer, one
//! instance per session. The mixer's background cursor is distinct from the
//! background player's: the mixer pulls samples synchronously per voice
//! chunk, not on a timer.

use std::sync::Arc;

use crate::audio::ambient::AmbientTrack;
use crate::audio::codec::{linear_to_mulaw, mulaw_to_linear};
use crate::audio::utils::{clamp_i16, exp_smoothing};

/// Gain applied to the decoded agent voice.
const VOICE_GAIN: f64 = 1.0;
/// Gain applied to background samples before mixing.
const BACKGROUND_GAIN: f64 = 0.35;
/// One-pole smoothing coefficient for the voice path.
const VOICE_SMOOTHING: f64 = 0.18;
/// One-pole smoothing coefficient for the background path.
const BACKGROUND_SMOOTHING: f64 = 0.3;
/// Pole of the DC-removal high-pass.
const DC_POLE: f64 = 0.995;
/// Soft-limiter knee threshold.
const LIMIT_THRESHOLD: f64 = 26000.0;
/// Divisor applied to the excess before the tanh knee.
const LIMIT_KNEE: f64 = 5000.0;
/// Headroom above the threshold the knee may use (26000 + 6767 < 32768).
const LIMIT_RANGE: f64 = 6767.0;

/// Soft-limit a sample: compress the excess above the threshold through a
/// tanh knee instead of clipping hard.
fn soft_limit(sample: f64) -> f64 {
    if sample > LIMIT_THRESHOLD {
        let excess = sample - LIMIT_THRESHOLD;
        LIMIT_THRESHOLD + (excess / LIMIT_KNEE).tanh() * LIMIT_RANGE
    } else if sample < -LIMIT_THRESHOLD {
        let excess = sample + LIMIT_THRESHOLD;
        -LIMIT_THRESHOLD + (excess / LIMIT_KNEE).tanh() * LIMIT_RANGE
    } else {
        sample
    }
}

/// Per-session DSP chain blending agent voice with the ambient background.
#[derive(Debug)]
pub struct BackgroundMixer {
    track: Arc<AmbientTrack>,
    /// Read cursor into the track, in samples. Wraps to 0 at the end; the
    /// background is effectively an infinite loop for mixing purposes.
    cursor: usize,
    prev_voice: f64,
    prev_background: f64,
    dc_accumulator: f64,
}

impl BackgroundMixer {
    /// Create a mixer reading background samples from `track`.
    pub fn new(track: Arc<AmbientTrack>) -> Self {
        Self {
            track,
            cursor: 0,
            prev_voice: 0.0,
            prev_background: 0.0,
            dc_accumulator: 0.0,
        }
    }

    /// Mix one mu-law chunk of agent voice with the background.
    ///
    /// The input may be any length (not necessarily one frame); it is
    /// processed byte by byte and the output always has the same length as
    /// the input.
    pub fn mix_chunk(&mut self, ulaw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ulaw.len());

        for &byte in ulaw {
            let decoded = mulaw_to_linear(byte) as f64 * VOICE_GAIN;
            let voice = exp_smoothing(decoded, self.prev_voice, VOICE_SMOOTHING);
            self.prev_voice = voice;

            let raw_background = self.next_background_sample() as f64 * BACKGROUND_GAIN;
            let background =
                exp_smoothing(raw_background, self.prev_background, BACKGROUND_SMOOTHING);
            self.prev_background = background;

            let mixed = self.remove_dc(voice + background);
            let limited = soft_limit(mixed);

            out.push(linear_to_mulaw(clamp_i16(limited)));
        }

        out
    }

    /// Zero the background cursor and all filter state.
    ///
    /// Required whenever a session restarts its mixing context, e.g. a new
    /// call reusing the session slot.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.prev_voice = 0.0;
        self.prev_background = 0.0;
        self.dc_accumulator = 0.0;
    }

    /// Current background read cursor, in samples.
    pub fn background_cursor(&self) -> usize {
        self.cursor
    }

    fn next_background_sample(&mut self) -> i16 {
        if self.track.is_empty() {
            return 0;
        }
        if self.cursor >= self.track.len() {
            self.cursor = 0;
        }
        let sample = self.track.sample(self.cursor);
        self.cursor += 1;
        sample
    }

    fn remove_dc(&mut self, sample: f64) -> f64 {
        let filtered = sample - self.dc_accumulator;
        self.dc_accumulator = self.dc_accumulator * DC_POLE + sample * (1.0 - DC_POLE);
        filtered
    }
}
