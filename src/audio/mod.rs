// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Audio subsystem: codec, ambient synthesis, mixing, utilities.

pub mod ambient;
pub mod codec;
pub mod mixer;
pub mod utils;

use std::time::Duration;

/// Fixed sample rate of the telephony path (Hz).
pub const SAMPLE_RATE: u32 = 8000;

/// Samples per streaming frame (20 ms at 8 kHz mono).
pub const FRAME_SAMPLES: usize = 160;

/// Bytes per linear PCM frame (16-bit samples, little-endian).
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// Real-time duration of one frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);
