// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Ambient background track: shared buffer type and offline synthesis.
//!
//! An [`AmbientTrack`] is produced once, ahead of time, either by the
//! generators in this module (see the `gen-ambient` binary) or by loading a
//! raw s16le 8 kHz mono asset. At run time the track is shared read-only
//! across all sessions behind an `Arc`; every session keeps its own cursors
//! into it.

use std::collections::HashSet;
use std::f64::consts::PI;
use std::path::Path;

use rand::Rng;

use crate::audio::utils::clamp_i16;
use crate::audio::SAMPLE_RATE;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// AmbientTrack
// ---------------------------------------------------------------------------

/// An immutable buffer of 16-bit mono samples at the telephony rate.
///
/// Constructed once and never mutated afterwards, so concurrent readers are
/// safe without locking. Sessions hold it behind an `Arc` and advance their
/// own independent cursors.
#[derive(Debug, Clone)]
pub struct AmbientTrack {
    samples: Vec<i16>,
}

impl AmbientTrack {
    /// Wrap an already-synthesized sample buffer.
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Load a raw ambient asset: signed 16-bit little-endian, mono, 8 kHz,
    /// no header.
    ///
    /// An unreadable or empty asset is fatal for session setup. An odd
    /// trailing byte is ignored with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| EngineError::AssetRead {
            path: path.display().to_string(),
            source,
        })?;

        if !data.len().is_multiple_of(2) {
            tracing::warn!(
                "ambient asset {}: odd length ({} bytes), trailing byte ignored",
                path.display(),
                data.len()
            );
        }

        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();

        if samples.is_empty() {
            return Err(EngineError::EmptyTrack);
        }

        tracing::info!(
            samples = samples.len(),
            seconds = samples.len() as f64 / SAMPLE_RATE as f64,
            "loaded ambient track {}",
            path.display()
        );
        Ok(Self { samples })
    }

    /// Number of samples in the track.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the track holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The sample at `index`. Callers are responsible for wrapping.
    pub fn sample(&self, index: usize) -> i16 {
        self.samples[index]
    }

    /// The full sample buffer.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Mains-hum frequency. 120 Hz survives narrowband telephony filtering
/// better than 60 Hz.
const HUM_FREQ_HZ: f64 = 120.0;

/// Scale of the pink/hum components into the audible 16-bit range.
const COMPONENT_SCALE: f64 = 3000.0;

/// Length of a typing-click transient (~5 ms at 8 kHz).
const CLICK_SAMPLES: usize = 40;

/// Peak amplitude of a click transient before its own amplitude scaling.
const CLICK_PEAK: f64 = 32000.0;

/// Parameters for the office-ambience generator.
#[derive(Debug, Clone)]
pub struct AmbientParams {
    /// Length of the loop in seconds.
    pub duration_secs: f64,
    /// Pink-noise level (0..1).
    pub noise_amplitude: f64,
    /// Low-frequency hum level (0..1).
    pub hum_amplitude: f64,
    /// Expected typing clicks per second.
    pub clicks_per_second: f64,
    /// Click transient amplitude (0..1).
    pub click_amplitude: f64,
}

impl Default for AmbientParams {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            noise_amplitude: 0.35,
            hum_amplitude: 0.08,
            clicks_per_second: 1.2,
            click_amplitude: 0.9,
        }
    }
}

/// Paul Kellet's 6-pole pink-noise filter.
///
/// Driven by uniform white noise in [-1, 1]; state persists across samples
/// within a generation run.
#[derive(Debug, Default)]
struct PinkFilter {
    b0: f64,
    b1: f64,
    b2: f64,
    b3: f64,
    b4: f64,
    b5: f64,
}

impl PinkFilter {
    fn next(&mut self, white: f64) -> f64 {
        self.b0 = 0.99886 * self.b0 + white * 0.0555179;
        self.b1 = 0.99332 * self.b1 + white * 0.0750759;
        self.b2 = 0.96900 * self.b2 + white * 0.1538520;
        self.b3 = 0.86650 * self.b3 + white * 0.3104856;
        self.b4 = 0.55000 * self.b4 + white * 0.5329522;
        self.b5 = -0.7616 * self.b5 - white * 0.0168980;

        self.b0 + self.b1 + self.b2 + self.b3 + self.b4 + self.b5 + white * 0.5362
    }
}

/// Generate plain white noise: each sample drawn independently and uniformly
/// from [-amplitude, amplitude], in raw sample units.
pub fn generate_white_noise(num_samples: usize, amplitude: f64) -> Vec<i16> {
    let mut rng = rand::thread_rng();
    (0..num_samples)
        .map(|_| clamp_i16(rng.gen_range(-1.0..=1.0) * amplitude))
        .collect()
}

/// Generate a telephony-friendly office ambience: pink noise, a 120 Hz hum,
/// and sparse typing-click transients, combined per sample and clamped into
/// the 16-bit range.
///
/// Click transients decay exponentially over [`CLICK_SAMPLES`] samples; the
/// tail of each click is written ahead into the output buffer and combined
/// additively (with clamping) with the per-sample value computed when the
/// main pass reaches that index.
pub fn generate_office_ambience(params: &AmbientParams) -> Vec<i16> {
    let num_samples = (SAMPLE_RATE as f64 * params.duration_secs).floor() as usize;
    let mut samples = vec![0i16; num_samples];
    if num_samples == 0 {
        return samples;
    }

    let mut rng = rand::thread_rng();
    let mut pink = PinkFilter::default();

    let hum_angular = 2.0 * PI * HUM_FREQ_HZ / SAMPLE_RATE as f64;
    let mut hum_phase = rng.gen::<f64>() * 2.0 * PI;

    // Precompute the click schedule.
    let total_clicks = (params.clicks_per_second * params.duration_secs).round() as usize;
    let mut click_starts: HashSet<usize> = HashSet::with_capacity(total_clicks);
    for _ in 0..total_clicks {
        click_starts.insert(rng.gen_range(0..num_samples));
    }

    for i in 0..num_samples {
        let white = rng.gen_range(-1.0..=1.0);
        let pink_sample = pink.next(white) * params.noise_amplitude;

        let hum = hum_phase.sin() * params.hum_amplitude;
        hum_phase += hum_angular;
        if hum_phase > 2.0 * PI {
            hum_phase -= 2.0 * PI;
        }

        let mut click = 0.0;
        if click_starts.contains(&i) {
            for k in 0..CLICK_SAMPLES {
                let idx = i + k;
                if idx >= num_samples {
                    break;
                }
                let decay = (-(k as f64) / 8.0).exp();
                let impulse =
                    rng.gen_range(-1.0..=1.0) * params.click_amplitude * CLICK_PEAK * decay;
                if k == 0 {
                    click += impulse;
                } else {
                    // Spill the transient tail ahead into the buffer; the
                    // main pass adds its own value there later.
                    samples[idx] = clamp_i16(samples[idx] as f64 + impulse);
                }
            }
        }

        let value = pink_sample * COMPONENT_SCALE + hum * COMPONENT_SCALE + click;
        samples[i] = clamp_i16(samples[i] as f64 + clamp_i16(value) as f64);
    }

    samples
}
