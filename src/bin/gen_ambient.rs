// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Offline ambient-track generator.
//!
//! Synthesizes a looping background track and writes it as a raw asset
//! (signed 16-bit little-endian, mono, 8 kHz, no header) ready to be loaded
//! by the engine at call setup:
//!
//! ```text
//! gen-ambient --out assets/office.raw --duration 10
//! gen-ambient --white --duration 10 --white-amplitude 300
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use undertone::audio::ambient::{generate_office_ambience, generate_white_noise, AmbientParams};
use undertone::audio::SAMPLE_RATE;

#[derive(Parser, Debug)]
#[command(
    name = "gen-ambient",
    about = "Generate a looping ambient background track (raw s16le, 8 kHz mono)"
)]
struct Args {
    /// Output path for the raw track.
    #[arg(short, long, default_value = "assets/office.raw")]
    out: PathBuf,

    /// Length of the loop in seconds.
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Pink-noise level (0..1).
    #[arg(long, default_value_t = 0.35)]
    noise: f64,

    /// Low-frequency hum level (0..1).
    #[arg(long, default_value_t = 0.08)]
    hum: f64,

    /// Expected typing clicks per second.
    #[arg(long, default_value_t = 1.2)]
    clicks: f64,

    /// Click transient amplitude (0..1).
    #[arg(long, default_value_t = 0.9)]
    click_amplitude: f64,

    /// Generate plain white noise instead of the office ambience.
    #[arg(long)]
    white: bool,

    /// White-noise amplitude in raw sample units.
    #[arg(long, default_value_t = 300.0)]
    white_amplitude: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let samples = if args.white {
        let num_samples = (SAMPLE_RATE as f64 * args.duration).floor() as usize;
        generate_white_noise(num_samples, args.white_amplitude)
    } else {
        generate_office_ambience(&AmbientParams {
            duration_secs: args.duration,
            noise_amplitude: args.noise,
            hum_amplitude: args.hum,
            clicks_per_second: args.clicks,
            click_amplitude: args.click_amplitude,
        })
    };

    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in &samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&args.out, &bytes)?;

    info!(
        samples = samples.len(),
        seconds = args.duration,
        "wrote {} ({} bytes, s16le 8 kHz mono)",
        args.out.display(),
        bytes.len()
    );
    Ok(())
}
