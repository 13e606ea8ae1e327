// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Paced emission of the ambient background track.
//!
//! [`BackgroundPlayer`] owns one session's background loop: a spawned tokio
//! task that emits one mu-law frame every 20 ms, scaled by a volume factor
//! and addressed to the session's destination. Cancellation is cooperative —
//! a [`CancellationToken`] checked once per frame via `select! { biased; }`,
//! so the worst-case latency to observe a stop request is one frame period.
//!
//! At most one loop is live per player: `start()` while an uncancelled loop
//! is running is a no-op, and each `start()` installs a fresh token and
//! running flag so a stale loop that is still winding down cannot clobber
//! the new one.
//!
//! The outbound send is an unbounded channel send and never blocks the
//! pacing loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::audio::ambient::AmbientTrack;
use crate::audio::codec::samples_to_mulaw;
use crate::audio::utils::clamp_i16;
use crate::audio::{FRAME_DURATION, FRAME_SAMPLES};
use crate::error::EngineError;
use crate::serializers::media_stream::{OutboundMessage, Track};
use crate::utils::helpers::{encode_base64, now_unix_millis};

/// Per-session background frame loop.
pub struct BackgroundPlayer {
    track: Arc<AmbientTrack>,
    stream_sid: String,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    /// Session-wide outbound sequence counter, shared with the mixer path.
    seq: Arc<AtomicU64>,
    volume: f64,
    looping: bool,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BackgroundPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundPlayer")
            .field("stream_sid", &self.stream_sid)
            .field("volume", &self.volume)
            .field("looping", &self.looping)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl BackgroundPlayer {
    /// Create a player for one session. The loop is not started yet.
    pub fn new(
        track: Arc<AmbientTrack>,
        stream_sid: String,
        outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
        seq: Arc<AtomicU64>,
        volume: f64,
        looping: bool,
    ) -> Self {
        Self {
            track,
            stream_sid,
            outbound_tx,
            seq,
            volume,
            looping,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    /// Whether a loop is currently live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the background loop.
    ///
    /// No-op (logged) if an uncancelled loop is already running. Fails if
    /// the player has no destination or the track is empty. Must be called
    /// from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.stream_sid.is_empty() {
            return Err(EngineError::MissingDestination);
        }
        if self.track.is_empty() {
            return Err(EngineError::EmptyTrack);
        }
        if self.running.load(Ordering::Acquire) && !self.cancel.is_cancelled() {
            debug!("background player: start ignored, already running");
            return Ok(());
        }

        // Fresh flag and token per run; a previous loop still winding down
        // keeps its own and cannot clear ours.
        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        self.running = running.clone();
        self.cancel = cancel.clone();

        let track = self.track.clone();
        let stream_sid = self.stream_sid.clone();
        let outbound_tx = self.outbound_tx.clone();
        let seq = self.seq.clone();
        let volume = self.volume;
        let looping = self.looping;

        debug!(looping, volume, "background player: started");

        tokio::spawn(async move {
            send_loop(
                track, stream_sid, outbound_tx, seq, volume, looping, cancel,
            )
            .await;
            running.store(false, Ordering::Release);
        });

        Ok(())
    }

    /// Request the loop to stop. No-op (logged) if nothing is running.
    ///
    /// The loop observes the request at its next frame boundary.
    pub fn stop(&self) {
        if !self.running.load(Ordering::Acquire) || self.cancel.is_cancelled() {
            debug!("background player: stop ignored, not running");
            return;
        }
        debug!("background player: stop requested");
        self.cancel.cancel();
    }
}

/// The paced frame loop. Runs until cancelled, the track is exhausted
/// (non-looping), or the outbound receiver goes away.
async fn send_loop(
    track: Arc<AmbientTrack>,
    stream_sid: String,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    seq: Arc<AtomicU64>,
    volume: f64,
    looping: bool,
    cancel: CancellationToken,
) {
    let mut cursor = 0usize;
    let mut frames_sent = 0u64;
    let mut ticker = tokio::time::interval(FRAME_DURATION);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(frames_sent, "background loop: stop observed");
                break;
            }
            _ = ticker.tick() => {}
        }

        if cursor >= track.len() {
            if looping {
                cursor = 0;
            } else {
                debug!(frames_sent, "background loop: track exhausted");
                break;
            }
        }

        let mut take = (track.len() - cursor).min(FRAME_SAMPLES);
        if take < FRAME_SAMPLES && looping && track.len() >= FRAME_SAMPLES {
            // Wrap to exactly 0 rather than emit a short tail.
            cursor = 0;
            take = FRAME_SAMPLES;
        }

        // Fixed-size frame; a non-looping tail is zero-padded.
        let mut frame = [0i16; FRAME_SAMPLES];
        for (dst, &src) in frame
            .iter_mut()
            .zip(&track.samples()[cursor..cursor + take])
        {
            *dst = clamp_i16(src as f64 * volume);
        }
        cursor += take;

        let payload = encode_base64(&samples_to_mulaw(&frame));
        let sequence = seq.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = OutboundMessage::media(
            &stream_sid,
            payload,
            Track::Background,
            sequence,
            now_unix_millis(),
        );
        if outbound_tx.send(msg).is_err() {
            warn!("background loop: outbound receiver dropped, stopping");
            break;
        }
        frames_sent += 1;
        trace!(frame = frames_sent, cursor, "background loop: frame sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::{linear_to_mulaw, mulaw_to_linear};
    use crate::utils::helpers::decode_base64;
    use std::time::Duration;

    fn track_of(samples: Vec<i16>) -> Arc<AmbientTrack> {
        Arc::new(AmbientTrack::from_samples(samples))
    }

    fn player_with(
        track: Arc<AmbientTrack>,
        volume: f64,
        looping: bool,
    ) -> (BackgroundPlayer, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = BackgroundPlayer::new(
            track,
            "MZ-test".to_string(),
            tx,
            Arc::new(AtomicU64::new(0)),
            volume,
            looping,
        );
        (player, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_background_frames_with_increasing_sequence() {
        let (mut player, mut rx) = player_with(track_of(vec![100; 1600]), 1.0, true);
        player.start().unwrap();

        tokio::time::sleep(Duration::from_millis(90)).await;
        player.stop();
        tokio::time::sleep(Duration::from_millis(25)).await;

        let messages = drain(&mut rx);
        assert!(!messages.is_empty());
        for (i, msg) in messages.iter().enumerate() {
            let media = msg.as_media().expect("background loop emits media only");
            assert_eq!(media.media.track, Track::Background);
            assert_eq!(media.stream_sid, "MZ-test");
            assert_eq!(media.media.chunk, (i as u64 + 1).to_string());
            assert_eq!(decode_base64(&media.media.payload).unwrap().len(), 160);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_looping_exact_frame_count() {
        // 480 samples = 3 full frames.
        let (mut player, mut rx) = player_with(track_of(vec![50; 480]), 1.0, false);
        player.start().unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(drain(&mut rx).len(), 3);
        assert!(!player.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_looping_partial_tail_is_padded() {
        // 500 samples = ceil(500/160) = 4 frames, the last one zero-padded.
        let (mut player, mut rx) = player_with(track_of(vec![1000; 500]), 1.0, false);
        player.start().unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 4);
        assert!(!player.is_running());

        let last = decode_base64(&messages[3].as_media().unwrap().media.payload).unwrap();
        assert_eq!(last.len(), 160);
        // 500 - 3*160 = 20 real samples, then encoded silence.
        let silence = linear_to_mulaw(0);
        assert!(last[..20].iter().all(|&b| b != silence));
        assert!(last[20..].iter().all(|&b| b == silence));
    }

    #[tokio::test(start_paused = true)]
    async fn test_looping_wraps_to_start() {
        // Two-frame track, looping: frame 3 repeats frame 1.
        let samples: Vec<i16> = (0..320).map(|i| (i * 7 % 2000) as i16).collect();
        let (mut player, mut rx) = player_with(track_of(samples), 1.0, true);
        player.start().unwrap();

        tokio::time::sleep(Duration::from_millis(110)).await;
        player.stop();
        tokio::time::sleep(Duration::from_millis(25)).await;

        let messages = drain(&mut rx);
        assert!(messages.len() >= 4);
        let payload = |i: usize| messages[i].as_media().unwrap().media.payload.clone();
        assert_eq!(payload(0), payload(2));
        assert_eq!(payload(1), payload(3));
        assert_ne!(payload(0), payload(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_runs_single_loop() {
        let (mut player, mut rx) = player_with(track_of(vec![10; 16000]), 1.0, true);
        player.start().unwrap();
        player.start().unwrap(); // ignored

        tokio::time::sleep(Duration::from_millis(201)).await;
        player.stop();
        tokio::time::sleep(Duration::from_millis(25)).await;

        // One loop ticks at 0, 20, ..., 200 ms: 11 frames. A duplicate loop
        // would roughly double that.
        let count = drain(&mut rx).len();
        assert!((10..=12).contains(&count), "got {count} frames");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_observed_within_one_frame() {
        let (mut player, mut rx) = player_with(track_of(vec![10; 16000]), 1.0, true);
        player.start().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        player.stop();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(!player.is_running());

        let count_at_stop = drain(&mut rx).len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(drain(&mut rx).len(), 0, "no frames after stop");
        assert!(count_at_stop >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_continues_sequence() {
        let (mut player, mut rx) = player_with(track_of(vec![10; 1600]), 1.0, true);
        player.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        player.stop();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let first_run = drain(&mut rx);
        assert!(!first_run.is_empty());

        player.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        player.stop();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let second_run = drain(&mut rx);
        assert!(!second_run.is_empty());

        // The session-wide sequence keeps climbing across runs.
        let last_seq: u64 = first_run
            .last()
            .unwrap()
            .as_media()
            .unwrap()
            .media
            .chunk
            .parse()
            .unwrap();
        let next_seq: u64 = second_run[0]
            .as_media()
            .unwrap()
            .media
            .chunk
            .parse()
            .unwrap();
        assert_eq!(next_seq, last_seq + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_scaling() {
        let (mut player, mut rx) = player_with(track_of(vec![10000; 160]), 0.5, false);
        player.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        let frame = decode_base64(&messages[0].as_media().unwrap().media.payload).unwrap();
        let expected = linear_to_mulaw(5000);
        assert!(frame.iter().all(|&b| b == expected));
        // Sanity: the scaled value decodes near 5000.
        assert!((mulaw_to_linear(expected) as i32 - 5000).abs() < 200);
    }

    #[tokio::test]
    async fn test_start_without_destination_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut player = BackgroundPlayer::new(
            track_of(vec![1; 160]),
            String::new(),
            tx,
            Arc::new(AtomicU64::new(0)),
            1.0,
            true,
        );
        assert!(matches!(
            player.start(),
            Err(EngineError::MissingDestination)
        ));
        assert!(!player.is_running());
    }

    #[tokio::test]
    async fn test_start_with_empty_track_fails() {
        let (mut player, _rx) = player_with(track_of(vec![]), 1.0, true);
        assert!(matches!(player.start(), Err(EngineError::EmptyTrack)));
        assert!(!player.is_running());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let (player, _rx) = player_with(track_of(vec![1; 160]), 1.0, true);
        player.stop();
        player.stop();
        assert!(!player.is_running());
    }
}
