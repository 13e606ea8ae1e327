// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Per-call session state and event handling.
//!
//! One [`CallSession`] exists per active call, created on call start and
//! dropped on call stop. It owns every piece of per-call mutable state: the
//! mixer's filter state and background cursor, the background player with
//! its run/cancel flags, the chunk-count coordinator, and the outbound
//! sequence counter. The only thing shared across sessions is the read-only
//! ambient track.
//!
//! Sessions are driven by one logical task each. All handlers are
//! synchronous and non-blocking apart from the collaborator trait calls;
//! the long-lived background loop runs on its own task inside
//! [`BackgroundPlayer`].

pub mod background;
pub mod sync;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::audio::ambient::AmbientTrack;
use crate::audio::mixer::BackgroundMixer;
use crate::error::EngineError;
use crate::serializers::media_stream::{OutboundMessage, Track};
use crate::session::background::BackgroundPlayer;
use crate::session::sync::{PlaybackCoordinator, PlaybackState, SyncAction};
use crate::utils::helpers::{encode_base64, generate_unique_id, now_unix_millis};

/// Default gain of the background loop under the conversation.
pub const DEFAULT_BACKGROUND_VOLUME: f64 = 0.3;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Link to the upstream conversational-AI agent.
///
/// The WebSocket (or whatever carries it) lives outside this crate; the
/// session only needs liveness and a way to push messages.
#[async_trait]
pub trait AgentLink: Send + Sync {
    /// Whether the agent connection is currently open.
    fn is_open(&self) -> bool;

    /// Forward a caller audio chunk (base64 mu-law) to the agent.
    async fn send_user_audio(&self, payload_b64: &str);

    /// Answer an agent keepalive ping.
    async fn send_pong(&self, event_id: u64);
}

/// External call-control collaborator (REST call termination lives there).
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Terminate the call identified by `call_sid`.
    async fn end_call(&self, call_sid: &str);
}

// ---------------------------------------------------------------------------
// Session configuration and events
// ---------------------------------------------------------------------------

/// Per-call configuration supplied by the routing collaborator on start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Destination identifier for outbound media.
    pub stream_sid: String,
    /// Call identifier used only for call termination.
    pub call_sid: Option<String>,
    /// Gain of the background loop.
    pub background_volume: f64,
    /// Whether the background track loops or plays once.
    pub loop_background: bool,
}

impl SessionConfig {
    /// Configuration with the default volume and looping enabled.
    pub fn new(stream_sid: impl Into<String>) -> Self {
        Self {
            stream_sid: stream_sid.into(),
            call_sid: None,
            background_volume: DEFAULT_BACKGROUND_VOLUME,
            loop_background: true,
        }
    }

    /// Set the call identifier.
    pub fn with_call_sid(mut self, call_sid: impl Into<String>) -> Self {
        self.call_sid = Some(call_sid.into());
        self
    }
}

/// Events a session reacts to, already parsed from the wire by the
/// serializers.
#[derive(Debug)]
pub enum SessionEvent {
    /// An agent speech chunk, decoded to raw mu-law bytes.
    AgentAudio(Vec<u8>),
    /// The caller barged in on the agent.
    AgentInterruption,
    /// Agent keepalive.
    AgentPing { event_id: u64 },
    /// Caller audio from the telephony side, still base64-encoded.
    CallerAudio { payload: String },
    /// The telephony side confirmed playback of a previously sent mark.
    PlaybackConfirmed,
    /// An inbound payload failed to parse.
    Malformed,
    /// Call stop from the routing collaborator.
    Stop,
}

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

/// The per-call unit of mutable state.
pub struct CallSession {
    stream_sid: String,
    call_sid: Option<String>,
    mixer: BackgroundMixer,
    player: BackgroundPlayer,
    coordinator: PlaybackCoordinator,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    seq: Arc<AtomicU64>,
    agent: Arc<dyn AgentLink>,
    call_control: Arc<dyn CallControl>,
    /// Call termination is signaled at most once.
    end_signaled: bool,
}

impl CallSession {
    /// Create a session and start its background loop.
    ///
    /// The session begins in [`PlaybackState::BackgroundPlaying`] with the
    /// loop live. Fails if the destination is missing or the track is
    /// empty; no loop is started in that case.
    pub fn new(
        config: SessionConfig,
        track: Arc<AmbientTrack>,
        outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
        agent: Arc<dyn AgentLink>,
        call_control: Arc<dyn CallControl>,
    ) -> Result<Self, EngineError> {
        if config.stream_sid.is_empty() {
            return Err(EngineError::MissingDestination);
        }
        if track.is_empty() {
            return Err(EngineError::EmptyTrack);
        }

        let seq = Arc::new(AtomicU64::new(0));
        let mut player = BackgroundPlayer::new(
            track.clone(),
            config.stream_sid.clone(),
            outbound_tx.clone(),
            seq.clone(),
            config.background_volume,
            config.loop_background,
        );
        player.start()?;

        debug!(stream_sid = %config.stream_sid, "session started");

        Ok(Self {
            stream_sid: config.stream_sid,
            call_sid: config.call_sid,
            mixer: BackgroundMixer::new(track),
            player,
            coordinator: PlaybackCoordinator::new(),
            outbound_tx,
            seq,
            agent,
            call_control,
            end_signaled: false,
        })
    }

    /// Current playback state.
    pub fn playback_state(&self) -> PlaybackState {
        self.coordinator.state()
    }

    /// Whether the background loop is currently live.
    pub fn background_running(&self) -> bool {
        self.player.is_running()
    }

    /// The chunk-count coordinator (read-only; for observability and tests).
    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    /// Dispatch one event. After the terminal state is reached, everything
    /// except `Stop` is dropped.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        if self.coordinator.state() == PlaybackState::Ended
            && !matches!(event, SessionEvent::Stop)
        {
            trace!("session ended, event dropped");
            return;
        }

        match event {
            SessionEvent::AgentAudio(chunk) => self.on_agent_audio(&chunk),
            SessionEvent::AgentInterruption => self.on_agent_interruption(),
            SessionEvent::AgentPing { event_id } => self.agent.send_pong(event_id).await,
            SessionEvent::CallerAudio { payload } => self.on_caller_audio(&payload).await,
            SessionEvent::PlaybackConfirmed => self.on_playback_confirmed().await,
            SessionEvent::Malformed => self.on_malformed(),
            SessionEvent::Stop => self.on_stop(),
        }
    }

    /// Agent audio: mute the background, mix, emit the mixed frame plus an
    /// acknowledgment-request mark.
    fn on_agent_audio(&mut self, ulaw: &[u8]) {
        if self.coordinator.on_agent_chunk() == SyncAction::PauseBackground {
            self.player.stop();
        }

        let mixed = self.mixer.mix_chunk(ulaw);
        let sequence = self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        self.send_outbound(OutboundMessage::media(
            &self.stream_sid,
            encode_base64(&mixed),
            Track::Outbound,
            sequence,
            now_unix_millis(),
        ));
        self.send_outbound(OutboundMessage::mark(
            &self.stream_sid,
            generate_unique_id("agent-chunk"),
        ));
    }

    /// The caller interrupted the agent: flush the remote audio queue.
    fn on_agent_interruption(&mut self) {
        debug!("agent interrupted, clearing remote queue");
        self.send_outbound(OutboundMessage::clear(&self.stream_sid));
    }

    /// Caller audio goes to the agent; a dead agent with nothing pending
    /// terminates the call.
    async fn on_caller_audio(&mut self, payload: &str) {
        if !self.agent.is_open() {
            if self.coordinator.is_idle() {
                self.signal_call_end().await;
            }
            return;
        }
        self.agent.send_user_audio(payload).await;
    }

    /// Playback acknowledgment from the telephony side.
    async fn on_playback_confirmed(&mut self) {
        match self.coordinator.on_playback_ack(self.agent.is_open()) {
            SyncAction::ResumeBackground => {
                if let Err(e) = self.player.start() {
                    warn!(error = %e, "failed to resume background");
                }
            }
            SyncAction::EndCall => self.signal_call_end().await,
            _ => {}
        }
    }

    /// Malformed inbound payload: log, stop the loop, reset counters so the
    /// session cannot get stuck waiting for acks that will never match.
    fn on_malformed(&mut self) {
        warn!("malformed inbound event, resetting session to idle");
        self.player.stop();
        self.coordinator.reset();
    }

    /// Call stop: tear down. No further events are processed.
    fn on_stop(&mut self) {
        debug!(stream_sid = %self.stream_sid, "session stopped");
        self.player.stop();
        self.coordinator.on_shutdown();
    }

    /// Signal call termination to the call-control collaborator, exactly
    /// once, and make the session terminal.
    async fn signal_call_end(&mut self) {
        if self.end_signaled {
            return;
        }
        self.end_signaled = true;
        self.player.stop();
        self.coordinator.on_shutdown();

        match &self.call_sid {
            Some(call_sid) => {
                warn!(%call_sid, "agent connection closed, ending call");
                self.call_control.end_call(call_sid).await;
            }
            None => warn!("agent connection closed but no call sid, cannot end call"),
        }
    }

    fn send_outbound(&self, msg: OutboundMessage) {
        if self.outbound_tx.send(msg).is_err() {
            warn!("outbound receiver dropped, message lost");
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        // The loop holds only clones; make sure it dies with the session.
        self.player.stop();
    }
}
