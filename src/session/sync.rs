// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Chunk-count synchronization between agent audio and background playback.
//!
//! Standalone state machine, pure logic: no channels, no tasks. The session
//! feeds it events and executes the [`SyncAction`] it returns, which keeps
//! the resume/stop decision a single testable function of
//! (state, counters, event).
//!
//! The machine counts agent chunks sent toward the telephony side and
//! playback acknowledgments received back. While the counters differ, agent
//! audio is still queued remotely and the background loop must stay muted.
//! When they match, everything the agent said has been played out and the
//! background may resume.

use tracing::{debug, trace};

/// Playback states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// The ambient background loop is (or may be) playing.
    BackgroundPlaying,
    /// Agent audio is in flight; the background is muted.
    AgentSpeaking,
    /// Terminal: the session is shut down or the call is being ended.
    Ended,
}

/// What the caller must do after feeding an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Nothing to do.
    None,
    /// Stop the background loop; the agent started speaking.
    PauseBackground,
    /// All agent audio confirmed played; restart the background loop.
    ResumeBackground,
    /// The agent connection is gone; signal call termination.
    EndCall,
}

/// Per-session chunk-count state machine.
#[derive(Debug)]
pub struct PlaybackCoordinator {
    state: PlaybackState,
    /// Agent chunks emitted since the last resume. `None` is the idle
    /// sentinel: no agent activity pending.
    agent_chunks: Option<u64>,
    /// Acknowledgments received since the last agent activity.
    ack_chunks: u64,
}

impl Default for PlaybackCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackCoordinator {
    /// A fresh coordinator: background playing, counters idle.
    pub fn new() -> Self {
        Self {
            state: PlaybackState::BackgroundPlaying,
            agent_chunks: None,
            ack_chunks: 0,
        }
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Agent chunks pending acknowledgment (`None` = idle sentinel).
    pub fn agent_chunks(&self) -> Option<u64> {
        self.agent_chunks
    }

    /// Acknowledgments counted since the last agent activity.
    pub fn ack_chunks(&self) -> u64 {
        self.ack_chunks
    }

    /// Whether no agent activity is pending.
    pub fn is_idle(&self) -> bool {
        self.agent_chunks.is_none() && self.ack_chunks == 0
    }

    /// An agent audio chunk is about to be emitted.
    pub fn on_agent_chunk(&mut self) -> SyncAction {
        if self.state == PlaybackState::Ended {
            return SyncAction::None;
        }

        self.agent_chunks = Some(self.agent_chunks.unwrap_or(0) + 1);

        if self.state == PlaybackState::BackgroundPlaying {
            debug!("sync: agent speaking, muting background");
            self.state = PlaybackState::AgentSpeaking;
            SyncAction::PauseBackground
        } else {
            SyncAction::None
        }
    }

    /// The telephony side confirmed playback of a previously sent unit.
    ///
    /// `agent_open` reports whether the upstream agent connection is still
    /// alive; on counter equality with a dead agent the call is terminated
    /// instead of resuming the background.
    pub fn on_playback_ack(&mut self, agent_open: bool) -> SyncAction {
        if self.state == PlaybackState::Ended {
            return SyncAction::None;
        }

        let pending = match self.agent_chunks {
            Some(pending) => pending,
            None => {
                trace!("sync: ack with no agent audio pending, ignored");
                return SyncAction::None;
            }
        };

        self.ack_chunks += 1;
        if self.ack_chunks < pending {
            trace!(
                acked = self.ack_chunks,
                pending,
                "sync: waiting for remaining acks"
            );
            return SyncAction::None;
        }

        // Everything the agent said has been played out.
        self.agent_chunks = None;
        self.ack_chunks = 0;

        if agent_open {
            debug!("sync: agent finished, resuming background");
            self.state = PlaybackState::BackgroundPlaying;
            SyncAction::ResumeBackground
        } else {
            debug!("sync: agent connection closed, ending call");
            self.state = PlaybackState::Ended;
            SyncAction::EndCall
        }
    }

    /// Recover from a malformed event: counters go idle and the background
    /// stays muted until the next chunk/ack cycle completes.
    pub fn reset(&mut self) {
        self.agent_chunks = None;
        self.ack_chunks = 0;
        if self.state != PlaybackState::Ended {
            self.state = PlaybackState::AgentSpeaking;
        }
    }

    /// The call stopped: counters go idle, state becomes terminal.
    pub fn on_shutdown(&mut self) {
        self.agent_chunks = None;
        self.ack_chunks = 0;
        self.state = PlaybackState::Ended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sync = PlaybackCoordinator::new();
        assert_eq!(sync.state(), PlaybackState::BackgroundPlaying);
        assert!(sync.is_idle());
    }

    #[test]
    fn test_first_agent_chunk_pauses_background() {
        let mut sync = PlaybackCoordinator::new();
        assert_eq!(sync.on_agent_chunk(), SyncAction::PauseBackground);
        assert_eq!(sync.state(), PlaybackState::AgentSpeaking);
        assert_eq!(sync.agent_chunks(), Some(1));
    }

    #[test]
    fn test_subsequent_chunks_are_counted_silently() {
        let mut sync = PlaybackCoordinator::new();
        sync.on_agent_chunk();
        assert_eq!(sync.on_agent_chunk(), SyncAction::None);
        assert_eq!(sync.on_agent_chunk(), SyncAction::None);
        assert_eq!(sync.agent_chunks(), Some(3));
    }

    #[test]
    fn test_equality_rule_resumes_exactly_once() {
        let mut sync = PlaybackCoordinator::new();
        for _ in 0..3 {
            sync.on_agent_chunk();
        }
        assert_eq!(sync.on_playback_ack(true), SyncAction::None);
        assert_eq!(sync.on_playback_ack(true), SyncAction::None);
        assert_eq!(sync.on_playback_ack(true), SyncAction::ResumeBackground);
        assert_eq!(sync.state(), PlaybackState::BackgroundPlaying);
        assert!(sync.is_idle());
    }

    #[test]
    fn test_mismatched_acks_do_not_resume() {
        let mut sync = PlaybackCoordinator::new();
        for _ in 0..4 {
            sync.on_agent_chunk();
        }
        for _ in 0..3 {
            assert_eq!(sync.on_playback_ack(true), SyncAction::None);
        }
        assert_eq!(sync.state(), PlaybackState::AgentSpeaking);
        assert_eq!(sync.agent_chunks(), Some(4));
        assert_eq!(sync.ack_chunks(), 3);
    }

    #[test]
    fn test_two_chunks_two_acks_scenario() {
        let mut sync = PlaybackCoordinator::new();
        sync.on_agent_chunk();
        sync.on_agent_chunk();
        assert_eq!(sync.agent_chunks(), Some(2));

        assert_eq!(sync.on_playback_ack(true), SyncAction::None);
        assert_eq!(sync.ack_chunks(), 1);

        assert_eq!(sync.on_playback_ack(true), SyncAction::ResumeBackground);
        assert_eq!(sync.agent_chunks(), None);
        assert_eq!(sync.ack_chunks(), 0);
    }

    #[test]
    fn test_ack_without_pending_audio_is_ignored() {
        let mut sync = PlaybackCoordinator::new();
        assert_eq!(sync.on_playback_ack(true), SyncAction::None);
        assert_eq!(sync.on_playback_ack(true), SyncAction::None);
        assert!(sync.is_idle());
        assert_eq!(sync.state(), PlaybackState::BackgroundPlaying);
    }

    #[test]
    fn test_equality_with_dead_agent_ends_call() {
        let mut sync = PlaybackCoordinator::new();
        sync.on_agent_chunk();
        assert_eq!(sync.on_playback_ack(false), SyncAction::EndCall);
        assert_eq!(sync.state(), PlaybackState::Ended);
        // No further actions after the terminal transition.
        assert_eq!(sync.on_agent_chunk(), SyncAction::None);
        assert_eq!(sync.on_playback_ack(false), SyncAction::None);
    }

    #[test]
    fn test_chunk_and_ack_cycle_repeats() {
        let mut sync = PlaybackCoordinator::new();
        for _ in 0..2 {
            assert_eq!(sync.on_agent_chunk(), SyncAction::PauseBackground);
            assert_eq!(sync.on_agent_chunk(), SyncAction::None);
            assert_eq!(sync.on_playback_ack(true), SyncAction::None);
            assert_eq!(sync.on_playback_ack(true), SyncAction::ResumeBackground);
        }
    }

    #[test]
    fn test_reset_clears_counters_and_mutes() {
        let mut sync = PlaybackCoordinator::new();
        sync.on_agent_chunk();
        sync.on_playback_ack(true);
        sync.reset();
        assert!(sync.is_idle());
        assert_eq!(sync.state(), PlaybackState::AgentSpeaking);
        // A fresh cycle still works after recovery.
        sync.on_agent_chunk();
        assert_eq!(sync.on_playback_ack(true), SyncAction::ResumeBackground);
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let mut sync = PlaybackCoordinator::new();
        sync.on_agent_chunk();
        sync.on_shutdown();
        assert_eq!(sync.state(), PlaybackState::Ended);
        assert!(sync.is_idle());
        assert_eq!(sync.on_agent_chunk(), SyncAction::None);
        sync.reset();
        assert_eq!(sync.state(), PlaybackState::Ended);
    }
}
