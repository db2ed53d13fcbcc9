//! Auto-advance controller
//!
//! After an episode plays to its end, counts down once per second and then
//! hands the next playlist entry back to the session for selection. The
//! countdown is abandoned on explicit cancel, manual episode selection,
//! playback resuming, or teardown.
//!
//! The countdown timer lives in the session's [`Timers`] under
//! [`TimerKind::AutoAdvance`]; every transition out of counting cancels it
//! before anything else happens.

use crate::playback::scheduler::{TimerKind, Timers};
use crate::state::PlaybackSession;
use dracin_common::EpisodeRef;
use std::time::Duration;
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Countdown phase
#[derive(Debug, Clone, PartialEq)]
pub enum AutoAdvancePhase {
    Idle,
    Counting { remaining: u32, next: EpisodeRef },
}

/// Outcome of one countdown tick
#[derive(Debug, Clone, PartialEq)]
pub enum CountdownTick {
    /// Still counting
    Remaining(u32),
    /// Countdown finished; select this episode
    Advance(EpisodeRef),
    /// Tick arrived with no countdown running
    Idle,
}

#[derive(Debug)]
pub struct AutoAdvance {
    countdown_secs: u32,
    phase: AutoAdvancePhase,
    generation: u64,
}

impl AutoAdvance {
    pub fn new(countdown_secs: u32) -> Self {
        Self {
            countdown_secs: countdown_secs.max(1),
            phase: AutoAdvancePhase::Idle,
            generation: 0,
        }
    }

    pub fn phase(&self) -> &AutoAdvancePhase {
        &self.phase
    }

    pub fn is_counting(&self) -> bool {
        matches!(self.phase, AutoAdvancePhase::Counting { .. })
    }

    /// Seconds left on the countdown, `None` when idle
    pub fn seconds_remaining(&self) -> Option<u32> {
        match &self.phase {
            AutoAdvancePhase::Counting { remaining, .. } => Some(*remaining),
            AutoAdvancePhase::Idle => None,
        }
    }

    /// Episode the countdown will advance to
    pub fn up_next(&self) -> Option<&EpisodeRef> {
        match &self.phase {
            AutoAdvancePhase::Counting { next, .. } => Some(next),
            AutoAdvancePhase::Idle => None,
        }
    }

    /// Start counting toward the playlist entry after the current episode
    ///
    /// Returns the next episode, or `None` (and stays idle) at the end of
    /// the playlist.
    pub fn start(&mut self, state: &PlaybackSession, timers: &mut Timers) -> Option<EpisodeRef> {
        timers.cancel(TimerKind::AutoAdvance);
        self.generation = state.episode_generation;

        let Some(next) = state.next_episode().cloned() else {
            self.phase = AutoAdvancePhase::Idle;
            debug!("End of playlist, no auto-advance");
            return None;
        };

        debug!(next_episode_id = %next.id, "Auto-advance countdown started");
        self.phase = AutoAdvancePhase::Counting {
            remaining: self.countdown_secs,
            next: next.clone(),
        };
        timers.arm_interval(TimerKind::AutoAdvance, TICK);
        Some(next)
    }

    /// One-second countdown tick
    pub fn on_tick(&mut self, timers: &mut Timers) -> CountdownTick {
        let AutoAdvancePhase::Counting { remaining, next } = &mut self.phase else {
            timers.cancel(TimerKind::AutoAdvance);
            return CountdownTick::Idle;
        };

        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return CountdownTick::Remaining(*remaining);
        }

        let next = next.clone();
        timers.cancel(TimerKind::AutoAdvance);
        self.phase = AutoAdvancePhase::Idle;
        CountdownTick::Advance(next)
    }

    /// Abandon the countdown; returns whether one was running
    pub fn cancel(&mut self, timers: &mut Timers) -> bool {
        timers.cancel(TimerKind::AutoAdvance);
        let was_counting = self.is_counting();
        self.phase = AutoAdvancePhase::Idle;
        was_counting
    }

    /// Stop counting and return the target for an immediate advance
    pub fn take_now(&mut self, timers: &mut Timers) -> Option<EpisodeRef> {
        timers.cancel(TimerKind::AutoAdvance);
        match std::mem::replace(&mut self.phase, AutoAdvancePhase::Idle) {
            AutoAdvancePhase::Counting { next, .. } => Some(next),
            AutoAdvancePhase::Idle => None,
        }
    }

    /// Cancel when the store's episode generation moved on
    ///
    /// Returns whether a running countdown was cancelled.
    pub fn observe(&mut self, state: &PlaybackSession, timers: &mut Timers) -> bool {
        if state.episode_generation == self.generation {
            return false;
        }
        self.generation = state.episode_generation;
        self.cancel(timers)
    }
}
