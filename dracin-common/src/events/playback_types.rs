//! Playback-related type definitions
//!
//! Supporting types carried by player events.

use serde::{Deserialize, Serialize};

/// Playback rates offered by the player, slowest first
pub const PLAYBACK_RATES: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Snap an arbitrary rate to the nearest offered rate
///
/// Non-finite input maps to normal speed.
pub fn nearest_playback_rate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 1.0;
    }
    PLAYBACK_RATES
        .iter()
        .copied()
        .min_by(|a, b| (a - rate).abs().total_cmp(&(b - rate).abs()))
        .unwrap_or(1.0)
}

/// Move one step through [`PLAYBACK_RATES`], saturating at either end
pub fn step_playback_rate(current: f64, step: PlaybackRateStep) -> f64 {
    let current = nearest_playback_rate(current);
    let idx = PLAYBACK_RATES
        .iter()
        .position(|r| *r == current)
        .unwrap_or(2);
    let idx = match step {
        PlaybackRateStep::Slower => idx.saturating_sub(1),
        PlaybackRateStep::Faster => (idx + 1).min(PLAYBACK_RATES.len() - 1),
    };
    PLAYBACK_RATES[idx]
}

/// Direction of a playback rate step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackRateStep {
    Slower,
    Faster,
}

/// Why an auto-advance countdown was abandoned
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Explicit cancel from the up-next overlay
    UserCancelled,
    /// User picked an episode (possibly the one being counted down to)
    EpisodeSelected,
    /// Media started playing again (e.g. seek back past the end)
    PlaybackResumed,
    /// Player torn down
    Teardown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::UserCancelled => write!(f, "user cancelled"),
            CancelReason::EpisodeSelected => write!(f, "episode selected"),
            CancelReason::PlaybackResumed => write!(f, "playback resumed"),
            CancelReason::Teardown => write!(f, "teardown"),
        }
    }
}

/// What caused a progress sync
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Periodic tick while playing
    Periodic,
    /// Natural end of episode (forced, marks completion)
    Ended,
    /// Episode changed away (forced flush)
    EpisodeChange,
    /// Player torn down (forced flush)
    Teardown,
}

impl SyncTrigger {
    /// Forced triggers bypass the debounce window
    pub fn is_forced(self) -> bool {
        !matches!(self, SyncTrigger::Periodic)
    }
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Periodic => write!(f, "periodic"),
            SyncTrigger::Ended => write!(f, "ended"),
            SyncTrigger::EpisodeChange => write!(f, "episode_change"),
            SyncTrigger::Teardown => write!(f, "teardown"),
        }
    }
}
