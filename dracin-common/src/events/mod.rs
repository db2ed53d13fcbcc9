//! Event types for the Dracin player event system
//!
//! Provides the PlayerEvent enum and the EventBus the host application
//! subscribes to for visual feedback (buffering spinner, up-next overlay,
//! "episode unavailable" state, sync diagnostics).

mod playback_types;

pub use playback_types::{
    nearest_playback_rate, step_playback_rate, CancelReason, PlaybackRateStep, SyncTrigger,
    PLAYBACK_RATES,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Events are broadcast via EventBus and can be serialized for a host UI
/// bridge. Every variant carries the UTC time it was emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Play/pause state changed
    PlaybackStateChanged {
        /// Episode loaded at the time of the change
        episode_id: Option<String>,
        /// Whether the player is now playing
        playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new episode was loaded (manual selection or auto-advance)
    EpisodeChanged {
        /// Previously loaded episode, if any
        previous_episode_id: Option<String>,
        episode_id: String,
        episode_number: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Media started or stopped waiting for data
    BufferingChanged {
        buffering: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Episode played through to its natural end
    EpisodeEnded {
        episode_id: String,
        /// Whether a next playlist entry exists (countdown follows)
        has_next: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Unrecoverable media error; the episode is unavailable
    PlaybackFailed {
        episode_id: Option<String>,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Auto-advance countdown started
    AutoAdvanceStarted {
        next_episode_id: String,
        next_episode_title: String,
        seconds_remaining: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Auto-advance countdown ticked
    AutoAdvanceTick {
        seconds_remaining: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Auto-advance countdown abandoned
    AutoAdvanceCancelled {
        reason: CancelReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Countdown reached zero and the next episode was selected
    AutoAdvanced {
        from_episode_id: String,
        to_episode_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Watch position persisted by the backend
    ProgressSynced {
        episode_id: String,
        position: f64,
        trigger: SyncTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Watch position could not be persisted (logged, never retried eagerly)
    ProgressSyncFailed {
        episode_id: String,
        position: f64,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback resumed from a previously stored position
    ResumeApplied {
        episode_id: String,
        position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fullscreen confirmed entered or exited by the runtime
    FullscreenChanged {
        fullscreen: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Picture-in-picture confirmed entered or left by the runtime
    PictureInPictureChanged {
        active: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Keyboard shortcut help overlay toggled
    ShortcutHelpToggled {
        visible: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player session torn down (final sync flushed)
    SessionClosed {
        episode_id: Option<String>,
        position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Short variant name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::EpisodeChanged { .. } => "EpisodeChanged",
            PlayerEvent::BufferingChanged { .. } => "BufferingChanged",
            PlayerEvent::EpisodeEnded { .. } => "EpisodeEnded",
            PlayerEvent::PlaybackFailed { .. } => "PlaybackFailed",
            PlayerEvent::AutoAdvanceStarted { .. } => "AutoAdvanceStarted",
            PlayerEvent::AutoAdvanceTick { .. } => "AutoAdvanceTick",
            PlayerEvent::AutoAdvanceCancelled { .. } => "AutoAdvanceCancelled",
            PlayerEvent::AutoAdvanced { .. } => "AutoAdvanced",
            PlayerEvent::ProgressSynced { .. } => "ProgressSynced",
            PlayerEvent::ProgressSyncFailed { .. } => "ProgressSyncFailed",
            PlayerEvent::ResumeApplied { .. } => "ResumeApplied",
            PlayerEvent::FullscreenChanged { .. } => "FullscreenChanged",
            PlayerEvent::PictureInPictureChanged { .. } => "PictureInPictureChanged",
            PlayerEvent::ShortcutHelpToggled { .. } => "ShortcutHelpToggled",
            PlayerEvent::SessionClosed { .. } => "SessionClosed",
        }
    }
}

/// Central event distribution for a player instance
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the player)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// Each player session owns its own bus; there is no process-wide instance.
///
/// # Examples
///
/// ```
/// use dracin_common::events::{EventBus, PlayerEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PlayerEvent::BufferingChanged {
///     buffering: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(PlayerEvent::BufferingChanged { buffering: true, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Player events are feedback for the host UI; a host that does not
    /// listen is not an error.
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
