//! Playback clock
//!
//! Bridges the native media element and the state store. The clock is the
//! only component that drives the media element; every timeline command it
//! issues is mirrored into the store within the same call, so subscribers
//! never see the media and the store disagree.
//!
//! Media callbacks arrive as typed [`MediaEvent`]s over a channel the clock
//! registers with the element once at construction and unregisters at
//! teardown.

use crate::error::Result;
use crate::state::{clamp_position, PlayerStore};
use dracin_common::events::{step_playback_rate, PlaybackRateStep};
use dracin_common::EpisodeRef;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Typed media element callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Playback position moved (seconds)
    TimeUpdate(f64),
    /// Media reported its duration (seconds; may be NaN before metadata)
    DurationChange(f64),
    /// Playback stalled waiting for data
    Waiting,
    /// Playback started or resumed after a stall
    Playing,
    /// Playback paused by the runtime (not by the clock)
    Paused,
    /// Playback reached the natural end of the media
    Ended,
    /// Media failed to load or decode
    Error(String),
    /// A play request was rejected after being accepted (autoplay policy)
    PlayRejected(String),
    EnterPictureInPicture,
    LeavePictureInPicture,
    /// Fullscreen entered (`true`) or exited (`false`)
    FullscreenChange(bool),
}

/// Native media element boundary
///
/// Requests that the runtime may refuse return `Err(Error::Media)`. State
/// changes the runtime confirms asynchronously (fullscreen, picture-in-picture)
/// are reported through the subscribed event channel, never by return value.
pub trait MediaElement: Send {
    /// Register the event sink; replaces any previous sink
    fn subscribe(&mut self, sink: mpsc::UnboundedSender<MediaEvent>);

    /// Drop the event sink
    fn unsubscribe(&mut self);

    /// Point the element at a new stream and rewind to 0
    fn load(&mut self, episode: &EpisodeRef);

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Element's own playback position (seconds)
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, seconds: f64);

    /// Effective volume in [0, 1] (0 while muted)
    fn set_volume(&mut self, volume: f64);

    fn set_playback_rate(&mut self, rate: f64);

    fn request_fullscreen(&mut self) -> Result<()>;

    fn exit_fullscreen(&mut self) -> Result<()>;

    fn picture_in_picture_supported(&self) -> bool;

    fn request_picture_in_picture(&mut self) -> Result<()>;

    fn exit_picture_in_picture(&mut self) -> Result<()>;
}

/// Playback clock: owns the media element and its event subscription
pub struct PlaybackClock {
    media: Box<dyn MediaElement>,
    events: Option<mpsc::UnboundedReceiver<MediaEvent>>,
    attached: bool,
}

impl PlaybackClock {
    /// Take ownership of the element and subscribe to its events
    pub fn new(mut media: Box<dyn MediaElement>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        media.subscribe(tx);
        Self {
            media,
            events: Some(rx),
            attached: true,
        }
    }

    /// Receiver for the element's events (available once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>> {
        self.events.take()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// End the event subscription and stop the element
    pub fn detach(&mut self) {
        if self.attached {
            self.media.pause();
            self.media.unsubscribe();
            self.attached = false;
            debug!("Media element detached");
        }
    }

    /// Element's own playback position
    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    /// Load an episode and apply the store's volume and rate to the element
    pub fn load(&mut self, episode: &EpisodeRef, store: &PlayerStore) {
        self.media.load(episode);
        let state = store.state();
        self.media.set_volume(state.effective_volume());
        self.media.set_playback_rate(state.playback_rate);
    }

    /// Start playback; a rejection leaves the store paused
    pub fn play(&mut self, store: &mut PlayerStore) {
        match self.media.play() {
            Ok(()) => store.set_playing(true),
            Err(e) => {
                debug!("Play request rejected: {}", e);
                store.set_playing(false);
            }
        }
    }

    pub fn pause(&mut self, store: &mut PlayerStore) {
        self.media.pause();
        store.set_playing(false);
    }

    pub fn toggle_play(&mut self, store: &mut PlayerStore) {
        if store.is_playing() {
            self.pause(store);
        } else {
            self.play(store);
        }
    }

    /// Seek to an absolute position, clamped to `[0, duration]`
    ///
    /// Before the media reports a duration, the catalog duration bounds the
    /// seek; with neither known only negative targets are clamped.
    pub fn seek_to(&mut self, seconds: f64, store: &mut PlayerStore) -> f64 {
        let duration = store.state().effective_duration();
        let target = clamp_position(seconds, duration);
        self.media.set_current_time(target);
        store.set_current_time(target);
        target
    }

    /// Seek relative to the element's current position
    pub fn seek_by(&mut self, delta: f64, store: &mut PlayerStore) -> f64 {
        let delta = if delta.is_finite() { delta } else { 0.0 };
        let base = self.media.current_time();
        self.seek_to(base + delta, store)
    }

    /// Set volume (clamped); raising volume above 0 also unmutes
    pub fn set_volume(&mut self, volume: f64, store: &mut PlayerStore) {
        store.set_volume(volume);
        let (volume, muted) = {
            let s = store.state();
            (s.volume, s.is_muted)
        };
        if muted && volume > 0.0 {
            store.set_muted(false);
        }
        self.apply_volume(store);
    }

    /// Step volume; stepping down never unmutes
    pub fn adjust_volume(&mut self, delta: f64, store: &mut PlayerStore) {
        let volume = store.state().volume + delta;
        if delta > 0.0 {
            self.set_volume(volume, store);
        } else {
            store.set_volume(volume);
            self.apply_volume(store);
        }
    }

    pub fn toggle_mute(&mut self, store: &mut PlayerStore) {
        let muted = store.state().is_muted;
        store.set_muted(!muted);
        self.apply_volume(store);
    }

    fn apply_volume(&mut self, store: &PlayerStore) {
        let effective = store.state().effective_volume();
        self.media.set_volume(effective);
    }

    pub fn set_playback_rate(&mut self, rate: f64, store: &mut PlayerStore) {
        store.set_playback_rate(rate);
        let rate = store.state().playback_rate;
        self.media.set_playback_rate(rate);
    }

    pub fn step_playback_rate(&mut self, step: PlaybackRateStep, store: &mut PlayerStore) {
        let current = store.state().playback_rate;
        self.set_playback_rate(step_playback_rate(current, step), store);
    }

    /// Request or exit fullscreen
    ///
    /// The store flag only changes when the element confirms with
    /// [`MediaEvent::FullscreenChange`].
    pub fn toggle_fullscreen(&mut self, store: &PlayerStore) {
        let result = if store.state().is_fullscreen {
            self.media.exit_fullscreen()
        } else {
            self.media.request_fullscreen()
        };
        if let Err(e) = result {
            warn!("Fullscreen request failed: {}", e);
        }
    }

    /// Enter or leave picture-in-picture; does nothing when unsupported
    pub fn toggle_picture_in_picture(&mut self, store: &PlayerStore) {
        if !self.media.picture_in_picture_supported() {
            debug!("Picture-in-picture not supported, ignoring");
            return;
        }
        let result = if store.state().is_picture_in_picture {
            self.media.exit_picture_in_picture()
        } else {
            self.media.request_picture_in_picture()
        };
        if let Err(e) = result {
            warn!("Picture-in-picture request failed: {}", e);
        }
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("attached", &self.attached)
            .field("current_time", &self.media.current_time())
            .finish()
    }
}
