//! Player session
//!
//! One `PlayerSession` exists per mounted player. It owns the state store,
//! the playback clock, the input controller, the progress sync engine, the
//! auto-advance controller and their timers, and processes one event at a
//! time: a command, a key, a tap, a media callback, a resume lookup or a
//! timer firing. After each event [`PlayerSession::reconcile`] lets the
//! observers react to the new state before the next event is handled, so
//! timer cancellation always happens in the same turn as its cause.
//!
//! The session does no I/O and never sleeps; the runtime (or a test) feeds it
//! events and virtual time.

use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use crate::playback::auto_advance::{AutoAdvance, CountdownTick};
use crate::playback::clock::{MediaElement, MediaEvent, PlaybackClock};
use crate::playback::input::{Focus, InputController, PlayerCommand};
use crate::playback::progress_sync::{ProgressRequest, ProgressSync};
use crate::playback::scheduler::{TimerKind, Timers};
use crate::state::{PlaybackSession, PlayerStore};
use dracin_common::catalog::position_in;
use dracin_common::events::{CancelReason, EventBus, PlayerEvent};
use dracin_common::time::now;
use dracin_common::{EpisodeRef, Series};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Flags last reported on the event bus
#[derive(Debug, Default, Clone, Copy)]
struct Reported {
    playing: bool,
    buffering: bool,
    fullscreen: bool,
    picture_in_picture: bool,
}

/// A resume position waiting for the media to report a duration
#[derive(Debug, Clone, Copy)]
struct PendingResume {
    generation: u64,
    position: f64,
}

/// Playback session for one player mount
pub struct PlayerSession {
    settings: PlayerSettings,
    store: PlayerStore,
    clock: PlaybackClock,
    input: InputController,
    sync: ProgressSync,
    auto_advance: AutoAdvance,
    timers: Timers,
    events: EventBus,
    reported: Reported,
    pending_resume: Option<PendingResume>,
    closed: bool,
}

impl PlayerSession {
    /// Build a session around a media element
    ///
    /// `outbox` receives progress requests for the progress worker. Player
    /// events are published on `events`.
    pub fn new(
        settings: PlayerSettings,
        media: Box<dyn MediaElement>,
        outbox: mpsc::UnboundedSender<ProgressRequest>,
        events: EventBus,
    ) -> Self {
        Self {
            store: PlayerStore::new(),
            clock: PlaybackClock::new(media),
            input: InputController::new(&settings),
            sync: ProgressSync::new(&settings, outbox),
            auto_advance: AutoAdvance::new(settings.auto_advance_secs),
            timers: Timers::new(),
            events,
            reported: Reported::default(),
            pending_resume: None,
            closed: false,
            settings,
        }
    }

    /// Media event receiver; the owner must feed these back through
    /// [`handle_media_event`](Self::handle_media_event). Available once.
    pub fn take_media_events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>> {
        self.clock.take_events()
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Current state snapshot
    pub fn state(&self) -> PlaybackSession {
        self.store.snapshot()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.store.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Seconds left on the auto-advance countdown
    pub fn auto_advance_remaining(&self) -> Option<u32> {
        self.auto_advance.seconds_remaining()
    }

    /// Episode the auto-advance countdown is heading to
    pub fn up_next(&self) -> Option<&EpisodeRef> {
        self.auto_advance.up_next()
    }

    pub fn shortcut_help_visible(&self) -> bool {
        self.input.help_visible()
    }

    /// Live timers of a kind (0 or 1)
    pub fn live_timers(&self, kind: TimerKind) -> usize {
        self.timers.live_count(kind)
    }

    /// Last position submitted to the progress backend
    pub fn last_synced_time(&self) -> f64 {
        self.sync.last_synced_time()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ------------------------------------------------------------------
    // Episode loading
    // ------------------------------------------------------------------

    /// Replace the playlist with a series' episodes
    pub fn load_series(&mut self, series: &Series) {
        if self.closed {
            return;
        }
        info!(series_id = %series.id, episodes = series.episodes.len(), "Loaded series");
        self.store.load_series(series);
        self.reconcile();
    }

    /// Load an episode and start playing it
    ///
    /// Any countdown and this episode's timers are cancelled before the new
    /// episode arms its own. Reselecting the current episode restarts it.
    pub fn select_episode(&mut self, episode: EpisodeRef) {
        if self.closed {
            return;
        }

        if self.auto_advance.cancel(&mut self.timers) {
            self.emit_cancelled(CancelReason::EpisodeSelected);
        }
        self.timers.cancel(TimerKind::ControlsHide);
        self.pending_resume = None;

        let previous_episode_id = self.store.current_episode().map(|e| e.id);
        info!(
            episode_id = %episode.id,
            episode_number = episode.episode_number,
            "Selecting episode"
        );

        self.store.select_episode(episode.clone());
        self.store.set_show_controls(true);
        self.clock.load(&episode, &self.store);
        self.events.emit_lossy(PlayerEvent::EpisodeChanged {
            previous_episode_id,
            episode_id: episode.id.clone(),
            episode_number: episode.episode_number,
            timestamp: now(),
        });

        self.clock.play(&mut self.store);
        self.reconcile();
    }

    /// Select a playlist entry by ID
    pub fn select_episode_by_id(&mut self, episode_id: &str) -> Result<()> {
        let episode = {
            let state = self.store.state();
            position_in(&state.playlist, episode_id).map(|idx| state.playlist[idx].clone())
        };
        match episode {
            Some(episode) => {
                self.select_episode(episode);
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "Episode {} is not in the playlist",
                episode_id
            ))),
        }
    }

    /// Apply a stored position looked up for an episode load
    ///
    /// Lookups for a load that has since been replaced are ignored. Without
    /// any known duration the seek waits for the media to report one.
    pub fn handle_resume(&mut self, episode_id: &str, generation: u64, position: Option<f64>) {
        if self.closed {
            return;
        }
        let (current_generation, current_id, duration) = {
            let state = self.store.state();
            (
                state.episode_generation,
                state.current_episode_id().map(str::to_string),
                state.effective_duration(),
            )
        };
        if generation != current_generation || current_id.as_deref() != Some(episode_id) {
            debug!(episode_id, generation, "Discarding stale resume lookup");
            return;
        }

        let position = match position {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => {
                debug!(episode_id, "No stored position, starting from the beginning");
                return;
            }
        };

        if duration > 0.0 {
            self.apply_resume(position);
        } else {
            debug!(episode_id, position, "Deferring resume until duration is known");
            self.pending_resume = Some(PendingResume {
                generation,
                position,
            });
        }
        self.reconcile();
    }

    fn apply_resume(&mut self, position: f64) {
        let target = self.clock.seek_to(position, &mut self.store);
        self.sync.mark_resumed(target);
        if let Some(episode_id) = self.store.state().current_episode_id() {
            info!(episode_id, position = target, "Resumed from stored position");
            self.events.emit_lossy(PlayerEvent::ResumeApplied {
                episode_id: episode_id.to_string(),
                position: target,
                timestamp: now(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Execute an imperative command
    pub fn execute(&mut self, command: PlayerCommand) {
        if self.closed {
            debug!(?command, "Session closed, ignoring command");
            return;
        }

        match command {
            PlayerCommand::TogglePlay => self.clock.toggle_play(&mut self.store),
            PlayerCommand::Play => self.clock.play(&mut self.store),
            PlayerCommand::Pause => self.clock.pause(&mut self.store),
            PlayerCommand::SeekBy(delta) => {
                self.clock.seek_by(delta, &mut self.store);
            }
            PlayerCommand::SeekTo(seconds) => {
                self.clock.seek_to(seconds, &mut self.store);
            }
            PlayerCommand::SetVolume(volume) => self.clock.set_volume(volume, &mut self.store),
            PlayerCommand::AdjustVolume(delta) => {
                self.clock.adjust_volume(delta, &mut self.store)
            }
            PlayerCommand::ToggleMute => self.clock.toggle_mute(&mut self.store),
            PlayerCommand::SetPlaybackRate(rate) => {
                self.clock.set_playback_rate(rate, &mut self.store)
            }
            PlayerCommand::StepPlaybackRate(step) => {
                self.clock.step_playback_rate(step, &mut self.store)
            }
            PlayerCommand::ToggleFullscreen => self.clock.toggle_fullscreen(&self.store),
            PlayerCommand::TogglePictureInPicture => {
                self.clock.toggle_picture_in_picture(&self.store)
            }
            PlayerCommand::ToggleShortcutHelp => {
                let visible = self.input.toggle_help();
                self.events.emit_lossy(PlayerEvent::ShortcutHelpToggled {
                    visible,
                    timestamp: now(),
                });
            }
            PlayerCommand::SelectEpisode(episode_id) => {
                if let Err(e) = self.select_episode_by_id(&episode_id) {
                    warn!("Failed to select episode: {}", e);
                }
                return;
            }
            PlayerCommand::PlayNext => {
                self.play_next();
                return;
            }
            PlayerCommand::CancelAutoAdvance => {
                if self.auto_advance.cancel(&mut self.timers) {
                    self.emit_cancelled(CancelReason::UserCancelled);
                }
            }
            PlayerCommand::SetSidebarOpen(open) => self.store.set_sidebar_open(open),
            PlayerCommand::PointerMoved => self.pointer_moved(),
            PlayerCommand::PointerLeft => {
                if self.store.is_playing() {
                    self.timers.cancel(TimerKind::ControlsHide);
                    self.store.set_show_controls(false);
                }
            }
        }
        self.reconcile();
    }

    /// Keyboard shortcut
    pub fn handle_key(&mut self, key: &str, focus: Focus) {
        if let Some(command) = self.input.handle_key(key, focus) {
            self.execute(command);
        }
    }

    /// Pointer tap at `x` on a surface `width` wide, at the current virtual time
    pub fn handle_tap(&mut self, x: f64, width: f64) {
        let at = self.timers.now();
        if let Some(command) = self.input.handle_tap(at, x, width) {
            self.execute(command);
        }
    }

    fn play_next(&mut self) {
        let from = self.store.current_episode().map(|e| e.id);

        if let Some(next) = self.auto_advance.take_now(&mut self.timers) {
            debug!(next_episode_id = %next.id, "Advancing now");
            self.advance_into(from, next);
            return;
        }

        let next = self.store.state().next_episode().cloned();
        match next {
            Some(next) => self.select_episode(next),
            None => debug!("No next episode"),
        }
    }

    fn advance_into(&mut self, from: Option<String>, next: EpisodeRef) {
        let to_episode_id = next.id.clone();
        self.select_episode(next);
        if let Some(from_episode_id) = from {
            self.events.emit_lossy(PlayerEvent::AutoAdvanced {
                from_episode_id,
                to_episode_id,
                timestamp: now(),
            });
        }
    }

    fn pointer_moved(&mut self) {
        self.store.set_show_controls(true);
        self.timers.cancel(TimerKind::ControlsHide);
        if self.store.is_playing() {
            self.timers
                .arm_once(TimerKind::ControlsHide, self.settings.controls_hide_delay());
        }
    }

    // ------------------------------------------------------------------
    // Media callbacks
    // ------------------------------------------------------------------

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.closed {
            return;
        }

        match event {
            MediaEvent::TimeUpdate(seconds) => {
                if seconds.is_finite() {
                    self.store.set_current_time(seconds);
                }
            }
            MediaEvent::DurationChange(duration) => {
                self.store.set_duration(duration);
                self.apply_pending_resume();
            }
            MediaEvent::Waiting => self.store.set_buffering(true),
            MediaEvent::Playing => {
                self.store.set_buffering(false);
                self.store.set_playing(true);
                if self.auto_advance.cancel(&mut self.timers) {
                    self.emit_cancelled(CancelReason::PlaybackResumed);
                }
            }
            MediaEvent::Paused => self.store.set_playing(false),
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::Error(message) => self.on_playback_error(message),
            MediaEvent::PlayRejected(reason) => {
                debug!("Play rejected by runtime: {}", reason);
                self.store.set_playing(false);
            }
            MediaEvent::EnterPictureInPicture => self.store.set_picture_in_picture(true),
            MediaEvent::LeavePictureInPicture => self.store.set_picture_in_picture(false),
            MediaEvent::FullscreenChange(fullscreen) => self.store.set_fullscreen(fullscreen),
        }
        self.reconcile();
    }

    fn apply_pending_resume(&mut self) {
        let Some(pending) = self.pending_resume else {
            return;
        };
        let (generation, duration) = {
            let state = self.store.state();
            (state.episode_generation, state.effective_duration())
        };
        if pending.generation != generation {
            self.pending_resume = None;
            return;
        }
        if duration > 0.0 {
            self.pending_resume = None;
            self.apply_resume(pending.position);
        }
    }

    fn on_ended(&mut self) {
        self.store.set_playing(false);
        self.store.set_buffering(false);

        let state = self.store.snapshot();
        let Some(episode_id) = state.current_episode_id().map(str::to_string) else {
            return;
        };
        info!(episode_id = %episode_id, "Episode ended");
        self.sync.record_completion(&state);

        let next = self.auto_advance.start(&state, &mut self.timers);
        self.events.emit_lossy(PlayerEvent::EpisodeEnded {
            episode_id,
            has_next: next.is_some(),
            timestamp: now(),
        });
        if let Some(next) = next {
            self.events.emit_lossy(PlayerEvent::AutoAdvanceStarted {
                next_episode_id: next.id,
                next_episode_title: next.title,
                seconds_remaining: self.settings.auto_advance_secs,
                timestamp: now(),
            });
        }
    }

    fn on_playback_error(&mut self, message: String) {
        let episode_id = self.store.current_episode().map(|e| e.id);
        error!(
            episode_id = episode_id.as_deref().unwrap_or("-"),
            "Playback failed: {}", message
        );
        if self.auto_advance.cancel(&mut self.timers) {
            self.emit_cancelled(CancelReason::Teardown);
        }
        self.pending_resume = None;
        self.store.reset();
        self.store.set_unavailable(true);
        self.events.emit_lossy(PlayerEvent::PlaybackFailed {
            episode_id,
            message,
            timestamp: now(),
        });
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Fire every timer due at or before `now`, in deadline order
    pub fn advance_to(&mut self, now: Duration) {
        while let Some(kind) = self.timers.pop_due(now) {
            self.fire(kind);
        }
        self.timers.set_now(now);
    }

    /// Advance virtual time by `elapsed`
    pub fn advance(&mut self, elapsed: Duration) {
        let target = self.timers.now() + elapsed;
        self.advance_to(target);
    }

    fn fire(&mut self, kind: TimerKind) {
        if self.closed {
            return;
        }
        match kind {
            TimerKind::ProgressSync => {
                let state = self.store.snapshot();
                self.sync.on_tick(&state);
            }
            TimerKind::AutoAdvance => match self.auto_advance.on_tick(&mut self.timers) {
                CountdownTick::Remaining(seconds_remaining) => {
                    self.events.emit_lossy(PlayerEvent::AutoAdvanceTick {
                        seconds_remaining,
                        timestamp: now(),
                    });
                }
                CountdownTick::Advance(next) => {
                    let from = self.store.current_episode().map(|e| e.id);
                    info!(next_episode_id = %next.id, "Auto-advancing");
                    self.advance_into(from, next);
                }
                CountdownTick::Idle => {}
            },
            TimerKind::ControlsHide => {
                if self.store.is_playing() {
                    self.store.set_show_controls(false);
                }
            }
        }
        self.reconcile();
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Let observers react to the current state
    fn reconcile(&mut self) {
        if self.closed {
            return;
        }
        let state = self.store.snapshot();

        if self.auto_advance.observe(&state, &mut self.timers) {
            self.emit_cancelled(CancelReason::EpisodeSelected);
        }
        self.sync.observe(&state, &mut self.timers);

        if !state.is_playing {
            self.timers.cancel(TimerKind::ControlsHide);
            self.store.set_show_controls(true);
        }

        self.report_changes(&state);
    }

    fn report_changes(&mut self, state: &PlaybackSession) {
        if state.is_playing != self.reported.playing {
            self.reported.playing = state.is_playing;
            self.events.emit_lossy(PlayerEvent::PlaybackStateChanged {
                episode_id: state.current_episode_id().map(str::to_string),
                playing: state.is_playing,
                timestamp: now(),
            });
        }
        if state.is_buffering != self.reported.buffering {
            self.reported.buffering = state.is_buffering;
            self.events.emit_lossy(PlayerEvent::BufferingChanged {
                buffering: state.is_buffering,
                timestamp: now(),
            });
        }
        if state.is_fullscreen != self.reported.fullscreen {
            self.reported.fullscreen = state.is_fullscreen;
            self.events.emit_lossy(PlayerEvent::FullscreenChanged {
                fullscreen: state.is_fullscreen,
                timestamp: now(),
            });
        }
        if state.is_picture_in_picture != self.reported.picture_in_picture {
            self.reported.picture_in_picture = state.is_picture_in_picture;
            self.events.emit_lossy(PlayerEvent::PictureInPictureChanged {
                active: state.is_picture_in_picture,
                timestamp: now(),
            });
        }
    }

    fn emit_cancelled(&self, reason: CancelReason) {
        debug!(%reason, "Auto-advance cancelled");
        self.events.emit_lossy(PlayerEvent::AutoAdvanceCancelled {
            reason,
            timestamp: now(),
        });
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tear the session down: cancel every timer, flush progress, stop and
    /// detach the media element. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }

        if self.auto_advance.cancel(&mut self.timers) {
            self.emit_cancelled(CancelReason::Teardown);
        }
        let state = self.store.snapshot();
        self.sync.teardown(&state, &mut self.timers);
        self.timers.cancel_all();
        self.pending_resume = None;
        self.clock.detach();
        self.store.set_playing(false);
        self.closed = true;

        info!(
            episode_id = state.current_episode_id().unwrap_or("-"),
            position = state.current_time,
            "Player session closed"
        );
        self.events.emit_lossy(PlayerEvent::SessionClosed {
            episode_id: state.current_episode_id().map(str::to_string),
            position: state.current_time,
            timestamp: now(),
        });
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("episode", &self.store.state().current_episode_id())
            .field("closed", &self.closed)
            .field("now", &self.timers.now())
            .finish()
    }
}
