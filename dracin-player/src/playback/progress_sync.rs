//! Progress sync engine
//!
//! Keeps the backend's watch position eventually consistent with the player:
//!
//! - **Periodic**: while playing and not buffering, an interval timer submits
//!   the current position. Whether the timer is armed is recomputed from
//!   `(is_playing, is_buffering)` on every state change.
//! - **Debounce**: a non-forced sync within `sync_debounce_secs` of the last
//!   synced position is skipped.
//! - **Forced**: natural end (marked completed), episode change and teardown
//!   bypass the debounce.
//! - **Resume**: each episode load requests the stored position once; the
//!   session applies it when the lookup completes.
//!
//! The engine never performs I/O itself. Requests go to an outbox drained by
//! the progress worker, so a slow or failing backend cannot stall playback.

use crate::config::PlayerSettings;
use crate::playback::scheduler::{TimerKind, Timers};
use crate::state::PlaybackSession;
use dracin_common::catalog::ProgressUpdate;
use dracin_common::events::SyncTrigger;
use dracin_common::EpisodeRef;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// One position submission
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub episode_id: String,
    pub series_id: String,
    /// Seconds
    pub position: f64,
    /// Seconds; 0 when unknown
    pub duration: f64,
    /// Set only by the end-of-episode sync
    pub completed: bool,
    pub trigger: SyncTrigger,
}

impl PositionReport {
    /// Request body for the progress endpoint
    ///
    /// `completed` is only sent when set, leaving the completion threshold
    /// to the backend otherwise.
    pub fn to_update(&self) -> ProgressUpdate {
        ProgressUpdate {
            episode_id: self.episode_id.clone(),
            drama_id: self.series_id.clone(),
            current_time: self.position,
            duration: self.duration,
            completed: self.completed.then_some(true),
        }
    }
}

/// Work for the progress worker
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressRequest {
    /// Upsert a position
    Record(PositionReport),
    /// Look up the stored position for resume; `generation` identifies the
    /// episode load that asked
    Fetch { episode_id: String, generation: u64 },
}

/// Last known state of the episode being tracked
#[derive(Debug, Clone)]
struct Tracked {
    episode: EpisodeRef,
    generation: u64,
    position: f64,
    duration: f64,
}

/// Progress sync engine state for one player
#[derive(Debug)]
pub struct ProgressSync {
    outbox: mpsc::UnboundedSender<ProgressRequest>,
    interval: Duration,
    debounce: f64,
    last_synced_time: f64,
    tracked: Option<Tracked>,
    closed: bool,
}

impl ProgressSync {
    pub fn new(settings: &PlayerSettings, outbox: mpsc::UnboundedSender<ProgressRequest>) -> Self {
        Self {
            outbox,
            interval: settings.sync_interval(),
            debounce: settings.sync_debounce_secs,
            last_synced_time: 0.0,
            tracked: None,
            closed: false,
        }
    }

    /// Last position submitted (or attempted)
    pub fn last_synced_time(&self) -> f64 {
        self.last_synced_time
    }

    pub fn tracked_episode_id(&self) -> Option<&str> {
        self.tracked.as_ref().map(|t| t.episode.id.as_str())
    }

    /// React to a store change
    ///
    /// A new episode generation flushes the previous episode at its last
    /// known position, cancels the old interval and requests the resume
    /// position. Then the interval is armed or disarmed from the current
    /// playing/buffering flags.
    pub fn observe(&mut self, state: &PlaybackSession, timers: &mut Timers) {
        if self.closed {
            return;
        }

        let generation_changed = match (&self.tracked, &state.current_episode) {
            (Some(t), Some(_)) => t.generation != state.episode_generation,
            (None, Some(_)) => true,
            (Some(_), None) => true,
            (None, None) => false,
        };

        if generation_changed {
            timers.cancel(TimerKind::ProgressSync);
            if let Some(previous) = self.tracked.take() {
                self.submit(&previous, previous.position, SyncTrigger::EpisodeChange, false);
            }
            self.last_synced_time = 0.0;
            if let Some(episode) = &state.current_episode {
                self.tracked = Some(Tracked {
                    episode: episode.clone(),
                    generation: state.episode_generation,
                    position: 0.0,
                    duration: 0.0,
                });
                self.send(ProgressRequest::Fetch {
                    episode_id: episode.id.clone(),
                    generation: state.episode_generation,
                });
            }
        }

        self.track(state);

        let should_run = self.tracked.is_some() && state.is_playing && !state.is_buffering;
        match (should_run, timers.is_armed(TimerKind::ProgressSync)) {
            (true, false) => {
                timers.arm_interval(TimerKind::ProgressSync, self.interval);
                debug!("Progress sync armed");
            }
            (false, true) => {
                timers.cancel(TimerKind::ProgressSync);
                debug!("Progress sync disarmed");
            }
            _ => {}
        }
    }

    /// Remember the latest position of the tracked episode
    ///
    /// Positions are not tracked while the episode is unavailable, so a
    /// playback error does not overwrite progress with 0.
    pub fn track(&mut self, state: &PlaybackSession) {
        let Some(tracked) = self.tracked.as_mut() else {
            return;
        };
        if state.episode_generation != tracked.generation || state.is_unavailable {
            return;
        }
        tracked.position = state.current_time;
        tracked.duration = state.effective_duration();
    }

    /// Periodic tick
    pub fn on_tick(&mut self, state: &PlaybackSession) -> bool {
        self.track(state);
        self.sync(state.current_time, SyncTrigger::Periodic)
    }

    /// Submit `time` for the tracked episode
    ///
    /// Returns whether a request was issued. Non-forced triggers are skipped
    /// when `time` is within the debounce window of the last synced time.
    pub fn sync(&mut self, time: f64, trigger: SyncTrigger) -> bool {
        self.sync_inner(time, trigger, false)
    }

    /// Forced end-of-episode sync, marked completed
    pub fn record_completion(&mut self, state: &PlaybackSession) -> bool {
        self.track(state);
        let duration = state.effective_duration();
        let position = if duration > 0.0 {
            duration
        } else {
            state.current_time
        };
        self.sync_inner(position, SyncTrigger::Ended, true)
    }

    /// Align the debounce baseline with an applied resume position
    pub fn mark_resumed(&mut self, position: f64) {
        self.last_synced_time = position;
        if let Some(tracked) = self.tracked.as_mut() {
            tracked.position = position;
        }
    }

    /// Final flush: cancel the interval and force-submit the last known
    /// position. Further calls do nothing.
    pub fn teardown(&mut self, state: &PlaybackSession, timers: &mut Timers) {
        if self.closed {
            return;
        }
        timers.cancel(TimerKind::ProgressSync);
        self.track(state);
        if let Some(tracked) = self.tracked.take() {
            self.submit(&tracked, tracked.position, SyncTrigger::Teardown, false);
        }
        self.closed = true;
    }

    fn sync_inner(&mut self, time: f64, trigger: SyncTrigger, completed: bool) -> bool {
        if self.closed || !time.is_finite() {
            return false;
        }
        let Some(tracked) = self.tracked.clone() else {
            trace!("No episode loaded, skipping sync");
            return false;
        };
        if !trigger.is_forced() && (time - self.last_synced_time).abs() < self.debounce {
            trace!(
                position = time,
                last_synced = self.last_synced_time,
                "Sync debounced"
            );
            return false;
        }
        self.submit(&tracked, time, trigger, completed);
        true
    }

    fn submit(&mut self, tracked: &Tracked, position: f64, trigger: SyncTrigger, completed: bool) {
        debug!(
            episode_id = %tracked.episode.id,
            position,
            %trigger,
            "Submitting progress"
        );
        self.last_synced_time = position;
        self.send(ProgressRequest::Record(PositionReport {
            episode_id: tracked.episode.id.clone(),
            series_id: tracked.episode.series_id.clone(),
            position,
            duration: tracked.duration,
            completed,
            trigger,
        }));
    }

    fn send(&self, request: ProgressRequest) {
        if self.outbox.send(request).is_err() {
            debug!("Progress worker gone, dropping request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlayerStore;

    fn episode(id: &str, number: u32) -> EpisodeRef {
        EpisodeRef {
            id: id.to_string(),
            title: format!("Episode {}", number),
            thumbnail: String::new(),
            stream_url: String::new(),
            duration: 2700.0,
            episode_number: number,
            series_id: "drama-1".to_string(),
        }
    }

    fn setup() -> (
        ProgressSync,
        PlayerStore,
        Timers,
        mpsc::UnboundedReceiver<ProgressRequest>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sync = ProgressSync::new(&PlayerSettings::default(), tx);
        (sync, PlayerStore::new(), Timers::new(), rx)
    }

    fn records(rx: &mut mpsc::UnboundedReceiver<ProgressRequest>) -> Vec<PositionReport> {
        let mut out = Vec::new();
        while let Ok(req) = rx.try_recv() {
            if let ProgressRequest::Record(report) = req {
                out.push(report);
            }
        }
        out
    }

    #[test]
    fn test_debounce_window() {
        let (mut sync, mut store, mut timers, mut rx) = setup();
        store.select_episode(episode("ep-1", 1));
        sync.observe(&store.snapshot(), &mut timers);

        assert!(sync.sync(100.0, SyncTrigger::Periodic));
        assert_eq!(sync.last_synced_time(), 100.0);

        assert!(!sync.sync(103.0, SyncTrigger::Periodic));
        assert!(sync.sync(106.0, SyncTrigger::Periodic));

        let positions: Vec<_> = records(&mut rx).iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![100.0, 106.0]);
    }

    #[test]
    fn test_forced_sync_bypasses_debounce() {
        let (mut sync, mut store, mut timers, mut rx) = setup();
        store.select_episode(episode("ep-1", 1));
        sync.observe(&store.snapshot(), &mut timers);

        assert!(sync.sync(100.0, SyncTrigger::Periodic));
        assert!(sync.sync(101.0, SyncTrigger::Teardown));
        assert_eq!(records(&mut rx).len(), 2);
    }

    #[test]
    fn test_timer_follows_playing_and_buffering() {
        let (mut sync, mut store, mut timers, _rx) = setup();
        store.select_episode(episode("ep-1", 1));
        sync.observe(&store.snapshot(), &mut timers);
        assert!(timers.is_armed(TimerKind::ProgressSync));

        store.set_buffering(true);
        sync.observe(&store.snapshot(), &mut timers);
        assert!(!timers.is_armed(TimerKind::ProgressSync));

        store.set_buffering(false);
        sync.observe(&store.snapshot(), &mut timers);
        assert!(timers.is_armed(TimerKind::ProgressSync));

        store.set_playing(false);
        sync.observe(&store.snapshot(), &mut timers);
        assert!(!timers.is_armed(TimerKind::ProgressSync));
    }

    #[test]
    fn test_episode_change_flushes_previous_position_and_fetches_resume() {
        let (mut sync, mut store, mut timers, mut rx) = setup();
        store.select_episode(episode("ep-1", 1));
        sync.observe(&store.snapshot(), &mut timers);
        store.set_current_time(321.0);
        sync.observe(&store.snapshot(), &mut timers);

        store.select_episode(episode("ep-2", 2));
        sync.observe(&store.snapshot(), &mut timers);

        let requests: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            requests[0],
            ProgressRequest::Fetch {
                episode_id: "ep-1".to_string(),
                generation: 1
            }
        );
        match &requests[1] {
            ProgressRequest::Record(report) => {
                assert_eq!(report.episode_id, "ep-1");
                assert_eq!(report.position, 321.0);
                assert_eq!(report.trigger, SyncTrigger::EpisodeChange);
            }
            other => panic!("Expected flush of ep-1, got {:?}", other),
        }
        assert_eq!(
            requests[2],
            ProgressRequest::Fetch {
                episode_id: "ep-2".to_string(),
                generation: 2
            }
        );
        assert_eq!(sync.last_synced_time(), 0.0);
        assert_eq!(sync.tracked_episode_id(), Some("ep-2"));
    }

    #[test]
    fn test_completion_reports_duration() {
        let (mut sync, mut store, mut timers, mut rx) = setup();
        store.select_episode(episode("ep-1", 1));
        store.set_duration(2700.0);
        sync.observe(&store.snapshot(), &mut timers);
        store.set_current_time(2699.5);

        assert!(sync.record_completion(&store.snapshot()));
        let report = records(&mut rx).pop().unwrap();
        assert!(report.completed);
        assert_eq!(report.position, 2700.0);
        assert_eq!(report.trigger, SyncTrigger::Ended);
        assert_eq!(report.to_update().completed, Some(true));
    }

    #[test]
    fn test_teardown_flushes_once() {
        let (mut sync, mut store, mut timers, mut rx) = setup();
        store.select_episode(episode("ep-1", 1));
        sync.observe(&store.snapshot(), &mut timers);
        store.set_current_time(3.0);

        // Debounced
        assert!(!sync.on_tick(&store.snapshot()));

        sync.teardown(&store.snapshot(), &mut timers);
        sync.teardown(&store.snapshot(), &mut timers);

        let reports = records(&mut rx);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].position, 3.0);
        assert_eq!(reports[0].trigger, SyncTrigger::Teardown);
        assert!(!timers.is_armed(TimerKind::ProgressSync));
    }

    #[test]
    fn test_unavailable_episode_keeps_last_position() {
        let (mut sync, mut store, mut timers, mut rx) = setup();
        store.select_episode(episode("ep-1", 1));
        store.set_current_time(500.0);
        sync.observe(&store.snapshot(), &mut timers);

        store.reset();
        store.set_unavailable(true);
        sync.observe(&store.snapshot(), &mut timers);
        sync.teardown(&store.snapshot(), &mut timers);

        assert_eq!(records(&mut rx).pop().unwrap().position, 500.0);
    }

    #[test]
    fn test_report_omits_completed_when_unset() {
        let report = PositionReport {
            episode_id: "ep-1".to_string(),
            series_id: "drama-1".to_string(),
            position: 42.0,
            duration: 2700.0,
            completed: false,
            trigger: SyncTrigger::Periodic,
        };
        let json = serde_json::to_value(report.to_update()).unwrap();
        assert_eq!(json["episodeId"], "ep-1");
        assert_eq!(json["dramaId"], "drama-1");
        assert_eq!(json["currentTime"], 42.0);
        assert!(json.get("completed").is_none());
    }
}
