//! Player state store
//!
//! Single source of truth for one mounted player: play/pause, volume, rate,
//! time, fullscreen, current episode, playlist and sidebar visibility.
//!
//! The store is an explicit object owned by its `PlayerSession`; there is no
//! process-wide instance. State lives inside a `tokio::sync::watch` channel so
//! hosts can subscribe for rendering, while every mutation goes through the
//! setters below (which take `&mut self`, keeping the store the only writer).
//! A setter that does not change anything does not notify subscribers.

use dracin_common::catalog::{position_in, sort_by_episode_number};
use dracin_common::events::nearest_playback_rate;
use dracin_common::{EpisodeRef, Series, SeriesSummary};
use serde::Serialize;
use tokio::sync::watch;

/// Observable playback state for one player mount
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSession {
    /// Series the playlist belongs to
    pub current_series: Option<SeriesSummary>,
    /// Episode currently loaded
    pub current_episode: Option<EpisodeRef>,
    /// Episodes of the current series, episode number ascending
    pub playlist: Vec<EpisodeRef>,

    pub is_playing: bool,
    pub is_muted: bool,
    pub is_buffering: bool,
    pub is_fullscreen: bool,
    pub is_picture_in_picture: bool,
    /// Set after an unrecoverable media error; cleared on episode selection
    pub is_unavailable: bool,

    /// Volume in [0, 1]
    pub volume: f64,
    /// One of `PLAYBACK_RATES`
    pub playback_rate: f64,
    /// Seconds; never exceeds `duration` once the duration is known
    pub current_time: f64,
    /// Seconds; 0 until the media reports it
    pub duration: f64,

    pub is_sidebar_open: bool,
    pub show_controls: bool,

    /// Incremented by every episode selection, including reselection of
    /// the same episode
    pub episode_generation: u64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_series: None,
            current_episode: None,
            playlist: Vec::new(),
            is_playing: false,
            is_muted: false,
            is_buffering: false,
            is_fullscreen: false,
            is_picture_in_picture: false,
            is_unavailable: false,
            volume: 1.0,
            playback_rate: 1.0,
            current_time: 0.0,
            duration: 0.0,
            is_sidebar_open: false,
            show_controls: true,
            episode_generation: 0,
        }
    }
}

impl PlaybackSession {
    pub fn current_episode_id(&self) -> Option<&str> {
        self.current_episode.as_ref().map(|ep| ep.id.as_str())
    }

    /// Best known episode length: media-reported, else catalog metadata, else 0
    pub fn effective_duration(&self) -> f64 {
        if self.duration > 0.0 {
            self.duration
        } else {
            self.current_episode
                .as_ref()
                .map(|ep| ep.duration)
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0)
        }
    }

    /// Playlist entry after the current episode
    pub fn next_episode(&self) -> Option<&EpisodeRef> {
        let current = self.current_episode_id()?;
        dracin_common::catalog::next_after(&self.playlist, current)
    }

    /// Volume actually applied to the media (0 while muted)
    pub fn effective_volume(&self) -> f64 {
        if self.is_muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Clamp a position to `[0, duration]`
///
/// An unknown duration (0) only clamps from below. Non-finite input maps to 0.
pub fn clamp_position(seconds: f64, duration: f64) -> f64 {
    let seconds = if seconds.is_finite() { seconds } else { 0.0 };
    if duration > 0.0 {
        seconds.clamp(0.0, duration)
    } else {
        seconds.max(0.0)
    }
}

/// Player state store
#[derive(Debug)]
pub struct PlayerStore {
    tx: watch::Sender<PlaybackSession>,
}

impl PlayerStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PlaybackSession::default());
        Self { tx }
    }

    /// Subscribe to state changes (for rendering controls, progress bar, time)
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.tx.subscribe()
    }

    /// Borrow current state
    ///
    /// Do not hold the guard across a setter call.
    pub fn state(&self) -> watch::Ref<'_, PlaybackSession> {
        self.tx.borrow()
    }

    /// Clone current state
    pub fn snapshot(&self) -> PlaybackSession {
        self.tx.borrow().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.tx.borrow().is_playing
    }

    pub fn current_time(&self) -> f64 {
        self.tx.borrow().current_time
    }

    pub fn current_episode(&self) -> Option<EpisodeRef> {
        self.tx.borrow().current_episode.clone()
    }

    pub fn episode_generation(&self) -> u64 {
        self.tx.borrow().episode_generation
    }

    fn update(&mut self, f: impl FnOnce(&mut PlaybackSession) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.update(|s| replace(&mut s.is_playing, playing));
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.update(|s| replace(&mut s.is_muted, muted));
    }

    /// Set volume, clamped to [0, 1]
    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            return;
        };
        self.update(|s| replace(&mut s.volume, volume));
    }

    /// Set playback rate, snapped to the nearest offered rate
    pub fn set_playback_rate(&mut self, rate: f64) {
        let rate = nearest_playback_rate(rate);
        self.update(|s| replace(&mut s.playback_rate, rate));
    }

    /// Set current time, clamped to the known duration
    pub fn set_current_time(&mut self, seconds: f64) {
        self.update(|s| {
            let t = clamp_position(seconds, s.duration);
            replace(&mut s.current_time, t)
        });
    }

    /// Set duration; non-finite or negative values leave it unknown
    ///
    /// A shorter duration pulls `current_time` back inside it.
    pub fn set_duration(&mut self, duration: f64) {
        if !duration.is_finite() || duration < 0.0 {
            return;
        }
        self.update(|s| {
            let mut changed = replace(&mut s.duration, duration);
            if duration > 0.0 && s.current_time > duration {
                s.current_time = duration;
                changed = true;
            }
            changed
        });
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.update(|s| replace(&mut s.is_fullscreen, fullscreen));
    }

    pub fn set_picture_in_picture(&mut self, active: bool) {
        self.update(|s| replace(&mut s.is_picture_in_picture, active));
    }

    pub fn set_buffering(&mut self, buffering: bool) {
        self.update(|s| replace(&mut s.is_buffering, buffering));
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.update(|s| replace(&mut s.is_unavailable, unavailable));
    }

    pub fn set_sidebar_open(&mut self, open: bool) {
        self.update(|s| replace(&mut s.is_sidebar_open, open));
    }

    pub fn set_show_controls(&mut self, show: bool) {
        self.update(|s| replace(&mut s.show_controls, show));
    }

    /// Replace the playlist with the series' episodes, episode number ascending
    ///
    /// Does not change the current episode. If the current episode is not part
    /// of the new series it is kept in the playlist at its sorted position.
    pub fn load_series(&mut self, series: &Series) {
        let mut playlist = series.sorted_episodes();
        self.update(|s| {
            if let Some(current) = &s.current_episode {
                if position_in(&playlist, &current.id).is_none() {
                    playlist.push(current.clone());
                    sort_by_episode_number(&mut playlist);
                }
            }
            s.current_series = Some(series.summary());
            s.playlist = playlist;
            true
        });
    }

    /// Load an episode: reset time to 0 and start playing
    ///
    /// Always notifies, even when reselecting the current episode; the
    /// episode generation distinguishes loads.
    pub fn select_episode(&mut self, episode: EpisodeRef) {
        self.update(|s| {
            if position_in(&s.playlist, &episode.id).is_none() {
                s.playlist.push(episode.clone());
                sort_by_episode_number(&mut s.playlist);
            }
            s.current_episode = Some(episode);
            s.current_time = 0.0;
            s.duration = 0.0;
            s.is_playing = true;
            s.is_buffering = false;
            s.is_unavailable = false;
            s.episode_generation = s.episode_generation.wrapping_add(1);
            true
        });
    }

    /// Clear playing/time/duration/buffering after an unrecoverable error
    pub fn reset(&mut self) {
        self.update(|s| {
            let changed = s.is_playing || s.current_time != 0.0 || s.duration != 0.0 || s.is_buffering;
            s.is_playing = false;
            s.current_time = 0.0;
            s.duration = 0.0;
            s.is_buffering = false;
            changed
        });
    }
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Assign and report whether the value changed
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(id: &str, number: u32) -> EpisodeRef {
        EpisodeRef {
            id: id.to_string(),
            title: format!("Episode {}", number),
            thumbnail: String::new(),
            stream_url: format!("https://example.com/{}.m3u8", id),
            duration: 2700.0,
            episode_number: number,
            series_id: "drama-1".to_string(),
        }
    }

    fn series() -> Series {
        Series {
            id: "drama-1".to_string(),
            title: "Drama".to_string(),
            episodes: vec![episode("ep-3", 3), episode("ep-1", 1), episode("ep-2", 2)],
        }
    }

    #[test]
    fn test_initial_state() {
        let store = PlayerStore::new();
        let s = store.snapshot();
        assert!(!s.is_playing);
        assert_eq!(s.volume, 1.0);
        assert_eq!(s.playback_rate, 1.0);
        assert!(s.show_controls);
        assert!(s.current_episode.is_none());
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut store = PlayerStore::new();

        store.set_volume(0.5);
        assert_eq!(store.snapshot().volume, 0.5);

        store.set_volume(1.5);
        assert_eq!(store.snapshot().volume, 1.0);

        store.set_volume(-0.5);
        assert_eq!(store.snapshot().volume, 0.0);

        store.set_volume(f64::NAN);
        assert_eq!(store.snapshot().volume, 0.0);
    }

    #[test]
    fn test_playback_rate_restricted_to_offered_set() {
        let mut store = PlayerStore::new();

        store.set_playback_rate(1.75);
        assert_eq!(store.snapshot().playback_rate, 1.75);

        store.set_playback_rate(1.1);
        assert_eq!(store.snapshot().playback_rate, 1.0);

        store.set_playback_rate(10.0);
        assert_eq!(store.snapshot().playback_rate, 2.0);
    }

    #[test]
    fn test_current_time_never_exceeds_known_duration() {
        let mut store = PlayerStore::new();

        // Unknown duration: only clamps from below
        store.set_current_time(5000.0);
        assert_eq!(store.current_time(), 5000.0);

        store.set_duration(2700.0);
        assert_eq!(store.current_time(), 2700.0);

        store.set_current_time(-3.0);
        assert_eq!(store.current_time(), 0.0);

        store.set_duration(f64::NAN);
        assert_eq!(store.snapshot().duration, 2700.0);
    }

    #[test]
    fn test_load_series_sorts_and_keeps_current_episode() {
        let mut store = PlayerStore::new();
        store.select_episode(episode("ep-2", 2));
        store.load_series(&series());

        let s = store.snapshot();
        let ids: Vec<_> = s.playlist.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ep-1", "ep-2", "ep-3"]);
        assert_eq!(s.current_episode_id(), Some("ep-2"));
        assert_eq!(s.current_series.as_ref().map(|c| c.id.as_str()), Some("drama-1"));
    }

    #[test]
    fn test_select_episode_resets_time_and_autoplays() {
        let mut store = PlayerStore::new();
        store.load_series(&series());
        store.select_episode(episode("ep-1", 1));
        store.set_duration(2700.0);
        store.set_current_time(1200.0);
        store.set_playing(false);

        store.select_episode(episode("ep-2", 2));

        let s = store.snapshot();
        assert_eq!(s.current_episode_id(), Some("ep-2"));
        assert_eq!(s.current_time, 0.0);
        assert!(s.is_playing);
        assert_eq!(s.episode_generation, 2);
        assert_eq!(s.playlist.len(), 3);
    }

    #[test]
    fn test_select_episode_outside_playlist_is_inserted_sorted() {
        let mut store = PlayerStore::new();
        store.load_series(&series());
        store.select_episode(episode("special", 0));

        let s = store.snapshot();
        assert_eq!(s.playlist.first().map(|e| e.id.as_str()), Some("special"));
        assert_eq!(s.next_episode().map(|e| e.id.as_str()), Some("ep-1"));
    }

    #[test]
    fn test_reset_clears_playback_fields_only() {
        let mut store = PlayerStore::new();
        store.select_episode(episode("ep-1", 1));
        store.set_duration(2700.0);
        store.set_current_time(10.0);
        store.set_buffering(true);
        store.set_volume(0.4);

        store.reset();

        let s = store.snapshot();
        assert!(!s.is_playing);
        assert!(!s.is_buffering);
        assert_eq!(s.current_time, 0.0);
        assert_eq!(s.duration, 0.0);
        assert_eq!(s.volume, 0.4);
        assert_eq!(s.current_episode_id(), Some("ep-1"));
    }

    #[tokio::test]
    async fn test_subscribers_only_notified_on_change() {
        let mut store = PlayerStore::new();
        let mut rx = store.subscribe();

        store.set_playing(false); // unchanged
        assert!(!rx.has_changed().unwrap());

        store.set_playing(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_playing);
    }

    #[test]
    fn test_clamp_position() {
        assert_eq!(clamp_position(-50.0, 2700.0), 0.0);
        assert_eq!(clamp_position(5000.0, 2700.0), 2700.0);
        assert_eq!(clamp_position(100.0, 2700.0), 100.0);
        assert_eq!(clamp_position(100.0, 0.0), 100.0);
        assert_eq!(clamp_position(f64::NAN, 2700.0), 0.0);
    }
}
