//! Test helpers for dracin-player integration tests
//!
//! Provides:
//! - catalog builders (`episode`, `series`)
//! - TestPlayer: a PlayerSession wired to a SimulatedMedia and in-test
//!   channels, driven by explicit virtual time

#![allow(dead_code)]

use dracin_common::events::{EventBus, PlayerEvent};
use dracin_common::{EpisodeRef, Series};
use dracin_player::playback::clock::MediaEvent;
use dracin_player::playback::input::PlayerCommand;
use dracin_player::playback::progress_sync::{PositionReport, ProgressRequest};
use dracin_player::{PlaybackSession, PlayerSession, PlayerSettings, SimulatedMedia};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const SERIES_ID: &str = "drama-1";

/// 45-minute episode of the test series
pub fn episode(number: u32) -> EpisodeRef {
    EpisodeRef {
        id: format!("ep-{}", number),
        title: format!("Episode {}", number),
        thumbnail: format!("https://img.example.com/ep-{}.jpg", number),
        stream_url: format!("https://cdn.example.com/ep-{}.m3u8", number),
        duration: 2700.0,
        episode_number: number,
        series_id: SERIES_ID.to_string(),
    }
}

/// Series with episodes numbered 1..=count, listed out of order
pub fn series(count: u32) -> Series {
    let mut episodes: Vec<_> = (1..=count).map(episode).collect();
    episodes.reverse();
    Series {
        id: SERIES_ID.to_string(),
        title: "Test Drama".to_string(),
        episodes,
    }
}

/// PlayerSession under test
pub struct TestPlayer {
    pub session: PlayerSession,
    pub media: SimulatedMedia,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    outbox: mpsc::UnboundedReceiver<ProgressRequest>,
    /// Every progress request issued so far, oldest first
    pub requests: Vec<ProgressRequest>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

impl TestPlayer {
    pub fn new() -> Self {
        Self::with_settings(PlayerSettings::default())
    }

    pub fn with_settings(settings: PlayerSettings) -> Self {
        let media = SimulatedMedia::new();
        let bus = EventBus::new(1024);
        let events = bus.subscribe();
        let (tx, outbox) = mpsc::unbounded_channel();
        let mut session = PlayerSession::new(settings, Box::new(media.clone()), tx, bus);
        let media_events = session.take_media_events().expect("media events");
        Self {
            session,
            media,
            media_events,
            outbox,
            requests: Vec::new(),
            events,
        }
    }

    /// Session with a series loaded and episode `number` selected
    pub fn on_episode(count: u32, number: u32) -> Self {
        let mut player = Self::new();
        player.session.load_series(&series(count));
        player.select(number);
        player
    }

    pub fn select(&mut self, number: u32) {
        self.session.select_episode(episode(number));
        self.pump();
    }

    /// Run a command and deliver the media element's echo, as the runtime
    /// does before it reads the next input
    pub fn execute(&mut self, command: PlayerCommand) {
        self.session.execute(command);
        self.pump();
    }

    /// Deliver queued media callbacks to the session
    pub fn pump(&mut self) {
        while let Ok(event) = self.media_events.try_recv() {
            self.session.handle_media_event(event);
        }
    }

    /// Advance virtual time, delivering media callbacks afterwards
    pub fn advance_secs(&mut self, secs: f64) {
        self.session.advance(Duration::from_secs_f64(secs));
        self.pump();
    }

    pub fn state(&self) -> PlaybackSession {
        self.session.state()
    }

    pub fn current_episode_id(&self) -> Option<String> {
        self.state().current_episode.map(|e| e.id)
    }

    /// Collect requests issued since the last call
    pub fn collect_requests(&mut self) {
        while let Ok(request) = self.outbox.try_recv() {
            self.requests.push(request);
        }
    }

    /// All position reports issued so far
    pub fn records(&mut self) -> Vec<PositionReport> {
        self.collect_requests();
        self.requests
            .iter()
            .filter_map(|r| match r {
                ProgressRequest::Record(report) => Some(report.clone()),
                ProgressRequest::Fetch { .. } => None,
            })
            .collect()
    }

    /// All resume lookups issued so far, as (episode ID, generation)
    pub fn fetches(&mut self) -> Vec<(String, u64)> {
        self.collect_requests();
        self.requests
            .iter()
            .filter_map(|r| match r {
                ProgressRequest::Fetch {
                    episode_id,
                    generation,
                } => Some((episode_id.clone(), *generation)),
                ProgressRequest::Record(_) => None,
            })
            .collect()
    }

    /// Answer the most recent resume lookup
    pub fn answer_resume(&mut self, position: Option<f64>) {
        let (episode_id, generation) = self.fetches().last().cloned().expect("no resume lookup");
        self.session.handle_resume(&episode_id, generation, position);
        self.pump();
    }

    /// Player events emitted so far that have not been read
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
