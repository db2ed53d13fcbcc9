//! In-memory backend
//!
//! Serves a fixed catalog and keeps progress in process. Backs the harness's
//! offline mode and the runtime tests, which use its call counters and
//! failure switches.

use crate::api::{CatalogApi, ProgressApi};
use crate::error::{Error, Result};
use crate::playback::progress_sync::PositionReport;
use async_trait::async_trait;
use dracin_common::catalog::ProgressRecord;
use dracin_common::{EpisodeRef, Series};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Series served by offline mode
pub const DEMO_SERIES_ID: &str = "hidden-love";

/// Catalog and progress store held in memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    series: HashMap<String, Series>,
    progress: RwLock<HashMap<String, ProgressRecord>>,
    recorded: RwLock<Vec<PositionReport>>,
    latency: Option<Duration>,
    fail_records: AtomicBool,
    fail_lookups: AtomicBool,
    record_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new(series: impl IntoIterator<Item = Series>) -> Self {
        Self {
            series: series.into_iter().map(|s| (s.id.clone(), s)).collect(),
            ..Self::default()
        }
    }

    /// Backend serving the demo series
    pub fn demo() -> Self {
        Self::new([demo_series()])
    }

    /// Delay every progress call (catalog calls answer immediately)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a stored position
    pub async fn set_position(&self, episode_id: &str, position: f64) {
        let drama_id = self
            .find_episode(episode_id)
            .map(|e| e.series_id)
            .unwrap_or_default();
        self.progress.write().await.insert(
            episode_id.to_string(),
            ProgressRecord {
                episode_id: episode_id.to_string(),
                drama_id,
                current_time: position,
                duration: 0.0,
                completed: false,
                updated_at: Some(chrono::Utc::now()),
            },
        );
    }

    /// Stored record for an episode
    pub async fn progress_for(&self, episode_id: &str) -> Option<ProgressRecord> {
        self.progress.read().await.get(episode_id).cloned()
    }

    /// Every successfully recorded report, oldest first
    pub async fn recorded(&self) -> Vec<PositionReport> {
        self.recorded.read().await.clone()
    }

    /// Make `record_position` fail until switched back
    pub fn fail_records(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Make `last_position` fail until switched back
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// `record_position` calls, including failed ones
    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    /// `last_position` calls, including failed ones
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    fn find_episode(&self, episode_id: &str) -> Option<EpisodeRef> {
        self.series
            .values()
            .flat_map(|s| s.episodes.iter())
            .find(|e| e.id == episode_id)
            .cloned()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CatalogApi for InMemoryBackend {
    async fn episode(&self, episode_id: &str) -> Result<EpisodeRef> {
        self.find_episode(episode_id)
            .ok_or_else(|| Error::NotFound(format!("Episode {}", episode_id)))
    }

    async fn series(&self, series_id: &str) -> Result<Series> {
        self.series
            .get(series_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Series {}", series_id)))
    }
}

#[async_trait]
impl ProgressApi for InMemoryBackend {
    async fn record_position(&self, report: &PositionReport) -> Result<()> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "progress store unavailable".to_string(),
            });
        }

        debug!(episode_id = %report.episode_id, position = report.position, "Stored progress");
        let completed = report.completed
            || (report.duration > 0.0 && report.position / report.duration >= 0.9);
        self.progress.write().await.insert(
            report.episode_id.clone(),
            ProgressRecord {
                episode_id: report.episode_id.clone(),
                drama_id: report.series_id.clone(),
                current_time: report.position,
                duration: report.duration,
                completed,
                updated_at: Some(chrono::Utc::now()),
            },
        );
        self.recorded.write().await.push(report.clone());
        Ok(())
    }

    async fn last_position(&self, episode_id: &str) -> Result<Option<f64>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "progress store unavailable".to_string(),
            });
        }
        Ok(self
            .progress
            .read()
            .await
            .get(episode_id)
            .filter(|r| !r.completed && r.current_time > 0.0)
            .map(|r| r.current_time))
    }
}

/// Ten 45-minute episodes
pub fn demo_series() -> Series {
    const TITLES: [&str; 10] = [
        "The First Meeting",
        "Brother's Best Friend",
        "Secret Glances",
        "Growing Up Waiting",
        "College Reunion",
        "Hidden No More",
        "Confessions",
        "Love Acknowledged",
        "Meeting the Family",
        "Our Happy Ending",
    ];

    let episodes = TITLES
        .iter()
        .zip(1u32..)
        .map(|(title, number)| EpisodeRef {
            id: format!("{}-ep{}", DEMO_SERIES_ID, number),
            title: title.to_string(),
            thumbnail: format!("https://picsum.photos/seed/hiddenlove-ep{}/300/180", number),
            stream_url: "https://storage.googleapis.com/gtv-videos-bucket/sample/Sintel.mp4"
                .to_string(),
            duration: 2700.0,
            episode_number: number,
            series_id: DEMO_SERIES_ID.to_string(),
        })
        .collect();

    Series {
        id: DEMO_SERIES_ID.to_string(),
        title: "Hidden Love".to_string(),
        episodes,
    }
}
