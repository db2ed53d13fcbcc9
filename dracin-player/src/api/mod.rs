//! Collaborator contracts
//!
//! The player consumes two narrow backend contracts: catalog lookup (once
//! per watch view) and progress persistence (continuously, best effort).
//! `http` implements them against the Dracin web backend, `memory` in
//! process; `progress_worker` executes the sync engine's requests.

pub mod http;
pub mod memory;
pub mod progress_worker;

pub use http::BackendClient;
pub use memory::InMemoryBackend;
pub use progress_worker::{ProgressWorker, ResumeLookup};

use crate::error::Result;
use crate::playback::progress_sync::PositionReport;
use async_trait::async_trait;
use dracin_common::{EpisodeRef, Series};

/// Episode and series lookup
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Episode metadata by ID
    async fn episode(&self, episode_id: &str) -> Result<EpisodeRef>;

    /// Series with all of its episodes
    async fn series(&self, series_id: &str) -> Result<Series>;
}

/// Watch-position persistence
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// Idempotent upsert of a position
    async fn record_position(&self, report: &PositionReport) -> Result<()>;

    /// Stored position for resume; `None` when nothing (or only a completed
    /// watch) is stored
    async fn last_position(&self, episode_id: &str) -> Result<Option<f64>>;
}
