//! Catalog types shared between the player and the backend
//!
//! Field names follow the backend's JSON (camelCase). Episode metadata is
//! fetched at runtime and never stored by the player beyond one session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single playable episode of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Stream URL (older backend payloads call it `videoUrl`)
    #[serde(alias = "videoUrl")]
    pub stream_url: String,
    /// Duration in seconds as reported by the catalog (0 when unknown)
    #[serde(default)]
    pub duration: f64,
    pub episode_number: u32,
    /// Owning series ID
    #[serde(rename = "dramaId", alias = "seriesId")]
    pub series_id: String,
}

/// Series identity without its episode list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub id: String,
    pub title: String,
}

/// A series with its sibling episodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub episodes: Vec<EpisodeRef>,
}

impl Series {
    /// Episodes ordered by episode number ascending
    ///
    /// The sort is stable, so episodes sharing a number keep catalog order.
    pub fn sorted_episodes(&self) -> Vec<EpisodeRef> {
        let mut episodes = self.episodes.clone();
        sort_by_episode_number(&mut episodes);
        episodes
    }

    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// Sort a playlist in place by episode number ascending
pub fn sort_by_episode_number(episodes: &mut [EpisodeRef]) {
    episodes.sort_by_key(|ep| ep.episode_number);
}

/// Index of an episode within a playlist, matched by ID
pub fn position_in(playlist: &[EpisodeRef], episode_id: &str) -> Option<usize> {
    playlist.iter().position(|ep| ep.id == episode_id)
}

/// The playlist entry after `episode_id`, by playlist order
///
/// Episode numbers may have gaps, so this never does number arithmetic.
pub fn next_after<'a>(playlist: &'a [EpisodeRef], episode_id: &str) -> Option<&'a EpisodeRef> {
    position_in(playlist, episode_id).and_then(|idx| playlist.get(idx + 1))
}

/// Body of a progress upsert (`POST /api/user/progress`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub episode_id: String,
    pub drama_id: String,
    pub current_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Stored watch progress for one episode (`GET /api/user/progress`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub episode_id: String,
    #[serde(default)]
    pub drama_id: String,
    pub current_time: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Backend response envelope: `{ success, data?, error?, code? }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub code: Option<String>,
}
