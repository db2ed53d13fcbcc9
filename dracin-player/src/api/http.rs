//! HTTP client for the Dracin web backend
//!
//! Routes (relative to the configured base URL):
//! - `GET  /api/episodes/{id}`: episode metadata
//! - `GET  /api/dramas/{id}`: series with its episodes
//! - `GET  /api/user/progress?limit=20`: in-progress records, newest first
//! - `POST /api/user/progress`: position upsert
//!
//! Every response is wrapped in `{ success, data, error, code }`.
//!
//! The backend has no per-episode progress route and caps the listing at 20
//! records, so resume lookups only see the 20 most recently updated
//! in-progress episodes. Anything older starts from the beginning.

use crate::api::{CatalogApi, ProgressApi};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::playback::progress_sync::PositionReport;
use async_trait::async_trait;
use dracin_common::catalog::{ApiEnvelope, ProgressRecord};
use dracin_common::{EpisodeRef, Series};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

const USER_AGENT: &str = concat!("dracin-player/", env!("CARGO_PKG_VERSION"));

/// Largest page the progress listing returns; the backend clamps to this
const PROGRESS_PAGE_LIMIT: u32 = 20;

fn progress_listing_path() -> String {
    format!("/user/progress?limit={}", PROGRESS_PAGE_LIMIT)
}

/// Backend API client
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        trace!(url = %url, "GET");
        let response = self.http_client.get(&url).send().await?;
        decode_response(response).await
    }
}

/// Unwrap the response envelope
///
/// Non-success statuses and `success: false` bodies become `Error::Api`
/// (or `Error::NotFound` for 404), carrying the backend's error message
/// when it sent one.
async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
    let status = response.status();
    let body = response.text().await?;
    decode_body(status, &body)
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<Option<T>> {
    let envelope = serde_json::from_str::<ApiEnvelope<T>>(body);

    match envelope {
        Ok(envelope) if status.is_success() && envelope.success => Ok(envelope.data),
        Ok(envelope) => {
            let message = envelope
                .error
                .unwrap_or_else(|| format!("request failed with status {}", status));
            Err(status_error(status, message))
        }
        Err(e) if status.is_success() => Err(Error::Api {
            status: status.as_u16(),
            message: format!("Malformed response body: {}", e),
        }),
        Err(_) => Err(status_error(
            status,
            format!("request failed with status {}", status),
        )),
    }
}

fn status_error(status: StatusCode, message: String) -> Error {
    if status == StatusCode::NOT_FOUND {
        Error::NotFound(message)
    } else {
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn missing_data(what: &str) -> Error {
    Error::Api {
        status: StatusCode::OK.as_u16(),
        message: format!("Response carried no {}", what),
    }
}

#[async_trait]
impl CatalogApi for BackendClient {
    async fn episode(&self, episode_id: &str) -> Result<EpisodeRef> {
        debug!(episode_id, "Fetching episode");
        self.get::<EpisodeRef>(&format!("/episodes/{}", episode_id))
            .await?
            .ok_or_else(|| missing_data("episode"))
    }

    async fn series(&self, series_id: &str) -> Result<Series> {
        debug!(series_id, "Fetching series");
        self.get::<Series>(&format!("/dramas/{}", series_id))
            .await?
            .ok_or_else(|| missing_data("series"))
    }
}

#[async_trait]
impl ProgressApi for BackendClient {
    async fn record_position(&self, report: &PositionReport) -> Result<()> {
        let url = self.url("/user/progress");
        trace!(url = %url, episode_id = %report.episode_id, "POST");
        let response = self
            .http_client
            .post(&url)
            .json(&report.to_update())
            .send()
            .await?;
        decode_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    /// Scans the newest page of in-progress records only
    async fn last_position(&self, episode_id: &str) -> Result<Option<f64>> {
        let records = self
            .get::<Vec<ProgressRecord>>(&progress_listing_path())
            .await?
            .unwrap_or_default();
        let position = position_for(&records, episode_id);
        if position.is_none() {
            debug!(
                episode_id,
                scanned = records.len(),
                limit = PROGRESS_PAGE_LIMIT,
                "No resume position in progress listing"
            );
        }
        Ok(position)
    }
}

/// Resume position for an episode from a progress listing
fn position_for(records: &[ProgressRecord], episode_id: &str) -> Option<f64> {
    records
        .iter()
        .find(|r| r.episode_id == episode_id && !r.completed)
        .map(|r| r.current_time)
        .filter(|t| t.is_finite() && *t > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(episode_id: &str, current_time: f64, completed: bool) -> ProgressRecord {
        ProgressRecord {
            episode_id: episode_id.to_string(),
            drama_id: "drama-1".to_string(),
            current_time,
            duration: 2700.0,
            completed,
            updated_at: None,
        }
    }

    #[test]
    fn test_client_creation() {
        let client = BackendClient::new(&BackendConfig {
            base_url: "http://localhost:3000/".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/episodes/ep-1"), "http://localhost:3000/api/episodes/ep-1");
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = r#"{"success":true,"data":{"id":"ep-1","title":"Pilot","videoUrl":"https://x/1.mp4","duration":2700,"episodeNumber":1,"dramaId":"drama-1"}}"#;
        let episode: EpisodeRef = decode_body(StatusCode::OK, body).unwrap().unwrap();
        assert_eq!(episode.id, "ep-1");
        assert_eq!(episode.stream_url, "https://x/1.mp4");
        assert_eq!(episode.series_id, "drama-1");
    }

    #[test]
    fn test_decode_success_without_data() {
        let result = decode_body::<EpisodeRef>(StatusCode::OK, r#"{"success":true}"#);
        assert!(matches!(result, Ok(None)));

        let records = decode_body::<Vec<ProgressRecord>>(StatusCode::OK, r#"{"success":true}"#)
            .unwrap()
            .unwrap_or_default();
        assert!(records.is_empty());
    }

    #[test]
    fn test_decode_error_envelope() {
        let body = r#"{"success":false,"error":"Episode not found","code":"NOT_FOUND"}"#;
        let result = decode_body::<EpisodeRef>(StatusCode::NOT_FOUND, body);
        assert!(matches!(result, Err(Error::NotFound(msg)) if msg == "Episode not found"));

        let body = r#"{"success":false,"error":"Unauthorized","code":"UNAUTHORIZED"}"#;
        let result = decode_body::<serde_json::Value>(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(result, Err(Error::Api { status: 401, .. })));
    }

    #[test]
    fn test_decode_non_json_failure() {
        let result = decode_body::<serde_json::Value>(StatusCode::BAD_GATEWAY, "<html>");
        assert!(matches!(result, Err(Error::Api { status: 502, .. })));

        let result = decode_body::<serde_json::Value>(StatusCode::OK, "<html>");
        assert!(matches!(result, Err(Error::Api { status: 200, .. })));
    }

    #[test]
    fn test_position_for() {
        let records = vec![
            record("ep-1", 42.0, false),
            record("ep-2", 2700.0, true),
            record("ep-3", 0.0, false),
        ];
        assert_eq!(position_for(&records, "ep-1"), Some(42.0));
        assert_eq!(position_for(&records, "ep-2"), None);
        assert_eq!(position_for(&records, "ep-3"), None);
        assert_eq!(position_for(&records, "ep-9"), None);
    }

    #[test]
    fn test_resume_lookup_limited_to_one_page() {
        assert_eq!(progress_listing_path(), "/user/progress?limit=20");

        // Episode 21 fell off the newest page, so it has no resume point
        let page: Vec<_> = (1..=PROGRESS_PAGE_LIMIT)
            .map(|n| record(&format!("ep-{}", n), 60.0, false))
            .collect();
        assert_eq!(page.len(), 20);
        assert_eq!(position_for(&page, "ep-20"), Some(60.0));
        assert_eq!(position_for(&page, "ep-21"), None);
    }
}
