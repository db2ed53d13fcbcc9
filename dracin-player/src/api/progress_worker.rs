//! Progress worker
//!
//! Executes the sync engine's requests against the progress backend. Each
//! request runs as its own task, so a slow call never delays the next tick's
//! call and never blocks the player; calls are idempotent upserts, so
//! overlapping ones are harmless. Failures are logged and dropped: the next
//! periodic tick is the retry.
//!
//! When the request channel closes (session torn down) the worker finishes
//! every call still in flight before exiting, so the final flush is not lost.

use crate::api::ProgressApi;
use crate::playback::progress_sync::ProgressRequest;
use dracin_common::events::{EventBus, PlayerEvent};
use dracin_common::time::now;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Result of a resume lookup, handed back to the session
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeLookup {
    pub episode_id: String,
    /// Episode load that requested the lookup
    pub generation: u64,
    pub position: Option<f64>,
}

/// Background executor for progress requests
pub struct ProgressWorker {
    api: Arc<dyn ProgressApi>,
    events: EventBus,
    resume_tx: mpsc::UnboundedSender<ResumeLookup>,
}

impl ProgressWorker {
    pub fn new(
        api: Arc<dyn ProgressApi>,
        events: EventBus,
        resume_tx: mpsc::UnboundedSender<ResumeLookup>,
    ) -> Self {
        Self {
            api,
            events,
            resume_tx,
        }
    }

    /// Run until `requests` closes and every in-flight call has finished
    pub fn spawn(self, requests: mpsc::UnboundedReceiver<ProgressRequest>) -> JoinHandle<()> {
        tokio::spawn(self.run(requests))
    }

    async fn run(self, mut requests: mpsc::UnboundedReceiver<ProgressRequest>) {
        debug!("Progress worker started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        in_flight.spawn(handle_request(
                            Arc::clone(&self.api),
                            self.events.clone(),
                            self.resume_tx.clone(),
                            request,
                        ));
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Progress task aborted: {}", e);
                    }
                }
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            debug!(pending, "Waiting for in-flight progress calls");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!("Progress task aborted: {}", e);
            }
        }
        info!("Progress worker stopped");
    }
}

async fn handle_request(
    api: Arc<dyn ProgressApi>,
    events: EventBus,
    resume_tx: mpsc::UnboundedSender<ResumeLookup>,
    request: ProgressRequest,
) {
    match request {
        ProgressRequest::Record(report) => match api.record_position(&report).await {
            Ok(()) => {
                debug!(
                    episode_id = %report.episode_id,
                    position = report.position,
                    trigger = %report.trigger,
                    "Progress saved"
                );
                events.emit_lossy(PlayerEvent::ProgressSynced {
                    episode_id: report.episode_id,
                    position: report.position,
                    trigger: report.trigger,
                    timestamp: now(),
                });
            }
            Err(e) => {
                warn!(
                    episode_id = %report.episode_id,
                    position = report.position,
                    "Failed to sync progress: {}", e
                );
                events.emit_lossy(PlayerEvent::ProgressSyncFailed {
                    episode_id: report.episode_id,
                    position: report.position,
                    message: e.to_string(),
                    timestamp: now(),
                });
            }
        },
        ProgressRequest::Fetch {
            episode_id,
            generation,
        } => match api.last_position(&episode_id).await {
            Ok(position) => {
                debug!(episode_id = %episode_id, ?position, "Resume lookup complete");
                let _ = resume_tx.send(ResumeLookup {
                    episode_id,
                    generation,
                    position,
                });
            }
            Err(e) => {
                warn!(episode_id = %episode_id, "Failed to load last position: {}", e);
            }
        },
    }
}
