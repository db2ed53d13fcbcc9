//! Player runtime
//!
//! Drives one [`PlayerSession`] from a single tokio task. The task owns the
//! session outright and multiplexes four sources:
//! - commands from [`PlayerHandle`]s
//! - media element callbacks
//! - resume lookups completed by the progress worker
//! - the session's next timer deadline
//!
//! Each source is handled to completion before the next is polled, which
//! gives the session the one-event-at-a-time model it relies on. Virtual time
//! is the tokio clock elapsed since the runtime opened, so paused-time tests
//! drive it deterministically.

use crate::api::{CatalogApi, ProgressApi, ProgressWorker, ResumeLookup};
use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use crate::playback::clock::{MediaElement, MediaEvent};
use crate::playback::input::{Focus, PlayerCommand};
use crate::playback::progress_sync::ProgressRequest;
use crate::playback::session::PlayerSession;
use crate::state::PlaybackSession;
use dracin_common::events::{EventBus, PlayerEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Input accepted by the runtime task
#[derive(Debug)]
pub enum PlayerInput {
    Command(PlayerCommand),
    Key { key: String, focus: Focus },
    Tap { x: f64, width: f64 },
    /// Tear down; the sender is notified once the final flush is done
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable control surface for a running player
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<PlayerInput>,
    state: watch::Receiver<PlaybackSession>,
    events: EventBus,
}

impl PlayerHandle {
    fn send(&self, input: PlayerInput) -> Result<()> {
        self.tx
            .send(input)
            .map_err(|_| Error::InvalidState("Player is closed".to_string()))
    }

    pub fn command(&self, command: PlayerCommand) -> Result<()> {
        self.send(PlayerInput::Command(command))
    }

    pub fn play(&self) -> Result<()> {
        self.command(PlayerCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.command(PlayerCommand::Pause)
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.command(PlayerCommand::TogglePlay)
    }

    pub fn seek_to(&self, seconds: f64) -> Result<()> {
        self.command(PlayerCommand::SeekTo(seconds))
    }

    pub fn seek_by(&self, delta: f64) -> Result<()> {
        self.command(PlayerCommand::SeekBy(delta))
    }

    pub fn toggle_mute(&self) -> Result<()> {
        self.command(PlayerCommand::ToggleMute)
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.command(PlayerCommand::SetVolume(volume))
    }

    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.command(PlayerCommand::SetPlaybackRate(rate))
    }

    pub fn toggle_fullscreen(&self) -> Result<()> {
        self.command(PlayerCommand::ToggleFullscreen)
    }

    pub fn toggle_picture_in_picture(&self) -> Result<()> {
        self.command(PlayerCommand::TogglePictureInPicture)
    }

    pub fn select_episode(&self, episode_id: &str) -> Result<()> {
        self.command(PlayerCommand::SelectEpisode(episode_id.to_string()))
    }

    pub fn play_next(&self) -> Result<()> {
        self.command(PlayerCommand::PlayNext)
    }

    pub fn cancel_auto_advance(&self) -> Result<()> {
        self.command(PlayerCommand::CancelAutoAdvance)
    }

    pub fn set_sidebar_open(&self, open: bool) -> Result<()> {
        self.command(PlayerCommand::SetSidebarOpen(open))
    }

    /// Keyboard shortcut (DOM key name)
    pub fn key(&self, key: &str, focus: Focus) -> Result<()> {
        self.send(PlayerInput::Key {
            key: key.to_string(),
            focus,
        })
    }

    /// Pointer tap on the player surface
    pub fn tap(&self, x: f64, width: f64) -> Result<()> {
        self.send(PlayerInput::Tap { x, width })
    }

    /// ID of the watch session, as it appears in logs
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Latest state
    pub fn state(&self) -> PlaybackSession {
        self.state.borrow().clone()
    }

    /// State change stream
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackSession> {
        self.state.clone()
    }

    /// Player event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

/// A running player: its task plus a handle to it
pub struct PlayerRuntime {
    handle: PlayerHandle,
    task: JoinHandle<()>,
}

impl PlayerRuntime {
    /// Open a watch session for an episode
    ///
    /// Looks up the episode and its series, then starts playing the episode
    /// with the series as playlist. Catalog failures are returned; nothing is
    /// spawned in that case.
    pub async fn open(
        settings: PlayerSettings,
        catalog: Arc<dyn CatalogApi>,
        progress: Arc<dyn ProgressApi>,
        media: Box<dyn MediaElement>,
        episode_id: &str,
    ) -> Result<Self> {
        settings.validate()?;

        let episode = catalog.episode(episode_id).await?;
        let series = catalog.series(&episode.series_id).await?;
        let session_id = Uuid::new_v4();
        info!(
            %session_id,
            episode_id = %episode.id,
            series = %series.title,
            "Opening watch session"
        );

        let events = EventBus::new(settings.event_capacity);
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<ProgressRequest>();
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();
        let worker = ProgressWorker::new(progress, events.clone(), resume_tx).spawn(outbox_rx);

        let mut session = PlayerSession::new(settings, media, outbox_tx, events.clone());
        let media_rx = session
            .take_media_events()
            .ok_or_else(|| Error::InvalidState("Media events already taken".to_string()))?;
        session.load_series(&series);
        session.select_episode(episode);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = PlayerHandle {
            session_id,
            tx,
            state: session.subscribe(),
            events,
        };
        let span = info_span!("player", %session_id);
        let task = tokio::spawn(run(session, rx, media_rx, resume_rx, worker).instrument(span));

        Ok(Self { handle, task })
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    /// Tear the player down and wait for the final progress flush
    pub async fn shutdown(self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.handle.send(PlayerInput::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        self.task
            .await
            .map_err(|e| Error::InvalidState(format!("Player task failed: {}", e)))
    }
}

async fn run(
    mut session: PlayerSession,
    mut inputs: mpsc::UnboundedReceiver<PlayerInput>,
    mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
    mut resume_lookups: mpsc::UnboundedReceiver<ResumeLookup>,
    worker: JoinHandle<()>,
) {
    let started = Instant::now();
    let mut shutdown_ack = None;
    debug!("Player runtime started");

    loop {
        let deadline = session.next_deadline().map(|d| started + d);

        // Media callbacks first, so a time update queued before a command or
        // resume lookup is never applied after it
        tokio::select! {
            biased;

            Some(event) = media_events.recv() => {
                session.advance_to(started.elapsed());
                session.handle_media_event(event);
            }
            Some(lookup) = resume_lookups.recv() => {
                session.advance_to(started.elapsed());
                session.handle_resume(&lookup.episode_id, lookup.generation, lookup.position);
            }
            input = inputs.recv() => {
                session.advance_to(started.elapsed());
                match input {
                    Some(PlayerInput::Command(command)) => session.execute(command),
                    Some(PlayerInput::Key { key, focus }) => session.handle_key(&key, focus),
                    Some(PlayerInput::Tap { x, width }) => session.handle_tap(x, width),
                    Some(PlayerInput::Shutdown(ack)) => {
                        shutdown_ack = Some(ack);
                        break;
                    }
                    None => break,
                }
            }
            _ = sleep_until(deadline) => {
                session.advance_to(started.elapsed());
            }
        }
    }

    session.advance_to(started.elapsed());
    session.teardown();
    // Dropping the session closes the progress outbox; the worker drains
    drop(session);
    if let Err(e) = worker.await {
        warn!("Progress worker failed: {}", e);
    }

    if let Some(ack) = shutdown_ack {
        let _ = ack.send(());
    }
    debug!("Player runtime stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
