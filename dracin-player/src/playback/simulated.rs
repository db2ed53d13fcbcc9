//! In-process media element with a steppable timeline
//!
//! Used by the headless harness (stepped from a real-time ticker) and by
//! tests (stepped explicitly). Clones share one timeline, so a caller can
//! hand one clone to the player and keep another to drive and inspect it.

use crate::error::{Error, Result};
use crate::playback::clock::{MediaElement, MediaEvent};
use dracin_common::EpisodeRef;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug)]
struct Inner {
    sink: Option<mpsc::UnboundedSender<MediaEvent>>,
    episode_id: Option<String>,
    position: f64,
    duration: f64,
    paused: bool,
    ended: bool,
    buffering: bool,
    volume: f64,
    rate: f64,
    fullscreen: bool,
    picture_in_picture: bool,
    pip_supported: bool,
    autoplay_blocked: bool,
    fullscreen_denied: bool,
    loads: usize,
}

impl Inner {
    fn emit(&self, event: MediaEvent) {
        if let Some(sink) = &self.sink {
            let _ = sink.send(event);
        }
    }
}

/// Simulated media element
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedMedia {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sink: None,
                episode_id: None,
                position: 0.0,
                duration: 0.0,
                paused: true,
                ended: false,
                buffering: false,
                volume: 1.0,
                rate: 1.0,
                fullscreen: false,
                picture_in_picture: false,
                pip_supported: true,
                autoplay_blocked: false,
                fullscreen_denied: false,
                loads: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Advance the timeline by wall-clock `elapsed`
    ///
    /// Emits a time update, and `Ended` when the end is reached.
    pub fn step(&self, elapsed: Duration) {
        let mut inner = self.lock();
        if inner.paused || inner.buffering || inner.episode_id.is_none() {
            return;
        }
        inner.position += elapsed.as_secs_f64() * inner.rate;
        if inner.duration > 0.0 && inner.position >= inner.duration {
            inner.position = inner.duration;
            inner.paused = true;
            inner.ended = true;
            inner.emit(MediaEvent::TimeUpdate(inner.position));
            inner.emit(MediaEvent::Ended);
        } else {
            inner.emit(MediaEvent::TimeUpdate(inner.position));
        }
    }

    /// Jump to the end and finish playback
    pub fn finish(&self) {
        let mut inner = self.lock();
        inner.position = inner.duration;
        inner.paused = true;
        inner.ended = true;
        inner.emit(MediaEvent::TimeUpdate(inner.position));
        inner.emit(MediaEvent::Ended);
    }

    /// Start or stop a network stall
    pub fn set_buffering(&self, buffering: bool) {
        let mut inner = self.lock();
        if inner.buffering == buffering {
            return;
        }
        inner.buffering = buffering;
        if buffering {
            inner.emit(MediaEvent::Waiting);
        } else if !inner.paused {
            inner.emit(MediaEvent::Playing);
        }
    }

    /// Fail with an unrecoverable load/decode error
    pub fn fail(&self, message: &str) {
        let mut inner = self.lock();
        inner.paused = true;
        inner.emit(MediaEvent::Error(message.to_string()));
    }

    /// Report a media duration other than the catalog's
    pub fn report_duration(&self, duration: f64) {
        let mut inner = self.lock();
        if duration.is_finite() && duration >= 0.0 {
            inner.duration = duration;
        }
        inner.emit(MediaEvent::DurationChange(duration));
    }

    pub fn block_autoplay(&self, blocked: bool) {
        self.lock().autoplay_blocked = blocked;
    }

    pub fn deny_fullscreen(&self, denied: bool) {
        self.lock().fullscreen_denied = denied;
    }

    pub fn set_picture_in_picture_supported(&self, supported: bool) {
        self.lock().pip_supported = supported;
    }

    /// Leave picture-in-picture from the runtime's own window controls
    pub fn close_picture_in_picture_window(&self) {
        let mut inner = self.lock();
        if inner.picture_in_picture {
            inner.picture_in_picture = false;
            inner.emit(MediaEvent::LeavePictureInPicture);
        }
    }

    pub fn position(&self) -> f64 {
        self.lock().position
    }

    pub fn duration(&self) -> f64 {
        self.lock().duration
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn volume(&self) -> f64 {
        self.lock().volume
    }

    pub fn playback_rate(&self) -> f64 {
        self.lock().rate
    }

    pub fn is_fullscreen(&self) -> bool {
        self.lock().fullscreen
    }

    pub fn is_picture_in_picture(&self) -> bool {
        self.lock().picture_in_picture
    }

    pub fn loaded_episode_id(&self) -> Option<String> {
        self.lock().episode_id.clone()
    }

    /// Number of `load` calls so far
    pub fn load_count(&self) -> usize {
        self.lock().loads
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().sink.is_some()
    }
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement for SimulatedMedia {
    fn subscribe(&mut self, sink: mpsc::UnboundedSender<MediaEvent>) {
        self.lock().sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.lock().sink = None;
    }

    fn load(&mut self, episode: &EpisodeRef) {
        let mut inner = self.lock();
        trace!(episode_id = %episode.id, "Loading stream {}", episode.stream_url);
        inner.episode_id = Some(episode.id.clone());
        inner.position = 0.0;
        inner.paused = true;
        inner.ended = false;
        inner.buffering = false;
        inner.loads += 1;
        inner.duration = if episode.duration.is_finite() && episode.duration > 0.0 {
            episode.duration
        } else {
            0.0
        };
        if inner.duration > 0.0 {
            inner.emit(MediaEvent::DurationChange(inner.duration));
        }
        inner.emit(MediaEvent::TimeUpdate(0.0));
    }

    fn play(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.autoplay_blocked {
            return Err(Error::Media(
                "play() rejected: user interaction required".to_string(),
            ));
        }
        if inner.episode_id.is_none() {
            return Err(Error::Media("no source loaded".to_string()));
        }
        if inner.ended {
            inner.ended = false;
            inner.position = 0.0;
            inner.emit(MediaEvent::TimeUpdate(0.0));
        }
        if inner.paused {
            inner.paused = false;
            if !inner.buffering {
                inner.emit(MediaEvent::Playing);
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut inner = self.lock();
        if !inner.paused {
            inner.paused = true;
            inner.emit(MediaEvent::Paused);
        }
    }

    fn current_time(&self) -> f64 {
        self.lock().position
    }

    fn set_current_time(&mut self, seconds: f64) {
        let mut inner = self.lock();
        let mut target = seconds.max(0.0);
        if inner.duration > 0.0 {
            target = target.min(inner.duration);
        }
        inner.position = target;
        if target < inner.duration {
            inner.ended = false;
        }
        inner.emit(MediaEvent::TimeUpdate(target));
    }

    fn set_volume(&mut self, volume: f64) {
        self.lock().volume = volume;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.lock().rate = rate;
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.fullscreen_denied {
            return Err(Error::Media("fullscreen permission denied".to_string()));
        }
        if !inner.fullscreen {
            inner.fullscreen = true;
            inner.emit(MediaEvent::FullscreenChange(true));
        }
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.fullscreen {
            inner.fullscreen = false;
            inner.emit(MediaEvent::FullscreenChange(false));
        }
        Ok(())
    }

    fn picture_in_picture_supported(&self) -> bool {
        self.lock().pip_supported
    }

    fn request_picture_in_picture(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if !inner.pip_supported {
            return Err(Error::Media("picture-in-picture unsupported".to_string()));
        }
        if !inner.picture_in_picture {
            inner.picture_in_picture = true;
            inner.emit(MediaEvent::EnterPictureInPicture);
        }
        Ok(())
    }

    fn exit_picture_in_picture(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.picture_in_picture {
            inner.picture_in_picture = false;
            inner.emit(MediaEvent::LeavePictureInPicture);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(duration: f64) -> EpisodeRef {
        EpisodeRef {
            id: "ep-1".to_string(),
            title: "Episode 1".to_string(),
            thumbnail: String::new(),
            stream_url: "https://example.com/ep-1.m3u8".to_string(),
            duration,
            episode_number: 1,
            series_id: "drama-1".to_string(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<MediaEvent>) -> Vec<MediaEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_step_advances_only_while_playing() {
        let mut media = SimulatedMedia::new();
        media.load(&episode(60.0));

        media.step(Duration::from_secs(5));
        assert_eq!(media.position(), 0.0);

        media.play().unwrap();
        media.step(Duration::from_secs(5));
        assert_eq!(media.position(), 5.0);

        media.set_playback_rate(2.0);
        media.step(Duration::from_secs(5));
        assert_eq!(media.position(), 15.0);
    }

    #[test]
    fn test_reaching_end_emits_ended() {
        let mut media = SimulatedMedia::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        media.subscribe(tx);
        media.load(&episode(10.0));
        media.play().unwrap();
        drain(&mut rx);

        media.step(Duration::from_secs(15));
        assert_eq!(
            drain(&mut rx),
            vec![MediaEvent::TimeUpdate(10.0), MediaEvent::Ended]
        );
        assert!(media.is_paused());
    }

    #[test]
    fn test_buffering_pauses_timeline() {
        let mut media = SimulatedMedia::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        media.subscribe(tx);
        media.load(&episode(60.0));
        media.play().unwrap();
        drain(&mut rx);

        media.set_buffering(true);
        media.step(Duration::from_secs(5));
        assert_eq!(media.position(), 0.0);

        media.set_buffering(false);
        assert_eq!(drain(&mut rx), vec![MediaEvent::Waiting, MediaEvent::Playing]);
    }

    #[test]
    fn test_unsubscribed_events_are_dropped() {
        let mut media = SimulatedMedia::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        media.subscribe(tx);
        media.unsubscribe();

        media.load(&episode(60.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_blocked_autoplay_rejects() {
        let mut media = SimulatedMedia::new();
        media.load(&episode(60.0));
        media.block_autoplay(true);
        assert!(matches!(media.play(), Err(Error::Media(_))));
        assert!(media.is_paused());
    }
}
