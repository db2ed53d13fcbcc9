//! Input controller
//!
//! Translates keyboard shortcuts, pointer double-taps and control-bar clicks
//! into [`PlayerCommand`]s. The controller itself never touches the store or
//! the media element; the session executes the commands it produces.
//!
//! | Input      | Command                         |
//! |------------|---------------------------------|
//! | Space / K  | toggle play/pause               |
//! | ← / J      | seek −10s                       |
//! | → / L      | seek +10s                       |
//! | , / .      | seek −5s / +5s                  |
//! | ↑ / ↓      | volume +0.1 / −0.1              |
//! | M          | toggle mute                     |
//! | F          | toggle fullscreen               |
//! | P          | toggle picture-in-picture       |
//! | < / >      | playback rate one step down/up  |
//! | ?          | toggle shortcut help overlay    |

use crate::config::PlayerSettings;
use dracin_common::events::PlaybackRateStep;
use std::time::Duration;

/// Imperative player commands (control bar, keyboard, gestures, host)
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    TogglePlay,
    Play,
    Pause,
    /// Relative seek in seconds
    SeekBy(f64),
    /// Absolute seek in seconds (slider drag)
    SeekTo(f64),
    SetVolume(f64),
    AdjustVolume(f64),
    ToggleMute,
    SetPlaybackRate(f64),
    StepPlaybackRate(PlaybackRateStep),
    ToggleFullscreen,
    TogglePictureInPicture,
    ToggleShortcutHelp,
    /// Select an episode of the playlist by ID
    SelectEpisode(String),
    /// Skip to the next episode; during a countdown, advance immediately
    PlayNext,
    CancelAutoAdvance,
    SetSidebarOpen(bool),
    /// Pointer moved over the player surface
    PointerMoved,
    /// Pointer left the player surface
    PointerLeft,
}

/// Where keyboard focus currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Player,
    /// A text input field; shortcuts are suppressed
    TextField,
}

/// Horizontal zone of the player surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapZone {
    Left,
    Center,
    Right,
}

impl TapZone {
    /// Zone for a tap at `x` on a surface `width` wide (split in thirds)
    pub fn classify(x: f64, width: f64) -> Self {
        if !(width > 0.0) || !x.is_finite() {
            return TapZone::Center;
        }
        let third = width / 3.0;
        if x < third {
            TapZone::Left
        } else if x > width - third {
            TapZone::Right
        } else {
            TapZone::Center
        }
    }
}

/// Pairs taps into double-taps
///
/// A tap only produces an action when a second tap follows within the time
/// window and horizontal distance limit. A lone tap is discarded.
#[derive(Debug, Clone)]
pub struct DoubleTapDetector {
    window: Duration,
    max_dx: f64,
    pending: Option<(Duration, f64)>,
}

impl DoubleTapDetector {
    pub fn new(window: Duration, max_dx: f64) -> Self {
        Self {
            window,
            max_dx,
            pending: None,
        }
    }

    /// Register a tap at time `at` and position `x`
    ///
    /// Returns the position of the confirming tap when this tap completes a
    /// double-tap.
    pub fn tap(&mut self, at: Duration, x: f64) -> Option<f64> {
        if let Some((first_at, first_x)) = self.pending.take() {
            let in_window = at >= first_at && at - first_at <= self.window;
            if in_window && (x - first_x).abs() <= self.max_dx {
                return Some(x);
            }
        }
        self.pending = Some((at, x));
        None
    }

    pub fn reset(&mut self) {
        self.pending = None;
    }
}

/// Map a keyboard key (DOM `KeyboardEvent.key` names) to a command
///
/// Letter keys match case-insensitively.
pub fn command_for_key(key: &str, settings: &PlayerSettings) -> Option<PlayerCommand> {
    let command = match key.to_ascii_lowercase().as_str() {
        " " | "k" => PlayerCommand::TogglePlay,
        "arrowleft" | "j" => PlayerCommand::SeekBy(-settings.seek_step_secs),
        "arrowright" | "l" => PlayerCommand::SeekBy(settings.seek_step_secs),
        "," => PlayerCommand::SeekBy(-settings.fine_seek_step_secs),
        "." => PlayerCommand::SeekBy(settings.fine_seek_step_secs),
        "arrowup" => PlayerCommand::AdjustVolume(settings.volume_step),
        "arrowdown" => PlayerCommand::AdjustVolume(-settings.volume_step),
        "m" => PlayerCommand::ToggleMute,
        "f" => PlayerCommand::ToggleFullscreen,
        "p" => PlayerCommand::TogglePictureInPicture,
        "<" => PlayerCommand::StepPlaybackRate(PlaybackRateStep::Slower),
        ">" => PlayerCommand::StepPlaybackRate(PlaybackRateStep::Faster),
        "?" => PlayerCommand::ToggleShortcutHelp,
        _ => return None,
    };
    Some(command)
}

/// Input controller for one player
#[derive(Debug, Clone)]
pub struct InputController {
    settings: PlayerSettings,
    taps: DoubleTapDetector,
    help_visible: bool,
}

impl InputController {
    pub fn new(settings: &PlayerSettings) -> Self {
        Self {
            taps: DoubleTapDetector::new(settings.double_tap_window(), settings.double_tap_max_dx),
            settings: settings.clone(),
            help_visible: false,
        }
    }

    pub fn handle_key(&self, key: &str, focus: Focus) -> Option<PlayerCommand> {
        if focus == Focus::TextField {
            return None;
        }
        command_for_key(key, &self.settings)
    }

    /// Feed a pointer tap; yields a command only for a confirmed double-tap
    pub fn handle_tap(&mut self, at: Duration, x: f64, width: f64) -> Option<PlayerCommand> {
        let x = self.taps.tap(at, x)?;
        let command = match TapZone::classify(x, width) {
            TapZone::Left => PlayerCommand::SeekBy(-self.settings.seek_step_secs),
            TapZone::Right => PlayerCommand::SeekBy(self.settings.seek_step_secs),
            TapZone::Center => PlayerCommand::TogglePlay,
        };
        Some(command)
    }

    /// Flip the shortcut help overlay; returns the new visibility
    pub fn toggle_help(&mut self) -> bool {
        self.help_visible = !self.help_visible;
        self.help_visible
    }

    pub fn help_visible(&self) -> bool {
        self.help_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_key_table() {
        let s = PlayerSettings::default();
        let cases = [
            (" ", PlayerCommand::TogglePlay),
            ("k", PlayerCommand::TogglePlay),
            ("K", PlayerCommand::TogglePlay),
            ("ArrowLeft", PlayerCommand::SeekBy(-10.0)),
            ("j", PlayerCommand::SeekBy(-10.0)),
            ("ArrowRight", PlayerCommand::SeekBy(10.0)),
            ("L", PlayerCommand::SeekBy(10.0)),
            (",", PlayerCommand::SeekBy(-5.0)),
            (".", PlayerCommand::SeekBy(5.0)),
            ("ArrowUp", PlayerCommand::AdjustVolume(0.1)),
            ("ArrowDown", PlayerCommand::AdjustVolume(-0.1)),
            ("m", PlayerCommand::ToggleMute),
            ("f", PlayerCommand::ToggleFullscreen),
            ("p", PlayerCommand::TogglePictureInPicture),
            ("<", PlayerCommand::StepPlaybackRate(PlaybackRateStep::Slower)),
            (">", PlayerCommand::StepPlaybackRate(PlaybackRateStep::Faster)),
            ("?", PlayerCommand::ToggleShortcutHelp),
        ];
        for (key, expected) in cases {
            assert_eq!(command_for_key(key, &s), Some(expected), "key {:?}", key);
        }
        assert_eq!(command_for_key("x", &s), None);
        assert_eq!(command_for_key("Enter", &s), None);
    }

    #[test]
    fn test_keys_suppressed_in_text_field() {
        let input = InputController::new(&PlayerSettings::default());
        assert_eq!(input.handle_key("k", Focus::TextField), None);
        assert_eq!(input.handle_key("k", Focus::Player), Some(PlayerCommand::TogglePlay));
    }

    #[test]
    fn test_tap_zones_are_thirds() {
        assert_eq!(TapZone::classify(10.0, 900.0), TapZone::Left);
        assert_eq!(TapZone::classify(299.0, 900.0), TapZone::Left);
        assert_eq!(TapZone::classify(450.0, 900.0), TapZone::Center);
        assert_eq!(TapZone::classify(601.0, 900.0), TapZone::Right);
        assert_eq!(TapZone::classify(100.0, 0.0), TapZone::Center);
    }

    #[test]
    fn test_single_tap_does_nothing() {
        let mut input = InputController::new(&PlayerSettings::default());
        assert_eq!(input.handle_tap(ms(0), 50.0, 900.0), None);
        // Second tap outside the window starts a new pair
        assert_eq!(input.handle_tap(ms(400), 50.0, 900.0), None);
    }

    #[test]
    fn test_double_tap_by_zone() {
        let mut input = InputController::new(&PlayerSettings::default());

        input.handle_tap(ms(0), 50.0, 900.0);
        assert_eq!(
            input.handle_tap(ms(200), 60.0, 900.0),
            Some(PlayerCommand::SeekBy(-10.0))
        );

        input.handle_tap(ms(1000), 850.0, 900.0);
        assert_eq!(
            input.handle_tap(ms(1300), 840.0, 900.0),
            Some(PlayerCommand::SeekBy(10.0))
        );

        input.handle_tap(ms(2000), 450.0, 900.0);
        assert_eq!(
            input.handle_tap(ms(2100), 450.0, 900.0),
            Some(PlayerCommand::TogglePlay)
        );
    }

    #[test]
    fn test_double_tap_rejects_large_displacement() {
        let mut detector = DoubleTapDetector::new(ms(300), 50.0);
        assert_eq!(detector.tap(ms(0), 100.0), None);
        assert_eq!(detector.tap(ms(100), 200.0), None);
        // The rejected tap became the new first tap
        assert_eq!(detector.tap(ms(200), 210.0), Some(210.0));
        // A third tap does not pair with the consumed second
        assert_eq!(detector.tap(ms(250), 210.0), None);
    }

    #[test]
    fn test_help_toggle() {
        let mut input = InputController::new(&PlayerSettings::default());
        assert!(input.toggle_help());
        assert!(input.help_visible());
        assert!(!input.toggle_help());
    }
}
