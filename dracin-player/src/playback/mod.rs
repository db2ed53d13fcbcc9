//! Playback core
//!
//! The session is the entry point; the other modules are its parts:
//! - `clock`: media element boundary and timeline commands
//! - `input`: keyboard, double-tap and command vocabulary
//! - `progress_sync`: periodic, debounced and forced position persistence
//! - `auto_advance`: end-of-episode countdown
//! - `scheduler`: the timers they share
//! - `simulated`: an in-process media element

pub mod auto_advance;
pub mod clock;
pub mod input;
pub mod progress_sync;
pub mod scheduler;
pub mod session;
pub mod simulated;

pub use auto_advance::{AutoAdvance, AutoAdvancePhase, CountdownTick};
pub use clock::{MediaElement, MediaEvent, PlaybackClock};
pub use input::{command_for_key, DoubleTapDetector, Focus, InputController, PlayerCommand, TapZone};
pub use progress_sync::{PositionReport, ProgressRequest, ProgressSync};
pub use scheduler::{TimerKind, Timers};
pub use session::PlayerSession;
pub use simulated::SimulatedMedia;
