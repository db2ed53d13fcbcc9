//! Dracin Player Library
//!
//! Client-side playback core of the Dracin drama streaming app: the player
//! state store, playback clock and input controller, progress sync engine and
//! auto-advance controller, plus the collaborators they talk to and a tokio
//! runtime that drives them.
//!
//! A [`PlayerSession`] is fully deterministic and can be driven directly with
//! virtual time; [`PlayerRuntime`] drives one from real time, commands, media
//! callbacks and backend completions.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod playback;
pub mod runtime;
pub mod state;

pub use config::{PlayerSettings, TomlConfig};
pub use error::{Error, Result};
pub use playback::{MediaElement, MediaEvent, PlayerCommand, PlayerSession, SimulatedMedia};
pub use runtime::{PlayerHandle, PlayerRuntime};
pub use state::{PlaybackSession, PlayerStore};
