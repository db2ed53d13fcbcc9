//! # Dracin Common Library
//!
//! Shared code for the Dracin watch player and its collaborators:
//! - Catalog types (episodes, series, progress records, response envelope)
//! - Event types (PlayerEvent enum) and the EventBus
//! - Configuration file resolution
//! - Time formatting helpers

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use catalog::{EpisodeRef, Series, SeriesSummary};
pub use error::{Error, Result};
