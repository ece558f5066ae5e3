//! # B3 Common Library
//!
//! Shared code for the B3 playback control service and its tests:
//! - Persisted player parameters (`ParamKey`, `PlayerParams`)
//! - The on-disk `key = value` parameter store
//! - Playback state and broadcast event types
//! - Service configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod params;
pub mod store;

pub use error::{Error, Result};
pub use events::{B3Event, PlaybackState};
pub use params::{ParamKey, PlayerParams};
pub use store::ParamStore;
