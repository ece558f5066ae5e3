//! # B3 Web Control Library (b3-web)
//!
//! Remote control of the B3 playback binary over HTTP.
//!
//! **Purpose:** Start, pause, resume and stop a single external player
//! process, keep the shared parameter file in step with it, and list the
//! playable files.
//!
//! **Architecture:** axum request layer → `Supervisor` (state machine +
//! process lifecycle + parameter sync) → `tokio::process` child

pub mod action;
pub mod api;
pub mod error;
pub mod library;
pub mod process;
pub mod supervisor;

pub use error::{Error, Result};
pub use supervisor::Supervisor;
