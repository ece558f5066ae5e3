//! Playback state and event types

use serde::{Deserialize, Serialize};

/// What the player is doing right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}

/// Events broadcast to SSE listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum B3Event {
    /// A transition completed
    PlaybackStateChanged {
        state: PlaybackState,
        active_file: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Parameters were updated by a client
    ParamsChanged {
        keys: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The player exited without being asked to
    PlayerExited {
        file: String,
        exit_code: Option<i32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl B3Event {
    /// Get event type as string for SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            B3Event::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            B3Event::ParamsChanged { .. } => "ParamsChanged",
            B3Event::PlayerExited { .. } => "PlayerExited",
        }
    }

    pub fn state_changed(state: PlaybackState, active_file: &str) -> Self {
        B3Event::PlaybackStateChanged {
            state,
            active_file: active_file.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}
