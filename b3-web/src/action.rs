//! Control actions
//!
//! Clients send `{ "action": "play_pause" | "stop", "args": <file> }`. The
//! wire form is validated into an `Action` before the supervisor sees it, so
//! the state machine only ever handles the two known kinds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Wire name of the play/pause toggle
pub const PLAY_PAUSE: &str = "play_pause";
/// Wire name of stop
pub const STOP: &str = "stop";

/// Action as received from a client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionRequest {
    pub action: String,

    /// File to play: a string, a one-element list, or absent
    #[serde(default)]
    pub args: Option<Value>,
}

impl ActionRequest {
    /// The file argument, empty when none was given
    fn file_arg(&self) -> String {
        match &self.args {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Array(items)) => items
                .first()
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Validate the action kind and build the typed action
    pub fn parse(&self) -> Result<Action> {
        match self.action.as_str() {
            PLAY_PAUSE => Ok(Action::Play(self.file_arg())),
            STOP => Ok(Action::Stop),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

/// Validated control action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start, resume, or (while playing) pause; the file may be empty when
    /// the action only toggles to pause or resumes the paused file
    Play(String),
    Stop,
}

impl Action {
    /// Wire name of the action kind
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Play(_) => PLAY_PAUSE,
            Action::Stop => STOP,
        }
    }
}
