//! Persisted player parameters
//!
//! The playback binary and this service share a fixed set of nine tunables.
//! `ParamKey` is the closed set of their names; `PlayerParams` is the typed
//! record holding one value per key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Name of a persisted player parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    LpfCutoff,
    HpfCutoff,
    BodyThreshold,
    MouthThreshold,
    ChunkSizeMs,
    BufferCount,
    SeekTime,
    RmsWindowMs,
    FlipIntervalMs,
}

impl ParamKey {
    /// Every key, in the order they are written to the store
    pub const ALL: [ParamKey; 9] = [
        ParamKey::LpfCutoff,
        ParamKey::HpfCutoff,
        ParamKey::BodyThreshold,
        ParamKey::MouthThreshold,
        ParamKey::ChunkSizeMs,
        ParamKey::BufferCount,
        ParamKey::SeekTime,
        ParamKey::RmsWindowMs,
        ParamKey::FlipIntervalMs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::LpfCutoff => "lpf_cutoff",
            ParamKey::HpfCutoff => "hpf_cutoff",
            ParamKey::BodyThreshold => "body_threshold",
            ParamKey::MouthThreshold => "mouth_threshold",
            ParamKey::ChunkSizeMs => "chunk_size_ms",
            ParamKey::BufferCount => "buffer_count",
            ParamKey::SeekTime => "seek_time",
            ParamKey::RmsWindowMs => "rms_window_ms",
            ParamKey::FlipIntervalMs => "flip_interval_ms",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParamKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::InvalidKey(s.to_string()))
    }
}

/// Player tunables, one field per `ParamKey`
///
/// Defaults match the values the playback binary falls back to when its
/// config file is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerParams {
    /// Low-pass filter cutoff (Hz)
    pub lpf_cutoff: f32,
    /// High-pass filter cutoff (Hz)
    pub hpf_cutoff: f32,
    /// RMS level that moves the body
    pub body_threshold: i32,
    /// RMS level that opens the mouth
    pub mouth_threshold: i32,
    /// Audio chunk size (ms); read once at player startup
    pub chunk_size_ms: f32,
    /// Number of chunks buffered ahead
    pub buffer_count: i32,
    /// Playback offset the player starts from; rewritten by the player on clean exit
    pub seek_time: u64,
    /// RMS averaging window (ms)
    pub rms_window_ms: i32,
    /// Body flip interval (ms)
    pub flip_interval_ms: i32,
}

impl Default for PlayerParams {
    fn default() -> Self {
        Self {
            lpf_cutoff: 20000.0,
            hpf_cutoff: 0.0,
            body_threshold: 10000,
            mouth_threshold: 10000,
            chunk_size_ms: 64.0,
            buffer_count: 2,
            seek_time: 0,
            rms_window_ms: 250,
            flip_interval_ms: 2000,
        }
    }
}

/// Outcome of a partial update: keys applied and keys rejected with the reason
#[derive(Debug, Default)]
pub struct ParamUpdate {
    pub applied: Vec<ParamKey>,
    pub rejected: Vec<(String, Error)>,
}

impl ParamUpdate {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl PlayerParams {
    /// Textual form of a value as written to the store
    pub fn value_string(&self, key: ParamKey) -> String {
        match key {
            ParamKey::LpfCutoff => self.lpf_cutoff.to_string(),
            ParamKey::HpfCutoff => self.hpf_cutoff.to_string(),
            ParamKey::BodyThreshold => self.body_threshold.to_string(),
            ParamKey::MouthThreshold => self.mouth_threshold.to_string(),
            ParamKey::ChunkSizeMs => self.chunk_size_ms.to_string(),
            ParamKey::BufferCount => self.buffer_count.to_string(),
            ParamKey::SeekTime => self.seek_time.to_string(),
            ParamKey::RmsWindowMs => self.rms_window_ms.to_string(),
            ParamKey::FlipIntervalMs => self.flip_interval_ms.to_string(),
        }
    }

    /// Parse `raw` for `key` and store it; the record is untouched on error
    pub fn set_str(&mut self, key: ParamKey, raw: &str) -> Result<()> {
        let raw = raw.trim();
        let invalid = || Error::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        };

        match key {
            ParamKey::LpfCutoff => self.lpf_cutoff = parse_float(raw).ok_or_else(invalid)?,
            ParamKey::HpfCutoff => self.hpf_cutoff = parse_float(raw).ok_or_else(invalid)?,
            ParamKey::ChunkSizeMs => self.chunk_size_ms = parse_float(raw).ok_or_else(invalid)?,
            ParamKey::BodyThreshold => self.body_threshold = parse_int(raw).ok_or_else(invalid)?,
            ParamKey::MouthThreshold => {
                self.mouth_threshold = parse_int(raw).ok_or_else(invalid)?
            }
            ParamKey::BufferCount => self.buffer_count = parse_int(raw).ok_or_else(invalid)?,
            ParamKey::RmsWindowMs => self.rms_window_ms = parse_int(raw).ok_or_else(invalid)?,
            ParamKey::FlipIntervalMs => {
                self.flip_interval_ms = parse_int(raw).ok_or_else(invalid)?
            }
            ParamKey::SeekTime => self.seek_time = parse_seek(raw).ok_or_else(invalid)?,
        }
        Ok(())
    }

    /// Store a JSON scalar (number or numeric string) for `key`
    pub fn set_json(&mut self, key: ParamKey, value: &Value) -> Result<()> {
        match value {
            Value::Number(n) => self.set_str(key, &n.to_string()),
            Value::String(s) => self.set_str(key, s),
            other => Err(Error::InvalidValue {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Merge a partial key/value mapping, one field at a time
    ///
    /// Unknown keys and unparseable values are rejected individually; every
    /// valid entry is still applied.
    pub fn apply_updates(&mut self, updates: &Map<String, Value>) -> ParamUpdate {
        let mut outcome = ParamUpdate::default();

        for (name, value) in updates {
            let result = name
                .parse::<ParamKey>()
                .and_then(|key| self.set_json(key, value).map(|_| key));

            match result {
                Ok(key) => outcome.applied.push(key),
                Err(e) => outcome.rejected.push((name.clone(), e)),
            }
        }

        outcome
    }
}

fn parse_float(raw: &str) -> Option<f32> {
    raw.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_int(raw: &str) -> Option<i32> {
    if let Ok(v) = raw.parse::<i32>() {
        return Some(v);
    }
    // "12.0" is accepted, "12.5" is not
    let v = raw.parse::<f64>().ok().filter(|v| v.is_finite())?;
    if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
        Some(v as i32)
    } else {
        None
    }
}

fn parse_seek(raw: &str) -> Option<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)?;
    Some(v.trunc() as u64)
}
