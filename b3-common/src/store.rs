//! On-disk parameter store
//!
//! A flat text file of `key = value` lines shared with the playback binary.
//! The binary reads it at startup and rewrites `seek_time` when it shuts down
//! on SIGINT, so the service must treat the file as externally modified at
//! any time: every read goes to disk and every write re-reads the current
//! contents before replacing them.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::params::{ParamKey, PlayerParams};
use crate::{Error, Result};

/// Handle to the persisted parameter file
#[derive(Debug, Clone)]
pub struct ParamStore {
    path: PathBuf,
}

impl ParamStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load parameters, starting from defaults for keys the file lacks
    pub async fn load(&self) -> Result<PlayerParams> {
        let mut params = PlayerParams::default();
        self.read_into(&mut params).await?;
        Ok(params)
    }

    /// Overlay every known key found on disk onto `params`
    ///
    /// Keys missing from the file and values that fail to parse leave the
    /// in-memory value in place. Returns how many keys were taken from disk.
    pub async fn read_into(&self, params: &mut PlayerParams) -> Result<usize> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::store(&self.path, e))?;

        let mut loaded = 0;
        for (name, value) in parse_entries(&text) {
            let Ok(key) = name.parse::<ParamKey>() else {
                continue;
            };
            match params.set_str(key, &value) {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Ignoring {} in {}: {}", key, self.path.display(), e),
            }
        }

        debug!("Read {} parameters from {}", loaded, self.path.display());
        Ok(loaded)
    }

    /// Write every known key, keeping unrelated lines and comments
    pub async fn write(&self, params: &PlayerParams) -> Result<()> {
        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::store(&self.path, e)),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::store(parent, e))?;
        }

        // Replace via rename so the player never reads a half-written file
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, render(&existing, params))
            .await
            .map_err(|e| Error::store(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::store(&self.path, e))?;

        debug!("Wrote parameters to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "params".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

/// Split a line into key and value, or `None` for comments, sections and noise
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key, value))
}

/// All `key = value` pairs in file order
pub fn parse_entries(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(parse_line)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Produce new file contents from `existing` with every known key set from `params`
///
/// Known keys are rewritten where they already appear (later duplicates are
/// dropped), keys not yet present are appended in canonical order, and all
/// other lines pass through unchanged.
pub fn render(existing: &str, params: &PlayerParams) -> String {
    let mut written: Vec<ParamKey> = Vec::with_capacity(ParamKey::ALL.len());
    let mut out = String::with_capacity(existing.len() + 256);

    for line in existing.lines() {
        let known = parse_line(line).and_then(|(name, _)| name.parse::<ParamKey>().ok());
        match known {
            Some(key) if written.contains(&key) => {}
            Some(key) => {
                out.push_str(&format!("{} = {}\n", key, params.value_string(key)));
                written.push(key);
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    for key in ParamKey::ALL {
        if !written.contains(&key) {
            out.push_str(&format!("{} = {}\n", key, params.value_string(key)));
        }
    }

    out
}
