//! Service configuration loading
//!
//! Settings for the control service itself (listen address, player binary,
//! file locations, timeouts). Player tunables live in the parameter store,
//! not here.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments / environment variables (merged by the binary)
//! 2. TOML configuration file
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Optional settings read from the TOML file
///
/// Every field may be omitted; a missing file behaves like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub player_executable: Option<PathBuf>,
    pub params_path: Option<PathBuf>,
    pub audio_dir: Option<PathBuf>,
    pub audio_extension: Option<String>,
    pub stop_timeout_ms: Option<u64>,
    pub health_poll_ms: Option<u64>,
    pub verbose_player: Option<bool>,
    pub background_image: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset (e.g. "info", "b3_web=debug")
    #[serde(default)]
    pub level: Option<String>,
}

impl TomlConfig {
    /// Default TOML location: `<config dir>/b3/b3-web.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("b3").join("b3-web.toml"))
    }

    /// Load the TOML file at `path`, or the default location when `None`
    ///
    /// Returns `Ok(None)` when there is no file to load; a file that exists
    /// but cannot be read or parsed is an error. Nothing is logged here since
    /// the file may carry the log level itself.
    pub fn load(path: Option<&Path>) -> Result<Option<(PathBuf, Self)>> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(None);
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let config = Self::parse(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Some((path, config)))
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }
}

/// Command-line (and environment) overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub player_executable: Option<PathBuf>,
    pub params_path: Option<PathBuf>,
    pub audio_dir: Option<PathBuf>,
    pub verbose_player: Option<bool>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    /// Playback binary; a bare name is looked up on PATH
    pub player_executable: PathBuf,
    /// Parameter store shared with the player
    pub params_path: PathBuf,
    /// Directory holding playable files
    pub audio_dir: PathBuf,
    /// Extension (without dot) of playable files
    pub audio_extension: String,
    /// How long the player gets to exit after SIGINT before it is killed
    pub stop_timeout: Duration,
    /// Interval of the background liveness check
    pub health_poll_interval: Duration,
    /// Pass `-v` to the player
    pub verbose_player: bool,
    /// Image behind the control page
    pub background_image: PathBuf,
    pub log_level: Option<String>,
}

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_HEALTH_POLL_MS: u64 = 1000;

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            player_executable: PathBuf::from("b3"),
            params_path: default_params_path(),
            audio_dir: PathBuf::from("/opt/b3/audio"),
            audio_extension: "mp3".to_string(),
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
            health_poll_interval: Duration::from_millis(DEFAULT_HEALTH_POLL_MS),
            verbose_player: true,
            background_image: PathBuf::from("/opt/b3/image.png"),
            log_level: None,
        }
    }
}

impl ServiceConfig {
    /// Layer overrides over TOML over defaults, then validate
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            bind: overrides.bind.or(toml.bind).unwrap_or(defaults.bind),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            player_executable: overrides
                .player_executable
                .or(toml.player_executable)
                .unwrap_or(defaults.player_executable),
            params_path: overrides
                .params_path
                .or(toml.params_path)
                .unwrap_or(defaults.params_path),
            audio_dir: overrides
                .audio_dir
                .or(toml.audio_dir)
                .unwrap_or(defaults.audio_dir),
            audio_extension: toml
                .audio_extension
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or(defaults.audio_extension),
            stop_timeout: toml
                .stop_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.stop_timeout),
            health_poll_interval: toml
                .health_poll_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.health_poll_interval),
            verbose_player: overrides
                .verbose_player
                .or(toml.verbose_player)
                .unwrap_or(defaults.verbose_player),
            background_image: toml
                .background_image
                .unwrap_or(defaults.background_image),
            log_level: toml.logging.level,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.player_executable.as_os_str().is_empty() {
            return Err(Error::Config("player_executable cannot be empty".to_string()));
        }
        if self.audio_extension.is_empty() {
            return Err(Error::Config("audio_extension cannot be empty".to_string()));
        }
        if self.stop_timeout.is_zero() {
            return Err(Error::Config("stop_timeout_ms must be positive".to_string()));
        }
        if self.health_poll_interval.is_zero() {
            return Err(Error::Config("health_poll_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Default parameter store: `<config dir>/b3.ini`, where the player looks for it
fn default_params_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("b3.ini"))
        .unwrap_or_else(|| PathBuf::from("/etc/b3/b3.ini"))
}
