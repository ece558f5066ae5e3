//! Playback supervisor
//!
//! Owns the playback state, the (at most one) live player process and the
//! in-memory copy of the player parameters. Every state change and every
//! parameter write runs under a single async mutex, held across the
//! multi-second graceful stop, so a request arriving mid-stop waits instead
//! of observing a half-finished transition.
//!
//! | From    | Action      | To      |
//! |---------|-------------|---------|
//! | Stopped | Play(file)  | Playing (seek 0) |
//! | Paused  | Play(file)  | Playing (resume, or seek 0 for a different file) |
//! | Playing | Play(_)     | Paused  |
//! | Playing | Stop        | Stopped |
//! | Paused  | Stop        | Stopped |
//! | Stopped | Stop        | Stopped (no-op) |
//!
//! Parameters are re-read from the store only after the player has been
//! fully reaped: the player writes its position into the store while
//! shutting down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use b3_common::params::ParamUpdate;
use b3_common::{B3Event, ParamStore, PlaybackState, PlayerParams};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::error::{Error, Result};
use crate::process::{Launcher, PlayerExit, PlayerHandle};

/// Mutable supervisor state, only touched with the lock held
struct Inner {
    state: PlaybackState,
    /// Present iff `state == Playing`
    player: Option<Box<dyn PlayerHandle>>,
    /// File loaded in the player; kept while paused, empty when stopped
    active_file: String,
    params: PlayerParams,
}

/// Completed transition, with any lifecycle errors hit on the way
#[derive(Debug)]
pub struct Transition {
    pub action: &'static str,
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub active_file: String,
    pub errors: Vec<Error>,
}

impl Transition {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of a client parameter update
#[derive(Debug)]
pub struct ParamsOutcome {
    pub update: ParamUpdate,
    /// Set when the store write failed; memory still holds the new values
    pub persist_error: Option<Error>,
}

/// Point-in-time view for status reads
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: PlaybackState,
    pub active_file: String,
    pub params: PlayerParams,
}

/// The playback supervisor
pub struct Supervisor {
    inner: Mutex<Inner>,
    launcher: Box<dyn Launcher>,
    store: ParamStore,
    audio_dir: PathBuf,
    stop_timeout: Duration,
    event_tx: broadcast::Sender<B3Event>,
}

impl Supervisor {
    /// Create the supervisor, loading parameters from the store
    ///
    /// A missing store is created from defaults. Any other store failure is
    /// logged and the defaults are used in memory.
    pub async fn new(
        launcher: Box<dyn Launcher>,
        store: ParamStore,
        audio_dir: impl Into<PathBuf>,
        stop_timeout: Duration,
    ) -> Self {
        let params = match store.load().await {
            Ok(params) => {
                info!("Loaded player parameters from {}", store.path().display());
                params
            }
            Err(b3_common::Error::Store { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                info!(
                    "Parameter store {} not found, creating it with defaults",
                    store.path().display()
                );
                let params = PlayerParams::default();
                if let Err(e) = store.write(&params).await {
                    warn!("Failed to create parameter store: {}", e);
                }
                params
            }
            Err(e) => {
                warn!("Failed to load parameter store, using defaults: {}", e);
                PlayerParams::default()
            }
        };

        let (event_tx, _) = broadcast::channel(100);

        Self {
            inner: Mutex::new(Inner {
                state: PlaybackState::Stopped,
                player: None,
                active_file: String::new(),
                params,
            }),
            launcher,
            store,
            audio_dir: audio_dir.into(),
            stop_timeout,
            event_tx,
        }
    }

    /// Subscribe to supervisor events
    pub fn subscribe_events(&self) -> broadcast::Receiver<B3Event> {
        self.event_tx.subscribe()
    }

    fn broadcast_event(&self, event: B3Event) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Apply a validated action
    ///
    /// `Err` means the action was rejected and nothing changed. Lifecycle
    /// problems are returned inside the `Transition`, which has completed.
    pub async fn perform_action(&self, action: Action) -> Result<Transition> {
        let mut inner = self.inner.lock().await;

        // An exited player is retired before the request is looked at
        if let Some(exit) = Self::exited_player(&mut inner) {
            self.handle_unexpected_exit(&mut inner, exit).await;
        }

        self.apply(&mut inner, action).await
    }

    /// Merge a partial parameter mapping and persist the full set
    pub async fn update_params(&self, updates: &Map<String, Value>) -> ParamsOutcome {
        let mut inner = self.inner.lock().await;

        let update = inner.params.apply_updates(updates);
        for (key, e) in &update.rejected {
            debug!("Rejected parameter {}: {}", key, e);
        }

        if update.applied.is_empty() {
            return ParamsOutcome {
                update,
                persist_error: None,
            };
        }

        let persist_error = match self.store.write(&inner.params).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Parameters updated in memory only: {}", e);
                Some(Error::from(e))
            }
        };

        info!(
            "Updated parameters: {}",
            update
                .applied
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.broadcast_event(B3Event::ParamsChanged {
            keys: update.applied.iter().map(|k| k.to_string()).collect(),
            timestamp: chrono::Utc::now(),
        });

        ParamsOutcome {
            update,
            persist_error,
        }
    }

    /// Current state, active file and in-memory parameters
    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().await;
        Snapshot {
            state: inner.state,
            active_file: inner.active_file.clone(),
            params: inner.params.clone(),
        }
    }

    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    /// Detect a player that exited on its own and stop through the normal path
    ///
    /// Returns the exit when one was found.
    pub async fn check_health(&self) -> Option<PlayerExit> {
        let mut inner = self.inner.lock().await;
        let exit = Self::exited_player(&mut inner)?;
        self.handle_unexpected_exit(&mut inner, exit).await;
        Some(exit)
    }

    /// Poll `check_health` every `interval` in a background task
    pub fn spawn_health_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                supervisor.check_health().await;
            }
        })
    }

    /// Stop any running player before the service exits
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == PlaybackState::Stopped {
            return;
        }
        info!("Stopping player for shutdown");
        match self.apply(&mut inner, Action::Stop).await {
            Ok(t) if !t.is_ok() => {
                for e in &t.errors {
                    warn!("Shutdown stop: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => error!("Shutdown stop rejected: {}", e),
        }
    }

    fn exited_player(inner: &mut Inner) -> Option<PlayerExit> {
        match inner.player.as_mut()?.poll_exit() {
            Ok(exit) => exit,
            Err(e) => {
                warn!("Player liveness check failed: {}", e);
                None
            }
        }
    }

    async fn handle_unexpected_exit(&self, inner: &mut Inner, exit: PlayerExit) {
        info!("Player for {} exited on its own ({})", inner.active_file, exit);
        self.broadcast_event(B3Event::PlayerExited {
            file: inner.active_file.clone(),
            exit_code: exit.code,
            timestamp: chrono::Utc::now(),
        });

        match self.apply(inner, Action::Stop).await {
            Ok(t) => {
                for e in &t.errors {
                    warn!("Stop after player exit: {}", e);
                }
            }
            Err(e) => error!("Stop after player exit rejected: {}", e),
        }
    }

    /// The transition table; caller holds the lock
    async fn apply(&self, inner: &mut Inner, action: Action) -> Result<Transition> {
        let from = inner.state;
        let kind = action.kind();
        let mut errors = Vec::new();

        match (from, action) {
            (PlaybackState::Playing, Action::Play(_)) => {
                self.retire_player(inner, &mut errors).await;
                inner.state = PlaybackState::Paused;
            }

            (PlaybackState::Stopped, Action::Play(file)) => {
                if file.is_empty() {
                    return Err(Error::MissingFile);
                }
                self.start_fresh(inner, file, &mut errors).await;
            }

            (PlaybackState::Paused, Action::Play(file)) => {
                if file.is_empty() || file == inner.active_file {
                    let file = inner.active_file.clone();
                    if file.is_empty() {
                        return Err(Error::MissingFile);
                    }
                    let seek = inner.params.seek_time;
                    if let Err(e) = self.start_player(inner, file, seek).await {
                        errors.push(e);
                    }
                } else {
                    debug!("Paused on {}, starting {} from the top", inner.active_file, file);
                    self.start_fresh(inner, file, &mut errors).await;
                }
            }

            (PlaybackState::Playing, Action::Stop) => {
                self.retire_player(inner, &mut errors).await;
                self.reset_seek(inner, &mut errors).await;
                inner.active_file.clear();
                inner.state = PlaybackState::Stopped;
            }

            (PlaybackState::Paused, Action::Stop) => {
                self.reset_seek(inner, &mut errors).await;
                inner.active_file.clear();
                inner.state = PlaybackState::Stopped;
            }

            (PlaybackState::Stopped, Action::Stop) => {
                debug!("Stop while stopped, nothing to do");
            }
        }

        let transition = Transition {
            action: kind,
            from,
            to: inner.state,
            active_file: inner.active_file.clone(),
            errors,
        };

        if transition.from != transition.to {
            info!("Playback {} -> {} ({})", transition.from, transition.to, kind);
            self.broadcast_event(B3Event::state_changed(
                transition.to,
                &transition.active_file,
            ));
        }

        Ok(transition)
    }

    /// Launch the player; on failure nothing is recorded and state is unchanged
    async fn start_player(&self, inner: &mut Inner, file: String, seek: u64) -> Result<()> {
        if inner.player.is_some() {
            return Err(Error::Internal(
                "refusing to start a second player process".to_string(),
            ));
        }

        let handle = self.launcher.spawn(&self.resolve_file(&file), seek).await?;
        inner.player = Some(handle);
        inner.active_file = file;
        inner.state = PlaybackState::Playing;
        Ok(())
    }

    /// Start `file` at position 0
    ///
    /// The stored position is zeroed only once the player is running, so a
    /// failed launch keeps the paused file's resume point.
    async fn start_fresh(&self, inner: &mut Inner, file: String, errors: &mut Vec<Error>) {
        match self.start_player(inner, file, 0).await {
            Ok(()) => self.reset_seek(inner, errors).await,
            Err(e) => errors.push(e),
        }
    }

    /// Gracefully stop the player, then pick up what it wrote to the store
    async fn retire_player(&self, inner: &mut Inner, errors: &mut Vec<Error>) {
        if let Some(mut player) = inner.player.take() {
            match player.graceful_stop(self.stop_timeout).await {
                Ok(outcome) => {
                    debug!("Player stopped: {:?}", outcome);
                    if let Some(e) = outcome.termination_error() {
                        warn!("{}", e);
                        errors.push(e);
                    }
                }
                Err(e) => {
                    error!("Failed to stop player: {}", e);
                    errors.push(e);
                }
            }
        }

        // Only now is the player's seek_time on disk
        if let Err(e) = self.store.read_into(&mut inner.params).await {
            warn!("Keeping in-memory parameters: {}", e);
            errors.push(e.into());
        }
    }

    /// Zero the seek position in memory and on disk
    async fn reset_seek(&self, inner: &mut Inner, errors: &mut Vec<Error>) {
        inner.params.seek_time = 0;
        if let Err(e) = self.store.write(&inner.params).await {
            warn!("Failed to persist seek reset: {}", e);
            errors.push(e.into());
        }
    }

    /// Relative names live in the audio directory
    fn resolve_file(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.audio_dir.join(path)
        }
    }
}
