//! Test doubles for the player process
//!
//! `FakeLauncher` records every spawn and graceful stop and can mimic the
//! real player writing its position into the parameter store on shutdown.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use b3_common::ParamStore;
use b3_web::process::{Launcher, PlayerExit, PlayerHandle, StopOutcome};
use b3_web::{Error, Result, Supervisor};
use tempfile::TempDir;

/// What the fake player does when driven
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    /// Position written to the store when interrupted
    pub seek_on_stop: Option<u64>,
    /// Exit code reported after interrupt
    pub exit_code: Option<i32>,
    /// Spawn fails as if the binary were missing
    pub missing_binary: bool,
    /// Time the player takes to shut down
    pub stop_delay: Duration,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            seek_on_stop: None,
            exit_code: Some(0),
            missing_binary: false,
            stop_delay: Duration::ZERO,
        }
    }
}

/// Everything the fake launcher observed
#[derive(Debug, Default)]
pub struct PlayerLog {
    pub spawns: Vec<(PathBuf, u64)>,
    pub stops: usize,
}

#[derive(Clone)]
pub struct FakeLauncher {
    store: ParamStore,
    pub log: Arc<Mutex<PlayerLog>>,
    pub behavior: Arc<Mutex<FakeBehavior>>,
    /// Exit status shared with the most recently spawned player
    current_exit: Arc<Mutex<Option<Arc<Mutex<Option<PlayerExit>>>>>>,
}

impl FakeLauncher {
    pub fn new(store: ParamStore) -> Self {
        Self {
            store,
            log: Arc::new(Mutex::new(PlayerLog::default())),
            behavior: Arc::new(Mutex::new(FakeBehavior::default())),
            current_exit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_behavior(&self, f: impl FnOnce(&mut FakeBehavior)) {
        f(&mut self.behavior.lock().unwrap());
    }

    pub fn spawns(&self) -> Vec<(PathBuf, u64)> {
        self.log.lock().unwrap().spawns.clone()
    }

    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    /// Make the current player exit on its own
    pub fn finish_current(&self, code: Option<i32>) {
        if let Some(exit) = self.current_exit.lock().unwrap().as_ref() {
            *exit.lock().unwrap() = Some(PlayerExit { code });
        }
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn spawn(&self, file: &Path, seek_time: u64) -> Result<Box<dyn PlayerHandle>> {
        let behavior = self.behavior.lock().unwrap().clone();
        if behavior.missing_binary {
            return Err(Error::ExecutableNotFound(PathBuf::from("/missing/b3")));
        }

        self.log
            .lock()
            .unwrap()
            .spawns
            .push((file.to_path_buf(), seek_time));

        let exit = Arc::new(Mutex::new(None));
        *self.current_exit.lock().unwrap() = Some(Arc::clone(&exit));

        Ok(Box::new(FakePlayer {
            store: self.store.clone(),
            log: Arc::clone(&self.log),
            behavior: Arc::clone(&self.behavior),
            exit,
        }))
    }
}

pub struct FakePlayer {
    store: ParamStore,
    log: Arc<Mutex<PlayerLog>>,
    behavior: Arc<Mutex<FakeBehavior>>,
    exit: Arc<Mutex<Option<PlayerExit>>>,
}

#[async_trait]
impl PlayerHandle for FakePlayer {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn poll_exit(&mut self) -> Result<Option<PlayerExit>> {
        Ok(*self.exit.lock().unwrap())
    }

    async fn graceful_stop(&mut self, _timeout: Duration) -> Result<StopOutcome> {
        self.log.lock().unwrap().stops += 1;

        let already = *self.exit.lock().unwrap();
        if let Some(exit) = already {
            return Ok(StopOutcome::AlreadyExited(exit));
        }

        let behavior = self.behavior.lock().unwrap().clone();
        tokio::time::sleep(behavior.stop_delay).await;

        // The real player saves its position as it shuts down
        if let Some(seek) = behavior.seek_on_stop {
            let mut params = self.store.load().await.map_err(Error::from)?;
            params.seek_time = seek;
            self.store.write(&params).await.map_err(Error::from)?;
        }

        let exit = PlayerExit {
            code: behavior.exit_code,
        };
        *self.exit.lock().unwrap() = Some(exit);
        Ok(StopOutcome::Exited(exit))
    }
}

/// Supervisor wired to a fake launcher and a temp parameter store
pub struct Harness {
    pub supervisor: Arc<Supervisor>,
    pub launcher: FakeLauncher,
    pub store: ParamStore,
    pub audio_dir: PathBuf,
    _dir: TempDir,
}

pub async fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let store = ParamStore::new(dir.path().join("b3.ini"));
    let audio_dir = dir.path().join("audio");
    std::fs::create_dir_all(&audio_dir).expect("audio dir");

    let launcher = FakeLauncher::new(store.clone());
    let supervisor = Arc::new(
        Supervisor::new(
            Box::new(launcher.clone()),
            store.clone(),
            &audio_dir,
            Duration::from_secs(1),
        )
        .await,
    );

    Harness {
        supervisor,
        launcher,
        store,
        audio_dir,
        _dir: dir,
    }
}
