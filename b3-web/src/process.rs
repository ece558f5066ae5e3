//! Player process lifecycle
//!
//! The playback binary is an opaque child process invoked as
//! `<player> -f <file> -seek <seconds> [-v]`. On SIGINT it writes its current
//! position back into the parameter store and exits 0, so stopping it is a
//! two-phase affair: interrupt, wait a bounded time, and only then kill.
//!
//! `Launcher` and `PlayerHandle` are the seam the supervisor drives; the
//! `PlayerLauncher` implementation uses `tokio::process`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// How a player process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl PlayerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for PlayerExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for PlayerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Result of a graceful stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited after the interrupt, within the timeout
    Exited(PlayerExit),
    /// Was already gone before it could be interrupted
    AlreadyExited(PlayerExit),
    /// Ignored the interrupt and was killed after the timeout
    Killed(PlayerExit),
}

impl StopOutcome {
    /// Exited on its own with status 0, so the player saved its position
    pub fn is_clean(&self) -> bool {
        match self {
            StopOutcome::Exited(exit) | StopOutcome::AlreadyExited(exit) => exit.success(),
            StopOutcome::Killed(_) => false,
        }
    }

    pub fn exit(&self) -> PlayerExit {
        match self {
            StopOutcome::Exited(exit)
            | StopOutcome::AlreadyExited(exit)
            | StopOutcome::Killed(exit) => *exit,
        }
    }

    /// Error to surface for an unclean stop, if any
    pub fn termination_error(&self) -> Option<Error> {
        match self {
            _ if self.is_clean() => None,
            StopOutcome::Killed(_) => Some(Error::ProcessTermination(
                "player ignored interrupt and was killed".to_string(),
            )),
            other => Some(Error::ProcessTermination(format!(
                "player exited with {}",
                other.exit()
            ))),
        }
    }
}

/// Starts player processes
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch the player on `file`, starting `seek_time` seconds in
    async fn spawn(&self, file: &Path, seek_time: u64) -> Result<Box<dyn PlayerHandle>>;
}

/// One live player process
#[async_trait]
pub trait PlayerHandle: Send {
    /// OS process id while the process has not been reaped
    fn pid(&self) -> Option<u32>;

    /// Non-blocking liveness check; `Some` once the process has exited
    fn poll_exit(&mut self) -> Result<Option<PlayerExit>>;

    /// Interrupt, wait up to `timeout`, then kill and reap
    async fn graceful_stop(&mut self, timeout: Duration) -> Result<StopOutcome>;
}

/// `Launcher` for the real playback binary
#[derive(Debug, Clone)]
pub struct PlayerLauncher {
    executable: PathBuf,
    verbose: bool,
}

impl PlayerLauncher {
    pub fn new(executable: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            executable: executable.into(),
            verbose,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Positional arguments for the player
    pub fn args(&self, file: &Path, seek_time: u64) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            file.to_string_lossy().into_owned(),
            "-seek".to_string(),
            seek_time.to_string(),
        ];
        if self.verbose {
            args.push("-v".to_string());
        }
        args
    }
}

#[async_trait]
impl Launcher for PlayerLauncher {
    async fn spawn(&self, file: &Path, seek_time: u64) -> Result<Box<dyn PlayerHandle>> {
        let child = Command::new(&self.executable)
            .args(self.args(file, seek_time))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ExecutableNotFound(self.executable.clone()),
                _ => Error::Spawn(e),
            })?;

        info!(
            "Started player pid {:?}: {} (seek {})",
            child.id(),
            file.display(),
            seek_time
        );

        Ok(Box::new(ProcessHandle { child }))
    }
}

/// `PlayerHandle` over a `tokio::process::Child`
pub struct ProcessHandle {
    child: Child,
}

impl ProcessHandle {
    fn wait_error(e: std::io::Error) -> Error {
        Error::ProcessTermination(format!("failed to wait for player: {}", e))
    }
}

#[async_trait]
impl PlayerHandle for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn poll_exit(&mut self) -> Result<Option<PlayerExit>> {
        self.child
            .try_wait()
            .map(|status| status.map(PlayerExit::from))
            .map_err(Self::wait_error)
    }

    async fn graceful_stop(&mut self, timeout: Duration) -> Result<StopOutcome> {
        if let Some(exit) = self.poll_exit()? {
            debug!("Player already exited ({})", exit);
            return Ok(StopOutcome::AlreadyExited(exit));
        }

        let delivered = send_interrupt(&mut self.child).map_err(|e| {
            Error::ProcessTermination(format!("failed to interrupt player: {}", e))
        })?;
        if !delivered {
            // Exited between the poll and the signal
            let status = self.child.wait().await.map_err(Self::wait_error)?;
            return Ok(StopOutcome::AlreadyExited(status.into()));
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let exit = PlayerExit::from(status.map_err(Self::wait_error)?);
                debug!("Player exited after interrupt ({})", exit);
                return Ok(StopOutcome::Exited(exit));
            }
            Err(_) => warn!(
                "Player did not exit within {:?} of interrupt, killing",
                timeout
            ),
        }

        if let Err(e) = self.child.kill().await {
            // Losing the race against a late voluntary exit is not a failure
            if let Some(exit) = self.poll_exit()? {
                return Ok(StopOutcome::Exited(exit));
            }
            return Err(Error::ProcessTermination(format!(
                "failed to kill player: {}",
                e
            )));
        }

        let status = self.child.wait().await.map_err(Self::wait_error)?;
        Ok(StopOutcome::Killed(status.into()))
    }
}

/// Ask the player to shut down; `Ok(false)` when it is already gone
#[cfg(unix)]
fn send_interrupt(child: &mut Child) -> std::io::Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(false);
    };

    match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Without SIGINT the only option is terminating outright
#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) -> std::io::Result<bool> {
    match child.start_kill() {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(false),
        Err(e) => Err(e),
    }
}
