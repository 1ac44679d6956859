//! Player Process Session
//!
//! Spawns the player in slave mode and exposes its standard streams as a
//! line transport. Reads are always bounded by a deadline and shutdown is
//! always bounded by a grace period followed by a kill.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

use super::detection::detect_player;
use super::protocol::SlaveCommand;
use super::{PlayerError, PlayerResult};
use crate::core::process::{configure_tokio_command, ensure_term_env};
use crate::core::settings::PlayerSettings;

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The player honoured `quit` within the grace period
    Exited,
    /// The player had to be killed
    Killed,
    /// The player was already gone
    AlreadyExited,
}

/// Line-oriented connection to a running player.
///
/// Implemented by [`ProcessSession`]; tests substitute scripted transports.
#[async_trait]
pub trait PlayerTransport: Send {
    /// Write one line (a newline is appended).
    async fn send_line(&mut self, line: &str) -> PlayerResult<()>;

    /// Read the next line, failing if none arrives within `deadline`.
    async fn recv_line(&mut self, deadline: Duration) -> PlayerResult<String>;

    /// Ask the player to quit, then force it after `grace`.
    async fn terminate(&mut self, grace: Duration) -> ShutdownOutcome;
}

/// Starts player transports for a media file.
#[async_trait]
pub trait PlayerLauncher: Send + Sync {
    async fn launch(
        &self,
        media_path: &Path,
        surface_id: Option<u64>,
    ) -> PlayerResult<Box<dyn PlayerTransport>>;
}

/// What to execute when starting a player.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Player executable (absolute path or a name resolved through PATH)
    pub binary: PathBuf,
    /// Arguments placed before the standard slave-mode flags
    pub extra_args: Vec<String>,
}

impl LaunchConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Resolves the player from settings.
    ///
    /// A configured path is used verbatim so a wrong path surfaces as
    /// `ProcessNotFound` on open; otherwise the binary name is looked up and
    /// left for PATH resolution if detection fails.
    pub fn from_settings(settings: &PlayerSettings) -> Self {
        let binary = match &settings.binary_path {
            Some(path) => path.clone(),
            None => detect_player(None, &settings.binary_name).unwrap_or_else(|e| {
                debug!("{}, relying on PATH", e);
                PathBuf::from(&settings.binary_name)
            }),
        };
        Self {
            binary,
            extra_args: settings.extra_args.clone(),
        }
    }

    /// Builds the full argument list; the media path is always last.
    pub fn build_args(&self, media_path: &Path, surface_id: Option<u64>) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();

        if let Some(id) = surface_id {
            args.push("-wid".into());
            args.push(id.to_string().into());
        }

        args.extend(
            ["-osdlevel", "3", "-quiet", "-nomouseinput", "-slave"]
                .iter()
                .map(OsString::from),
        );
        args.push(media_path.as_os_str().to_owned());
        args
    }
}

/// A running player process with piped stdin/stdout.
pub struct ProcessSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    alive: bool,
}

impl ProcessSession {
    /// Spawns the player for `media_path`, optionally embedded into the
    /// window identified by `surface_id`.
    pub fn start(
        config: &LaunchConfig,
        media_path: &Path,
        surface_id: Option<u64>,
    ) -> PlayerResult<Self> {
        let args = config.build_args(media_path, surface_id);

        let mut cmd = tokio::process::Command::new(&config.binary);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        configure_tokio_command(&mut cmd);
        if ensure_term_env(&mut cmd) {
            debug!("TERM not set, injecting fallback for player process");
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => PlayerError::ProcessNotFound {
                binary: config.binary.display().to_string(),
            },
            _ => PlayerError::Spawn(e),
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlayerError::Spawn(std::io::Error::other("stdin was not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::Spawn(std::io::Error::other("stdout was not captured")))?;

        info!(
            "Started player {} (pid {:?}) for {}",
            config.binary.display(),
            child.id(),
            media_path.display()
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            alive: true,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    async fn kill(&mut self) -> ShutdownOutcome {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill player: {}", e);
        }
        ShutdownOutcome::Killed
    }

    fn lost(&mut self, reason: impl Into<String>) -> PlayerError {
        self.alive = false;
        PlayerError::ProtocolRead(reason.into())
    }
}

#[async_trait]
impl PlayerTransport for ProcessSession {
    async fn send_line(&mut self, line: &str) -> PlayerResult<()> {
        let stdin = match self.stdin.as_mut() {
            Some(stdin) if self.alive => stdin,
            _ => return Err(PlayerError::ProtocolRead("player input closed".to_string())),
        };

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let result = match stdin.write_all(buf.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.lost(format!("write failed: {}", e)))
    }

    async fn recv_line(&mut self, deadline: Duration) -> PlayerResult<String> {
        if !self.alive {
            return Err(PlayerError::ProtocolRead("player output closed".to_string()));
        }

        match tokio::time::timeout(deadline, self.stdout.next_line()).await {
            Err(_) => {
                // A late answer would be read by the next query instead.
                self.alive = false;
                Err(PlayerError::ReadTimeout(deadline))
            }
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => Err(self.lost("player closed its output")),
            Ok(Err(e)) => Err(self.lost(format!("read failed: {}", e))),
        }
    }

    async fn terminate(&mut self, grace: Duration) -> ShutdownOutcome {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("Player already exited with {}", status);
            self.alive = false;
            self.stdin = None;
            return ShutdownOutcome::AlreadyExited;
        }

        if let Some(mut stdin) = self.stdin.take() {
            let quit = format!("{}\n", SlaveCommand::Quit.to_line());
            if let Err(e) = stdin.write_all(quit.as_bytes()).await {
                debug!("Could not send quit to player: {}", e);
            }
            let _ = stdin.flush().await;
        }
        self.alive = false;

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("Player exited with {}", status);
                ShutdownOutcome::Exited
            }
            Ok(Err(e)) => {
                warn!("Waiting for player failed ({}), killing it", e);
                self.kill().await
            }
            Err(_) => {
                warn!("Player didn't exit within {:?}, killing it", grace);
                self.kill().await
            }
        }
    }
}

/// Launches real player processes.
#[derive(Debug, Clone)]
pub struct SlaveLauncher {
    config: LaunchConfig,
}

impl SlaveLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlayerLauncher for SlaveLauncher {
    async fn launch(
        &self,
        media_path: &Path,
        surface_id: Option<u64>,
    ) -> PlayerResult<Box<dyn PlayerTransport>> {
        let session = ProcessSession::start(&self.config, media_path, surface_id)?;
        Ok(Box::new(session))
    }
}
