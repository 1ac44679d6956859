//! In-memory player doubles for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::session::{PlayerLauncher, PlayerTransport, ShutdownOutcome};
use super::{PlayerError, PlayerResult};

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

#[derive(Default)]
struct LogState {
    sent: Vec<String>,
    terminations: usize,
    broken: bool,
    ignore_quit: bool,
}

/// Shared view of what a scripted transport saw, plus failure switches.
#[derive(Clone, Default)]
pub(crate) struct TransportLog {
    inner: Arc<Mutex<LogState>>,
}

impl TransportLog {
    /// Every line written so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().sent.clear();
    }

    pub fn terminations(&self) -> usize {
        self.inner.lock().unwrap().terminations
    }

    /// Makes every further read and write fail as if the process died.
    pub fn break_pipe(&self) {
        self.inner.lock().unwrap().broken = true;
    }

    /// Makes `terminate` run out its grace period and report a kill.
    pub fn ignore_quit(&self) {
        self.inner.lock().unwrap().ignore_quit = true;
    }

    fn record(&self, line: &str) {
        self.inner.lock().unwrap().sent.push(line.to_string());
    }

    fn is_broken(&self) -> bool {
        self.inner.lock().unwrap().broken
    }
}

/// Transport whose answers come from a closure.
pub(crate) struct ScriptedTransport {
    responder: Responder,
    pending: VecDeque<String>,
    log: TransportLog,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl FnMut(&str) -> Option<String> + Send + 'static,
        log: TransportLog,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            pending: VecDeque::new(),
            log,
        }
    }

    pub fn with_replies(
        responder: impl FnMut(&str) -> Option<String> + Send + 'static,
    ) -> (Self, TransportLog) {
        let log = TransportLog::default();
        (Self::new(responder, log.clone()), log)
    }

    /// Queues an unsolicited output line, read before any answer.
    pub fn push_pending(&mut self, line: &str) {
        self.pending.push_back(line.to_string());
    }
}

#[async_trait]
impl PlayerTransport for ScriptedTransport {
    async fn send_line(&mut self, line: &str) -> PlayerResult<()> {
        if self.log.is_broken() {
            return Err(PlayerError::ProtocolRead("write failed: broken pipe".to_string()));
        }
        self.log.record(line);
        if let Some(reply) = (self.responder)(line) {
            self.pending.push_back(reply);
        }
        Ok(())
    }

    async fn recv_line(&mut self, deadline: Duration) -> PlayerResult<String> {
        if self.log.is_broken() {
            return Err(PlayerError::ProtocolRead("player closed its output".to_string()));
        }
        match self.pending.pop_front() {
            Some(line) => Ok(line),
            None => {
                tokio::time::sleep(deadline).await;
                // Same as a real session: a missed deadline ends it.
                self.log.break_pipe();
                Err(PlayerError::ReadTimeout(deadline))
            }
        }
    }

    async fn terminate(&mut self, grace: Duration) -> ShutdownOutcome {
        let (broken, ignore_quit) = {
            let mut state = self.log.inner.lock().unwrap();
            state.terminations += 1;
            (state.broken, state.ignore_quit)
        };
        if broken {
            return ShutdownOutcome::AlreadyExited;
        }
        self.log.record("quit");
        if ignore_quit {
            tokio::time::sleep(grace).await;
            return ShutdownOutcome::Killed;
        }
        ShutdownOutcome::Exited
    }
}

/// A small model of a slave-mode player's observable behaviour.
#[derive(Debug, Clone)]
pub(crate) struct FakePlayer {
    pub position: f64,
    pub length: f64,
    pub width: i64,
    pub height: i64,
    pub fps: Option<f64>,
    pub paused: bool,
    /// Raw answer used for position queries instead of `position`
    pub position_reply: Option<String>,
    /// Leaves position queries unanswered
    pub mute_position: bool,
}

impl Default for FakePlayer {
    fn default() -> Self {
        Self {
            position: 0.0,
            length: 120.0,
            width: 640,
            height: 480,
            fps: Some(25.0),
            paused: false,
            position_reply: None,
            mute_position: false,
        }
    }
}

impl FakePlayer {
    /// Applies one command line and returns its answer, if any.
    pub fn reply(&mut self, line: &str) -> Option<String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (prefix, words) = match words.first() {
            Some(&p) if p == "pausing" || p == "pausing_keep" => (Some(p), &words[1..]),
            _ => (None, &words[..]),
        };

        let answer = match words {
            ["pause"] => {
                self.paused = !self.paused;
                return None;
            }
            ["quit"] => return None,
            ["seek", value, mode] => {
                let value: f64 = value.parse().unwrap_or(0.0);
                let target = if *mode == "2" {
                    value
                } else {
                    self.position + value
                };
                self.position = target.clamp(0.0, self.length);
                self.position_reply = None;
                None
            }
            ["get_time_pos"] if self.mute_position => None,
            ["get_time_pos"] => Some(
                self.position_reply
                    .clone()
                    .unwrap_or_else(|| format!("ANS_TIME_POSITION={:.1}", self.position)),
            ),
            ["get_time_length"] => Some(format!("ANS_LENGTH={:.2}", self.length)),
            ["get_property", "width"] => Some(format!("ANS_width={}", self.width)),
            ["get_property", "height"] => Some(format!("ANS_height={}", self.height)),
            ["get_property", "fps"] => Some(match self.fps {
                Some(fps) => format!("ANS_fps={:.6}", fps),
                None => "ANS_ERROR=PROPERTY_UNAVAILABLE".to_string(),
            }),
            ["get_vo_fullscreen"] => Some("ANS_VO_FULLSCREEN=0".to_string()),
            _ => None,
        };

        match prefix {
            Some("pausing") => self.paused = true,
            Some(_) => {}
            None => self.paused = false,
        }
        answer
    }
}

/// Launcher handing out scripted transports backed by one [`FakePlayer`].
pub(crate) struct FakeLauncher {
    player: Arc<Mutex<FakePlayer>>,
    log: TransportLog,
    banner: Vec<String>,
    missing: bool,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(player: FakePlayer) -> Self {
        Self {
            player: Arc::new(Mutex::new(player)),
            log: TransportLog::default(),
            banner: vec![
                "MPlayer 1.5 (Debian), built with gcc-12 (C) 2000-2022 MPlayer Team".to_string(),
                "Playing clip.avi.".to_string(),
                "Starting playback...".to_string(),
            ],
            missing: false,
            launches: AtomicUsize::new(0),
        }
    }

    /// A launcher whose binary does not exist.
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::new(FakePlayer::default())
        }
    }

    pub fn player(&self) -> Arc<Mutex<FakePlayer>> {
        Arc::clone(&self.player)
    }

    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlayerLauncher for FakeLauncher {
    async fn launch(
        &self,
        _media_path: &Path,
        _surface_id: Option<u64>,
    ) -> PlayerResult<Box<dyn PlayerTransport>> {
        if self.missing {
            return Err(PlayerError::ProcessNotFound {
                binary: "mplayer".to_string(),
            });
        }
        self.launches.fetch_add(1, Ordering::SeqCst);

        let player = Arc::clone(&self.player);
        let mut transport = ScriptedTransport::new(
            move |line| player.lock().unwrap().reply(line),
            self.log.clone(),
        );
        for line in &self.banner {
            transport.push_pending(line);
        }
        Ok(Box::new(transport))
    }
}
