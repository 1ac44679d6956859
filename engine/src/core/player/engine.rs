//! Playback Engine
//!
//! The public façade over one player session. A [`PlaybackEngine`] is a
//! cheap handle; the session, the logical state and the position poller all
//! live on a single actor task that processes requests one at a time and
//! runs the poll ticks in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::CommandChannel;
use super::events::{dispatch, ChannelListener, PlayerEvent, PlayerListener};
use super::poller::{PollTrigger, PositionPoller, PositionSample};
use super::protocol::SlaveCommand;
use super::session::{LaunchConfig, PlayerLauncher, SlaveLauncher};
use super::{PlayerError, PlayerResult};
use crate::core::settings::PlayerSettings;
use crate::core::{
    frames_to_time, time_to_frames, Frame, PlaybackState, StreamInfo, TimeSec, VideoSize,
    DEFAULT_ASPECT_RATIO,
};

/// Request queue depth between handle and actor
const REQUEST_QUEUE: usize = 32;

/// Timing knobs for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Period of the position poll while playing
    pub poll_interval: Duration,
    /// Deadline for each query answer
    pub query_timeout: Duration,
    /// Deadline for the startup drain
    pub startup_timeout: Duration,
    /// How long `quit` is given before the player is killed
    pub shutdown_grace: Duration,
    /// Window the player renders into (`-wid`)
    pub surface_id: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            query_timeout: Duration::from_secs(2),
            startup_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(1),
            surface_id: None,
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &PlayerSettings) -> Self {
        let settings = settings.normalized();
        Self {
            poll_interval: settings.poll_interval(),
            query_timeout: settings.query_timeout(),
            startup_timeout: settings.startup_timeout(),
            shutdown_grace: settings.shutdown_grace(),
            surface_id: None,
        }
    }

    pub fn with_surface(mut self, surface_id: Option<u64>) -> Self {
        self.surface_id = surface_id;
        self
    }
}

enum Request {
    Open {
        path: PathBuf,
        reply: oneshot::Sender<PlayerResult<StreamInfo>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Play {
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    Seek {
        target: TimeSec,
        reply: oneshot::Sender<()>,
    },
    SeekRelative {
        delta: TimeSec,
        reply: oneshot::Sender<()>,
    },
    SeekFrames {
        frames: Frame,
        reply: oneshot::Sender<()>,
    },
    Check {
        reply: oneshot::Sender<()>,
    },
    Position {
        reply: oneshot::Sender<TimeSec>,
    },
    PositionFrames {
        reply: oneshot::Sender<Option<Frame>>,
    },
    Info {
        reply: oneshot::Sender<Option<StreamInfo>>,
    },
    State {
        reply: oneshot::Sender<PlaybackState>,
    },
}

/// Handle to a playback engine.
///
/// Dropping the handle stops the engine and shuts its player down.
pub struct PlaybackEngine {
    requests: mpsc::Sender<Request>,
    task: JoinHandle<()>,
}

impl PlaybackEngine {
    /// Starts an engine on the current tokio runtime.
    pub fn spawn(
        launcher: Arc<dyn PlayerLauncher>,
        listener: Arc<dyn PlayerListener>,
        options: EngineOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let actor = EngineActor::new(launcher, listener, options, rx);
        let task = tokio::spawn(actor.run());
        Self { requests: tx, task }
    }

    /// Starts an engine that launches real player processes.
    pub fn with_settings(
        settings: &PlayerSettings,
        listener: Arc<dyn PlayerListener>,
        surface_id: Option<u64>,
    ) -> Self {
        let launcher = SlaveLauncher::new(LaunchConfig::from_settings(settings));
        let options = EngineOptions::from_settings(settings).with_surface(surface_id);
        Self::spawn(Arc::new(launcher), listener, options)
    }

    /// Starts an engine whose notifications arrive on a channel.
    pub fn with_event_channel(
        launcher: Arc<dyn PlayerLauncher>,
        options: EngineOptions,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (listener, events) = ChannelListener::new();
        (Self::spawn(launcher, Arc::new(listener), options), events)
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> PlayerResult<T> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .await
            .map_err(|_| PlayerError::EngineShutDown)?;
        rx.await.map_err(|_| PlayerError::EngineShutDown)
    }

    /// Opens `path` and leaves it paused at the start.
    pub async fn open(&self, path: impl AsRef<Path>) -> PlayerResult<StreamInfo> {
        let path = path.as_ref().to_path_buf();
        self.call(|reply| Request::Open { path, reply }).await?
    }

    /// Shuts the player down. Does nothing when no media is open.
    pub async fn close(&self) -> PlayerResult<()> {
        self.call(|reply| Request::Close { reply }).await
    }

    pub async fn play(&self) -> PlayerResult<()> {
        self.call(|reply| Request::Play { reply }).await
    }

    pub async fn pause(&self) -> PlayerResult<()> {
        self.call(|reply| Request::Pause { reply }).await
    }

    /// Seeks to an absolute time; negative targets seek to the start.
    pub async fn seek(&self, target: TimeSec) -> PlayerResult<()> {
        self.call(|reply| Request::Seek { target, reply }).await
    }

    /// Seeks back by `amount` seconds.
    pub async fn rewind(&self, amount: TimeSec) -> PlayerResult<()> {
        let delta = -amount.abs();
        self.call(|reply| Request::SeekRelative { delta, reply }).await
    }

    /// Seeks forward by `amount` seconds.
    pub async fn forward(&self, amount: TimeSec) -> PlayerResult<()> {
        let delta = amount.abs();
        self.call(|reply| Request::SeekRelative { delta, reply }).await
    }

    /// Seeks to a frame index using the stream's frame rate.
    pub async fn seek_frames(&self, frames: Frame) -> PlayerResult<()> {
        self.call(|reply| Request::SeekFrames { frames, reply }).await
    }

    /// Polls once, unless the periodic cycle is already running.
    pub async fn check(&self) -> PlayerResult<()> {
        self.call(|reply| Request::Check { reply }).await
    }

    /// Current position in seconds, or `-1` when the player cannot tell.
    pub async fn position(&self) -> PlayerResult<TimeSec> {
        self.call(|reply| Request::Position { reply }).await
    }

    /// Current position as a frame index, when the frame rate is known.
    pub async fn position_frames(&self) -> PlayerResult<Option<Frame>> {
        self.call(|reply| Request::PositionFrames { reply }).await
    }

    /// Properties of the open stream.
    pub async fn stream_info(&self) -> PlayerResult<Option<StreamInfo>> {
        self.call(|reply| Request::Info { reply }).await
    }

    /// Stream duration in seconds; 0 when nothing is open.
    pub async fn length(&self) -> PlayerResult<TimeSec> {
        Ok(self.stream_info().await?.map_or(0.0, |info| info.length))
    }

    pub async fn aspect_ratio(&self) -> PlayerResult<f64> {
        Ok(self
            .stream_info()
            .await?
            .map_or(DEFAULT_ASPECT_RATIO, |info| info.aspect_ratio))
    }

    pub async fn frame_rate(&self) -> PlayerResult<Option<f64>> {
        Ok(self.stream_info().await?.and_then(|info| info.frame_rate))
    }

    pub async fn state(&self) -> PlayerResult<PlaybackState> {
        self.call(|reply| Request::State { reply }).await
    }

    /// Closes any open media and waits for the engine task to finish.
    pub async fn shutdown(self) {
        let Self { requests, task } = self;
        let (tx, rx) = oneshot::channel();
        if requests.send(Request::Close { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
        drop(requests);
        if let Err(e) = task.await {
            warn!("Playback engine task ended abnormally: {}", e);
        }
    }
}

struct OpenSession {
    channel: CommandChannel,
    info: StreamInfo,
}

struct EngineActor {
    launcher: Arc<dyn PlayerLauncher>,
    listener: Arc<dyn PlayerListener>,
    options: EngineOptions,
    requests: mpsc::Receiver<Request>,
    session: Option<OpenSession>,
    state: PlaybackState,
    poller: PositionPoller,
}

impl EngineActor {
    fn new(
        launcher: Arc<dyn PlayerLauncher>,
        listener: Arc<dyn PlayerListener>,
        options: EngineOptions,
        requests: mpsc::Receiver<Request>,
    ) -> Self {
        let poller = PositionPoller::new(options.poll_interval);
        Self {
            launcher,
            listener,
            options,
            requests,
            session: None,
            state: PlaybackState::Stopped,
            poller,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
                _ = self.poller.tick(), if self.poller.is_running() => {
                    self.poll_once(PollTrigger::Tick).await;
                }
            }
        }

        self.close().await;
        debug!("Playback engine stopped");
    }

    async fn handle(&mut self, request: Request) {
        // Replies are best effort: a caller that gave up is not an error.
        match request {
            Request::Open { path, reply } => {
                let result = self.open(&path).await;
                let _ = reply.send(result);
            }
            Request::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            Request::Play { reply } => {
                self.play().await;
                let _ = reply.send(());
            }
            Request::Pause { reply } => {
                self.pause().await;
                let _ = reply.send(());
            }
            Request::Seek { target, reply } => {
                self.seek(SlaveCommand::SeekAbsolute(clamp_target(target)))
                    .await;
                let _ = reply.send(());
            }
            Request::SeekRelative { delta, reply } => {
                if delta.is_finite() {
                    self.seek(SlaveCommand::SeekRelative(delta)).await;
                }
                let _ = reply.send(());
            }
            Request::SeekFrames { frames, reply } => {
                match self.frame_rate() {
                    Some(fps) => {
                        let target = frames_to_time(frames, fps);
                        self.seek(SlaveCommand::SeekAbsolute(clamp_target(target)))
                            .await;
                    }
                    None => warn!("Frame seek ignored: frame rate unknown"),
                }
                let _ = reply.send(());
            }
            Request::Check { reply } => {
                self.check().await;
                let _ = reply.send(());
            }
            Request::Position { reply } => {
                let position = self.sample_position().await.as_raw();
                let _ = reply.send(position);
            }
            Request::PositionFrames { reply } => {
                let frames = match self.frame_rate() {
                    Some(fps) => match self.sample_position().await {
                        PositionSample::At(position) => Some(time_to_frames(position, fps)),
                        _ => None,
                    },
                    None => None,
                };
                let _ = reply.send(frames);
            }
            Request::Info { reply } => {
                let _ = reply.send(self.session.as_ref().map(|s| s.info.clone()));
            }
            Request::State { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    fn frame_rate(&self) -> Option<f64> {
        self.session.as_ref().and_then(|s| s.info.frame_rate)
    }

    fn paused_verbs(&self) -> bool {
        self.state != PlaybackState::Playing
    }

    async fn open(&mut self, path: &Path) -> PlayerResult<StreamInfo> {
        if self.session.is_some() {
            return Err(PlayerError::AlreadyOpen);
        }

        info!("Opening media: {}", path.display());
        let transport = self
            .launcher
            .launch(path, self.options.surface_id)
            .await?;
        let mut channel = CommandChannel::new(transport, self.options.query_timeout);

        match prepare_stream(&mut channel, &self.options).await {
            Ok(info) => {
                info!(
                    "Opened {} (length {:.3}s, aspect {:.3})",
                    path.display(),
                    info.length,
                    info.aspect_ratio
                );
                self.session = Some(OpenSession {
                    channel,
                    info: info.clone(),
                });
                self.state = PlaybackState::Paused;
                Ok(info)
            }
            Err(e) => {
                warn!("Failed to open {}: {}", path.display(), e);
                channel.terminate(self.options.shutdown_grace).await;
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        self.poller.reset();
        if let Some(mut session) = self.session.take() {
            let outcome = session.channel.terminate(self.options.shutdown_grace).await;
            info!("Closed media ({:?})", outcome);
        }
        self.state = PlaybackState::Stopped;
    }

    async fn play(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("Play ignored: no media open");
            return;
        };

        match self.state {
            PlaybackState::Playing if self.poller.is_running() => {}
            PlaybackState::Playing => {
                // Cycle stopped at the end of the stream; the player is
                // already running, so only polling resumes.
                self.poller.start();
            }
            _ => {
                if let Err(e) = session.channel.exec(&SlaveCommand::TogglePause).await {
                    warn!("Failed to resume playback: {}", e);
                }
                self.state = PlaybackState::Playing;
                self.poller.start();
            }
        }
    }

    async fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        self.poller.stop();
        if let Err(e) = session.channel.exec(&SlaveCommand::TogglePause).await {
            warn!("Failed to pause playback: {}", e);
        }
        self.state = PlaybackState::Paused;
    }

    async fn seek(&mut self, command: SlaveCommand) {
        let Some(session) = self.session.as_mut() else {
            debug!("Seek ignored: no media open");
            return;
        };

        if let Err(e) = session.channel.exec(&command).await {
            warn!("Seek failed: {}", e);
        }
        if self.poller.wants_check() {
            self.poll_once(PollTrigger::Seek).await;
        }

        if self.state == PlaybackState::Playing
            && !self.poller.is_running()
            && !self.poller.end_reached()
        {
            debug!("Resuming position polling after seek");
            self.poller.start();
        }
    }

    async fn check(&mut self) {
        if self.poller.wants_check() {
            self.poll_once(PollTrigger::Check).await;
        }
    }

    async fn sample_position(&mut self) -> PositionSample {
        let paused = self.paused_verbs();
        match self.session.as_mut() {
            Some(session) => {
                let result = session
                    .channel
                    .query_float(&SlaveCommand::TimePosition { paused })
                    .await;
                PositionSample::from_query(result)
            }
            None => PositionSample::End,
        }
    }

    async fn poll_once(&mut self, trigger: PollTrigger) {
        let Some(length) = self.session.as_ref().map(|s| s.info.length) else {
            self.poller.stop();
            return;
        };

        let sample = self.sample_position().await;
        for event in self.poller.evaluate(sample, length, trigger) {
            dispatch(self.listener.as_ref(), &event);
        }
    }
}

fn clamp_target(target: TimeSec) -> TimeSec {
    if target.is_finite() && target > 0.0 {
        target
    } else {
        0.0
    }
}

/// Brings a freshly launched player to a known state and reads its stream
/// properties.
async fn prepare_stream(
    channel: &mut CommandChannel,
    options: &EngineOptions,
) -> PlayerResult<StreamInfo> {
    channel.drain_until_marker(options.startup_timeout).await?;
    channel.exec(&SlaveCommand::SeekStart).await?;

    let length = match channel
        .query_float(&SlaveCommand::TimeLength { paused: true })
        .await
    {
        Ok(length) if length > 0.0 => length,
        Ok(length) => {
            warn!("Player reported non-positive length {}, using 0", length);
            0.0
        }
        Err(e) if e.is_transport_failure() => return Err(e),
        Err(e) => {
            warn!("Could not read stream length: {}", e);
            0.0
        }
    };

    let aspect_ratio = match query_video_size(channel).await {
        Ok(size) => size.aspect_ratio(),
        Err(e) if e.is_transport_failure() => return Err(e),
        Err(e) => {
            warn!("Could not read video size ({}), using default aspect ratio", e);
            DEFAULT_ASPECT_RATIO
        }
    };

    let frame_rate = match channel.query_float(&SlaveCommand::FrameRate).await {
        Ok(fps) if fps > 0.0 => Some(fps),
        Ok(_) => None,
        Err(e) if e.is_transport_failure() => return Err(e),
        Err(e) => {
            debug!("Frame rate unavailable: {}", e);
            None
        }
    };

    Ok(StreamInfo {
        length,
        aspect_ratio,
        frame_rate,
    })
}

async fn query_video_size(channel: &mut CommandChannel) -> PlayerResult<VideoSize> {
    let width = channel.query_int(&SlaveCommand::VideoWidth).await?;
    let height = channel.query_int(&SlaveCommand::VideoHeight).await?;
    Ok(VideoSize::new(width, height))
}
