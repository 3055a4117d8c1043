//! The engine task. Sole owner of the connection, the pipeline and the
//! transmission loop; everything else talks to it through [`EngineCommand`]s.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use flume::{Receiver, TryRecvError};
use tokio::{
    sync::oneshot,
    time::{Instant, sleep_until},
};
use tracing::{Instrument, debug, info, info_span, warn};

use super::{
    PlaybackRequest,
    connection::{ConnectionManager, ConnectionTier},
    driver::{BlockOutcome, StreamDriver},
    effects::EffectController,
    events::{EngineEvent, EventHub},
    status::EngineStatus,
};
use crate::{
    audio::{AudioPipeline, SourceStage, SourceResolver},
    common::{
        errors::{ConnectionError, LoadError, PipelineError},
        types::ChannelId,
    },
    configs::EngineConfig,
    transport::{Activity, GuildMembers, GuildVoiceChannels, VoiceTransport},
};

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum EngineCommand {
    ConnectServer {
        credential: String,
        reply: Reply<Result<(), ConnectionError>>,
    },
    ConnectChannel {
        channel: ChannelId,
        reply: Reply<Result<(), ConnectionError>>,
    },
    DisconnectChannel {
        reply: Reply<()>,
    },
    DisconnectServer {
        reply: Reply<()>,
    },
    Load {
        request: PlaybackRequest,
        reply: Reply<Result<(), LoadError>>,
    },
    Start {
        reply: Reply<Result<(), ConnectionError>>,
    },
    Stop {
        flush: bool,
        close: bool,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Skip {
        count: u32,
        reply: Reply<()>,
    },
    SeekTo {
        position: Duration,
        enforce: bool,
        reply: Reply<bool>,
    },
    SeekBy {
        delta_ms: i64,
        reply: Reply<bool>,
    },
    SetPitch {
        factor: f32,
        reply: Reply<()>,
    },
    SetBoost {
        enabled: bool,
        reply: Reply<()>,
    },
    SetVolume {
        volume: f32,
        reply: Reply<()>,
    },
    SetLoop {
        enabled: bool,
        reply: Reply<()>,
    },
    SetActivity {
        activity: Activity,
        reply: Reply<Result<(), ConnectionError>>,
    },
    ListVoiceChannels {
        reply: Reply<Result<Vec<GuildVoiceChannels>, ConnectionError>>,
    },
    ListMembers {
        include_offline: bool,
        reply: Reply<Result<Vec<GuildMembers>, ConnectionError>>,
    },
    /// Raised by the health check when the voice link died under us.
    LinkLost,
    Shutdown {
        reply: Reply<()>,
    },
}

impl EngineCommand {
    /// Commands that may only run once the transmission loop has stopped.
    fn requires_idle(&self) -> bool {
        matches!(
            self,
            Self::ConnectServer { .. }
                | Self::ConnectChannel { .. }
                | Self::DisconnectChannel { .. }
                | Self::DisconnectServer { .. }
                | Self::Load { .. }
                | Self::Stop { .. }
                | Self::Pause { .. }
                | Self::LinkLost
                | Self::Shutdown { .. }
        )
    }
}

/// What the run loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stream,
    Shutdown,
}

/// Why a pass of the block loop ended.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Natural,
    Skip,
    Abort,
}

pub(crate) struct EngineActor {
    commands: Receiver<EngineCommand>,
    /// Commands parked until the current stream has stopped.
    deferred: VecDeque<EngineCommand>,
    conn: ConnectionManager,
    effects: EffectController,
    driver: StreamDriver,
    pipeline: Option<AudioPipeline>,
    resolver: Arc<dyn SourceResolver>,
    events: Arc<EventHub>,
    status: Arc<EngineStatus>,
    health_interval: Duration,
    next_health: Instant,
}

impl EngineActor {
    pub(crate) fn new(
        commands: Receiver<EngineCommand>,
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn SourceResolver>,
        config: &EngineConfig,
        events: Arc<EventHub>,
        status: Arc<EngineStatus>,
    ) -> Self {
        let health_interval = config.health_check_interval();
        Self {
            commands,
            deferred: VecDeque::new(),
            conn: ConnectionManager::new(
                transport,
                config.connect_timeout(),
                events.clone(),
                status.clone(),
            ),
            effects: EffectController::new(config.pitch, events.clone(), status.clone()),
            driver: StreamDriver::new(
                config.volume,
                config.pace_output,
                events.clone(),
                status.clone(),
            ),
            pipeline: None,
            resolver,
            events,
            status,
            health_interval,
            next_health: Instant::now() + health_interval,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("engine task started");
        loop {
            let cmd = match self.deferred.pop_front() {
                Some(cmd) => cmd,
                None => tokio::select! {
                    cmd = self.commands.recv_async() => match cmd {
                        Ok(cmd) => cmd,
                        Err(_) => break,
                    },
                    _ = sleep_until(self.next_health) => {
                        self.health_check().await;
                        continue;
                    }
                },
            };

            match self.handle(cmd).await {
                Flow::Continue => {}
                Flow::Stream => self.stream().await,
                Flow::Shutdown => break,
            }
        }

        self.disconnect_server().await;
        info!("engine task stopped");
    }

    async fn handle(&mut self, cmd: EngineCommand) -> Flow {
        // Once anything is parked, later commands queue behind it.
        if self.driver.is_streaming() && (cmd.requires_idle() || !self.deferred.is_empty()) {
            if matches!(cmd, EngineCommand::Pause { .. }) {
                self.driver.set_paused(true);
            }
            self.driver.request_abort();
            self.deferred.push_back(cmd);
            return Flow::Continue;
        }

        match cmd {
            EngineCommand::ConnectServer { credential, reply } => {
                let _ = reply.send(self.connect_server(&credential).await);
            }
            EngineCommand::ConnectChannel { channel, reply } => {
                let _ = reply.send(self.connect_channel(channel).await);
            }
            EngineCommand::DisconnectChannel { reply } => {
                self.disconnect_channel().await;
                let _ = reply.send(());
            }
            EngineCommand::DisconnectServer { reply } => {
                self.disconnect_server().await;
                let _ = reply.send(());
            }
            EngineCommand::Load { request, reply } => {
                let _ = reply.send(self.load(request).await);
            }
            EngineCommand::Start { reply } => {
                if self.driver.is_streaming() {
                    let _ = reply.send(Ok(()));
                    return Flow::Continue;
                }
                let res = self.start().await;
                let flow = match res {
                    Ok(true) => Flow::Stream,
                    _ => Flow::Continue,
                };
                let _ = reply.send(res.map(|_| ()));
                return flow;
            }
            EngineCommand::Stop {
                flush,
                close,
                reply,
            } => {
                // Reaching here means the loop has already settled.
                self.driver.settle_sink(flush, close).await;
                let _ = reply.send(());
            }
            EngineCommand::Pause { reply } => {
                self.driver.set_paused(true);
                let _ = reply.send(());
            }
            EngineCommand::Skip { count, reply } => {
                self.driver.skip(count);
                if self.driver.is_streaming() {
                    debug!("{} skip(s) pending", self.driver.skip_count());
                }
                let _ = reply.send(());
            }
            EngineCommand::SeekTo {
                position,
                enforce,
                reply,
            } => {
                let applied = (self.driver.is_streaming() || enforce) && self.seek(position);
                let _ = reply.send(applied);
            }
            EngineCommand::SeekBy { delta_ms, reply } => {
                let applied = self.driver.is_streaming() && self.seek_by(delta_ms);
                let _ = reply.send(applied);
            }
            EngineCommand::SetPitch { factor, reply } => {
                self.effects.set_pitch(factor, self.pipeline.as_mut());
                let _ = reply.send(());
            }
            EngineCommand::SetBoost { enabled, reply } => {
                self.effects.set_boost(enabled);
                let _ = reply.send(());
            }
            EngineCommand::SetVolume { volume, reply } => {
                self.driver.set_volume(volume);
                let _ = reply.send(());
            }
            EngineCommand::SetLoop { enabled, reply } => {
                self.driver.set_looping(enabled);
                self.events.emit(EngineEvent::LoopStateChanged(enabled));
                let _ = reply.send(());
            }
            EngineCommand::SetActivity { activity, reply } => {
                let _ = reply.send(self.conn.set_activity(&activity).await);
            }
            EngineCommand::ListVoiceChannels { reply } => {
                let _ = reply.send(self.conn.list_voice_channels().await);
            }
            EngineCommand::ListMembers {
                include_offline,
                reply,
            } => {
                let _ = reply.send(self.conn.list_members(include_offline).await);
            }
            EngineCommand::LinkLost => {
                if self.conn.tier() == ConnectionTier::ChannelConnected && !self.conn.link_alive()
                {
                    warn!("voice link lost, dropping back to server tier");
                    self.disconnect_channel().await;
                }
            }
            EngineCommand::Shutdown { reply } => {
                let _ = reply.send(());
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    async fn connect_server(&mut self, credential: &str) -> Result<(), ConnectionError> {
        if self.conn.tier() >= ConnectionTier::ServerConnected {
            self.disconnect_server().await;
        }
        self.conn.connect_server(credential).await
    }

    async fn connect_channel(&mut self, channel: ChannelId) -> Result<(), ConnectionError> {
        self.conn.require(ConnectionTier::ServerConnected)?;
        if self.conn.tier() == ConnectionTier::ChannelConnected {
            self.disconnect_channel().await;
        }
        self.conn.connect_channel(channel).await
    }

    /// Drop the channel tier. The stream is already idle at this point, so
    /// stopping it reduces to closing the send handle.
    async fn disconnect_channel(&mut self) {
        if self.conn.tier() < ConnectionTier::ChannelConnected {
            return;
        }
        self.driver.settle_sink(false, true).await;
        self.conn.disconnect_channel().await;
    }

    async fn disconnect_server(&mut self) {
        if self.conn.tier() == ConnectionTier::Disconnected {
            return;
        }
        self.disconnect_channel().await;
        self.conn.disconnect_server().await;
    }

    async fn load(&mut self, request: PlaybackRequest) -> Result<(), LoadError> {
        let span = info_span!("load", track = %request.name);
        let resolver = self.resolver.clone();
        let locator = request.locator.clone();

        let built = tokio::task::spawn_blocking(move || {
            let source = resolver.resolve(&locator)?;
            Ok::<_, LoadError>(SourceStage::new(source)?)
        })
        .instrument(span)
        .await
        .map_err(|e| LoadError::Pipeline(PipelineError::Unsupported(format!("loader failed: {e}"))))
        .and_then(|res| res);

        let stage = match built {
            Ok(stage) => stage,
            Err(e) => {
                warn!(track = %request.name, "load rejected, keeping previous track: {}", e);
                return Err(e);
            }
        };

        let pipeline = self.effects.build_pipeline(stage, &request.name);
        info!(
            track = %request.name,
            "loaded (seekable={}, duration={:?})",
            pipeline.can_seek(),
            pipeline.duration()
        );
        self.pipeline = Some(pipeline);
        self.driver.reset_buffer_empty();

        self.effects.apply_load_boost(request.boost);
        self.driver.set_looping(request.looping);
        self.events
            .emit(EngineEvent::LoopStateChanged(request.looping));
        self.publish_position();
        Ok(())
    }

    /// Returns `Ok(true)` when the loop should run.
    async fn start(&mut self) -> Result<bool, ConnectionError> {
        self.conn.require(ConnectionTier::ChannelConnected)?;
        let Some(link) = self.conn.link() else {
            return Err(ConnectionError::NoChannel);
        };
        self.driver.open_sink(link).await?;

        let Some(pipeline) = self.pipeline.as_ref() else {
            debug!("start with nothing loaded");
            self.driver.close_sink().await;
            return Ok(false);
        };

        let track = pipeline.track().to_string();
        self.driver.set_paused(false);
        self.driver.set_streaming(true, &track);
        info!("streaming '{}'", track);
        Ok(true)
    }

    /// The transmission loop. Runs until a terminal exit.
    async fn stream(&mut self) {
        loop {
            let (exit, wrote) = self.pump().await;

            let track = self
                .pipeline
                .as_ref()
                .map(|p| p.track().to_string())
                .unwrap_or_default();
            self.driver.set_streaming(false, &track);

            let can_loop = self.pipeline.as_ref().is_some_and(|p| p.can_seek());
            // An empty pass would loop without ever awaiting the sink.
            if exit == Exit::Natural
                && wrote
                && self.driver.is_looping()
                && can_loop
                && self.seek(Duration::ZERO)
            {
                debug!("looping '{}'", track);
                self.driver.set_streaming(true, &track);
                tokio::task::yield_now().await;
                continue;
            }

            if exit == Exit::Skip {
                self.driver.consume_skip();
            }
            let eof = self.driver.finish().await;
            info!("stream of '{}' ended ({:?}, eof={})", track, exit, eof);
            self.publish_position();
            break;
        }
    }

    /// One pass over the source: blocks out until exhaustion, abort or skip.
    /// Also reports whether the pass wrote anything.
    async fn pump(&mut self) -> (Exit, bool) {
        let mut wrote = false;
        loop {
            let Some(pipeline) = self.pipeline.as_mut() else {
                return (Exit::Natural, wrote);
            };
            let outcome = self
                .driver
                .pump_block(pipeline, self.effects.boost())
                .await;
            wrote |= matches!(outcome, BlockOutcome::Written | BlockOutcome::Last);

            self.drain_commands().await;
            if Instant::now() >= self.next_health {
                self.health_check().await;
            }
            self.publish_position();

            if self.driver.abort_requested() {
                return (Exit::Abort, wrote);
            }
            if self.driver.skip_count() > 0 {
                return (Exit::Skip, wrote);
            }
            match outcome {
                BlockOutcome::Written => {}
                BlockOutcome::Last | BlockOutcome::Exhausted => return (Exit::Natural, wrote),
                BlockOutcome::Failed => return (Exit::Abort, wrote),
            }
        }
    }

    /// Apply everything that arrived while the last block was in flight.
    async fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                // Start is parked or a no-op while streaming, so the flow is always Continue.
                Ok(cmd) => {
                    self.handle(cmd).await;
                }
                Err(TryRecvError::Disconnected) => {
                    self.driver.request_abort();
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
    }

    async fn health_check(&mut self) {
        self.next_health = Instant::now() + self.health_interval;
        if self.conn.link_alive() {
            return;
        }
        if self.driver.is_streaming() {
            self.driver.request_abort();
            self.deferred.push_back(EngineCommand::LinkLost);
        } else {
            self.handle(EngineCommand::LinkLost).await;
        }
    }

    fn seek(&mut self, position: Duration) -> bool {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return false;
        };
        if !pipeline.can_seek() {
            return false;
        }
        match pipeline.seek(position) {
            Ok(reached) => {
                debug!("seeked '{}' to {:?}", pipeline.track(), reached);
                self.publish_position();
                true
            }
            Err(e) => {
                warn!("seek on '{}' failed: {}", pipeline.track(), e);
                false
            }
        }
    }

    fn seek_by(&mut self, delta_ms: i64) -> bool {
        let Some(current) = self.pipeline.as_ref().map(|p| p.position()) else {
            return false;
        };
        let delta = Duration::from_millis(delta_ms.unsigned_abs());
        let target = if delta_ms >= 0 {
            current + delta
        } else {
            current.saturating_sub(delta)
        };
        self.seek(target)
    }

    fn publish_position(&self) {
        let (position, duration) = self
            .pipeline
            .as_ref()
            .map(|p| (p.position(), p.duration().unwrap_or_default()))
            .unwrap_or_default();
        self.status.set_position(position, duration);
    }
}
