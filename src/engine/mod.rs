//! Voice streaming engine.
//!
//! ```text
//!   Engine (cloneable handle)
//!      │ EngineCommand over a bounded flume queue, oneshot replies
//!      ▼
//!   EngineActor ── ConnectionManager ── VoiceTransport / VoiceLink
//!      │        ── EffectController  ── AudioPipeline (pitch / boost chains)
//!      │        ── StreamDriver      ── PcmSink (3840-byte blocks, 20 ms)
//!      ▼
//!   EventHub (broadcast) + EngineStatus (atomics)
//! ```
//!
//! Control calls never touch engine state directly; the actor applies them
//! between blocks. Status reads go to atomics published by the actor.

pub mod actor;
pub mod connection;
pub mod driver;
pub mod effects;
pub mod events;
pub mod status;

use std::{sync::Arc, time::Duration};

use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use actor::{EngineActor, EngineCommand};
pub use connection::{ConnectionManager, ConnectionTier};
pub use driver::{BlockOutcome, StreamDriver, apply_volume};
pub use effects::EffectController;
pub use events::{EngineEvent, EventHub};
pub use status::{EngineStatus, StatusSnapshot};

pub use crate::audio::source::SourceLocator;
use crate::{
    audio::{DefaultResolver, SourceResolver},
    common::{errors::EngineError, types::ChannelId},
    configs::EngineConfig,
    transport::{Activity, GuildMembers, GuildVoiceChannels, VoiceTransport},
};

/// A track handed to [`Engine::load`]. Never modified by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub name: String,
    pub locator: SourceLocator,
    pub looping: bool,
    pub boost: bool,
    pub id: u64,
    pub author: String,
}

impl PlaybackRequest {
    pub fn new(name: impl Into<String>, locator: SourceLocator) -> Self {
        Self {
            name: name.into(),
            locator,
            ..Default::default()
        }
    }

    pub fn looping(mut self, on: bool) -> Self {
        self.looping = on;
        self
    }

    pub fn boosted(mut self, on: bool) -> Self {
        self.boost = on;
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// Handle to a running engine task. Cheap to clone; the task stops (and
/// disconnects) once every handle is dropped or [`Engine::shutdown`] is called.
#[derive(Clone)]
pub struct Engine {
    commands: flume::Sender<EngineCommand>,
    events: Arc<EventHub>,
    status: Arc<EngineStatus>,
}

impl Engine {
    /// Spawn an engine on the current tokio runtime with the default resolver.
    pub fn spawn(transport: Arc<dyn VoiceTransport>, config: EngineConfig) -> Self {
        Self::with_resolver(transport, Arc::new(DefaultResolver::new()), config)
    }

    pub fn with_resolver(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn SourceResolver>,
        config: EngineConfig,
    ) -> Self {
        let (tx, rx) = flume::bounded(config.command_queue.max(1));
        let events = Arc::new(EventHub::new(config.event_capacity));
        let status = Arc::new(EngineStatus::new(config.pitch, config.volume));

        let actor = EngineActor::new(
            rx,
            transport,
            resolver,
            &config,
            events.clone(),
            status.clone(),
        );
        tokio::spawn(actor.run());
        debug!("engine spawned");

        Self {
            commands: tx,
            events,
            status,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send_async(make(tx))
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn connect_server(&self, credential: &str) -> Result<(), EngineError> {
        let credential = credential.to_string();
        Ok(self
            .request(|reply| EngineCommand::ConnectServer { credential, reply })
            .await??)
    }

    pub async fn connect_channel(&self, channel: impl Into<ChannelId>) -> Result<(), EngineError> {
        let channel = channel.into();
        Ok(self
            .request(|reply| EngineCommand::ConnectChannel { channel, reply })
            .await??)
    }

    pub async fn disconnect_channel(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::DisconnectChannel { reply })
            .await
    }

    pub async fn disconnect_server(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::DisconnectServer { reply })
            .await
    }

    /// Replace the current track. On failure the previous track stays loaded.
    pub async fn load(&self, request: PlaybackRequest) -> Result<(), EngineError> {
        Ok(self
            .request(|reply| EngineCommand::Load { request, reply })
            .await??)
    }

    /// Begin streaming the loaded track. Returns once streaming has begun,
    /// or immediately if it already runs or nothing is loaded.
    pub async fn start(&self) -> Result<(), EngineError> {
        Ok(self.request(|reply| EngineCommand::Start { reply }).await??)
    }

    /// Alias of [`Engine::start`]; continues from the current position.
    pub async fn resume(&self) -> Result<(), EngineError> {
        self.start().await
    }

    /// Stop streaming and wait for the loop to settle.
    pub async fn stop(&self, flush: bool, close: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Stop {
            flush,
            close,
            reply,
        })
        .await
    }

    /// Stop without announcing end-of-file. The position is kept.
    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Pause { reply }).await
    }

    pub async fn skip(&self, count: u32) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Skip { count, reply })
            .await
    }

    /// Returns whether the seek was applied.
    pub async fn seek_to(&self, position: Duration, enforce: bool) -> Result<bool, EngineError> {
        self.request(|reply| EngineCommand::SeekTo {
            position,
            enforce,
            reply,
        })
        .await
    }

    /// Seek relative to the current position. Only applies while streaming.
    pub async fn seek_by(&self, delta_ms: i64) -> Result<bool, EngineError> {
        self.request(|reply| EngineCommand::SeekBy { delta_ms, reply })
            .await
    }

    pub async fn set_pitch(&self, factor: f32) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetPitch { factor, reply })
            .await
    }

    pub async fn set_boost(&self, enabled: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetBoost { enabled, reply })
            .await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetVolume { volume, reply })
            .await
    }

    pub async fn set_loop(&self, enabled: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetLoop { enabled, reply })
            .await
    }

    pub async fn set_activity(
        &self,
        text: &str,
        stream_url: Option<&str>,
    ) -> Result<(), EngineError> {
        let activity = Activity::new(text, stream_url.map(str::to_string));
        Ok(self
            .request(|reply| EngineCommand::SetActivity { activity, reply })
            .await??)
    }

    pub async fn list_voice_channels(&self) -> Result<Vec<GuildVoiceChannels>, EngineError> {
        Ok(self
            .request(|reply| EngineCommand::ListVoiceChannels { reply })
            .await??)
    }

    pub async fn list_members(
        &self,
        include_offline: bool,
    ) -> Result<Vec<GuildMembers>, EngineError> {
        Ok(self
            .request(|reply| EngineCommand::ListMembers {
                include_offline,
                reply,
            })
            .await??)
    }

    /// Stop the engine task after disconnecting.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Shutdown { reply })
            .await
    }

    pub fn tier(&self) -> ConnectionTier {
        self.status.tier()
    }

    pub fn is_streaming(&self) -> bool {
        self.status.is_streaming()
    }

    pub fn current_time(&self) -> Duration {
        self.status.position()
    }

    pub fn total_time(&self) -> Duration {
        self.status.duration()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }
}
