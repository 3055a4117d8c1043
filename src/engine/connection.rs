use std::{future::Future, sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use super::{
    events::{EngineEvent, EventHub},
    status::EngineStatus,
};
use crate::{
    common::{
        errors::{ConnectionError, TransportError},
        types::ChannelId,
    },
    transport::{Activity, GuildMembers, GuildVoiceChannels, VoiceLink, VoiceTransport},
};

/// Two-level connection state. `ChannelConnected` implies `ServerConnected`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectionTier {
    #[default]
    Disconnected = 0,
    ServerConnected = 1,
    ChannelConnected = 2,
}

impl ConnectionTier {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ServerConnected,
            2 => Self::ChannelConnected,
            _ => Self::Disconnected,
        }
    }
}

/// Owns the transport session and the joined voice link.
///
/// Only moves one tier at a time. Cascading (dropping the channel before the
/// server, stopping the stream before the channel) is the caller's job; every
/// method here assumes the tier below it has already settled.
pub struct ConnectionManager {
    transport: Arc<dyn VoiceTransport>,
    link: Option<Box<dyn VoiceLink>>,
    tier: ConnectionTier,
    timeout: Duration,
    events: Arc<EventHub>,
    status: Arc<EngineStatus>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        timeout: Duration,
        events: Arc<EventHub>,
        status: Arc<EngineStatus>,
    ) -> Self {
        Self {
            transport,
            link: None,
            tier: ConnectionTier::Disconnected,
            timeout,
            events,
            status,
        }
    }

    pub fn tier(&self) -> ConnectionTier {
        self.tier
    }

    pub fn link(&self) -> Option<&dyn VoiceLink> {
        self.link.as_deref()
    }

    /// Fails with the error matching the first missing tier.
    pub fn require(&self, tier: ConnectionTier) -> Result<(), ConnectionError> {
        if tier >= ConnectionTier::ServerConnected && self.tier < ConnectionTier::ServerConnected {
            return Err(ConnectionError::NoServer);
        }
        if tier == ConnectionTier::ChannelConnected && self.tier < ConnectionTier::ChannelConnected
        {
            return Err(ConnectionError::NoChannel);
        }
        Ok(())
    }

    fn set_tier(&mut self, tier: ConnectionTier) {
        if self.tier != tier {
            debug!("connection tier {:?} -> {:?}", self.tier, tier);
            self.tier = tier;
            self.status.set_tier(tier);
            self.events.emit(EngineEvent::TierChanged(tier));
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ConnectionError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(ConnectionError::from),
            Err(_) => Err(ConnectionError::Timeout(self.timeout)),
        }
    }

    /// Log in. Expects the tier to be `Disconnected`.
    pub async fn connect_server(&mut self, credential: &str) -> Result<(), ConnectionError> {
        self.bounded(self.transport.login(credential)).await?;
        info!("connected to voice service");
        self.set_tier(ConnectionTier::ServerConnected);
        Ok(())
    }

    /// Join `channel`. Expects any previous channel to be gone already.
    pub async fn connect_channel(&mut self, channel: ChannelId) -> Result<(), ConnectionError> {
        self.require(ConnectionTier::ServerConnected)?;
        let link = self.bounded(self.transport.join(channel)).await?;
        info!("joined voice channel {}", channel);
        self.link = Some(link);
        self.set_tier(ConnectionTier::ChannelConnected);
        Ok(())
    }

    /// Leave the current channel. No-op below `ChannelConnected`.
    pub async fn disconnect_channel(&mut self) {
        if self.tier < ConnectionTier::ChannelConnected {
            return;
        }
        if let Some(link) = self.link.take() {
            let channel = link.channel();
            match self.bounded(link.leave()).await {
                Ok(()) => info!("left voice channel {}", channel),
                Err(e) => warn!("leaving channel {} failed: {}", channel, e),
            }
        }
        self.set_tier(ConnectionTier::ServerConnected);
    }

    /// Log out. Expects the channel tier to be gone already.
    pub async fn disconnect_server(&mut self) {
        if self.tier == ConnectionTier::Disconnected {
            return;
        }
        match self.bounded(self.transport.logout()).await {
            Ok(()) => info!("disconnected from voice service"),
            Err(e) => warn!("logout failed: {}", e),
        }
        self.set_tier(ConnectionTier::Disconnected);
    }

    /// Whether the joined link still reports itself alive. Always `true`
    /// below `ChannelConnected`.
    pub fn link_alive(&self) -> bool {
        match (&self.link, self.tier) {
            (Some(link), ConnectionTier::ChannelConnected) => link.is_connected(),
            (None, ConnectionTier::ChannelConnected) => false,
            _ => true,
        }
    }

    pub async fn set_activity(&self, activity: &Activity) -> Result<(), ConnectionError> {
        self.require(ConnectionTier::ServerConnected)?;
        self.bounded(self.transport.set_activity(activity)).await
    }

    pub async fn list_voice_channels(&self) -> Result<Vec<GuildVoiceChannels>, ConnectionError> {
        self.require(ConnectionTier::ServerConnected)?;
        self.bounded(self.transport.list_voice_channels()).await
    }

    pub async fn list_members(
        &self,
        include_offline: bool,
    ) -> Result<Vec<GuildMembers>, ConnectionError> {
        self.require(ConnectionTier::ServerConnected)?;
        self.bounded(self.transport.list_members(include_offline))
            .await
    }
}
