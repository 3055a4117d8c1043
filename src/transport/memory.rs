//! In-process transport that records everything written to it.
//!
//! Handy as a loopback target and as the collaborator in tests: every block,
//! flush and close is kept so callers can assert on the exact wire output.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    Activity, GuildMembers, GuildVoiceChannels, PcmSink, VoiceLink, VoiceTransport,
};
use crate::common::{errors::TransportError, types::ChannelId};

#[derive(Default)]
struct MemoryState {
    logged_in: bool,
    credential: Option<String>,
    rejected_credential: Option<String>,
    joined: Option<ChannelId>,
    link_alive: bool,
    join_delay: Option<Duration>,
    write_delay: Option<Duration>,
    blocks: Vec<Vec<u8>>,
    flushes: usize,
    closes: usize,
    sinks_opened: usize,
    activity: Option<Activity>,
    directory: Vec<GuildVoiceChannels>,
    members: Vec<GuildMembers>,
}

/// Cloning shares the recorded state.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse logins that present `credential`.
    pub fn reject(self, credential: impl Into<String>) -> Self {
        self.state.lock().rejected_credential = Some(credential.into());
        self
    }

    /// Delay every `join` call, e.g. to exercise connect timeouts.
    pub fn with_join_delay(self, delay: Duration) -> Self {
        self.state.lock().join_delay = Some(delay);
        self
    }

    /// Hold every sink write for `delay`, standing in for network latency.
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state.lock().write_delay = Some(delay);
        self
    }

    pub fn with_directory(self, directory: Vec<GuildVoiceChannels>) -> Self {
        self.state.lock().directory = directory;
        self
    }

    pub fn with_members(self, members: Vec<GuildMembers>) -> Self {
        self.state.lock().members = members;
        self
    }

    /// Simulate the voice connection dropping (or recovering).
    pub fn set_link_alive(&self, alive: bool) {
        self.state.lock().link_alive = alive;
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }

    pub fn credential(&self) -> Option<String> {
        self.state.lock().credential.clone()
    }

    pub fn joined(&self) -> Option<ChannelId> {
        self.state.lock().joined
    }

    pub fn blocks(&self) -> Vec<Vec<u8>> {
        self.state.lock().blocks.clone()
    }

    pub fn block_count(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn sinks_opened(&self) -> usize {
        self.state.lock().sinks_opened
    }

    pub fn activity(&self) -> Option<Activity> {
        self.state.lock().activity.clone()
    }
}

#[async_trait]
impl VoiceTransport for MemoryTransport {
    async fn login(&self, credential: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.rejected_credential.as_deref() == Some(credential) {
            return Err(TransportError::Rejected("invalid token".into()));
        }
        state.logged_in = true;
        state.credential = Some(credential.to_string());
        Ok(())
    }

    async fn logout(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.logged_in = false;
        state.joined = None;
        state.link_alive = false;
        Ok(())
    }

    async fn join(&self, channel: ChannelId) -> Result<Box<dyn VoiceLink>, TransportError> {
        let delay = self.state.lock().join_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if !state.logged_in {
            return Err(TransportError::Closed);
        }
        state.joined = Some(channel);
        state.link_alive = true;
        debug!("memory transport joined {}", channel);
        Ok(Box::new(MemoryLink {
            state: self.state.clone(),
            channel,
        }))
    }

    async fn set_activity(&self, activity: &Activity) -> Result<(), TransportError> {
        self.state.lock().activity = Some(activity.clone());
        Ok(())
    }

    async fn list_voice_channels(&self) -> Result<Vec<GuildVoiceChannels>, TransportError> {
        Ok(self.state.lock().directory.clone())
    }

    async fn list_members(
        &self,
        include_offline: bool,
    ) -> Result<Vec<GuildMembers>, TransportError> {
        let state = self.state.lock();
        Ok(state
            .members
            .iter()
            .map(|g| GuildMembers {
                guild: g.guild,
                members: g
                    .members
                    .iter()
                    .filter(|m| include_offline || m.online)
                    .cloned()
                    .collect(),
            })
            .collect())
    }
}

struct MemoryLink {
    state: Arc<Mutex<MemoryState>>,
    channel: ChannelId,
}

#[async_trait]
impl VoiceLink for MemoryLink {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.link_alive && state.joined == Some(self.channel)
    }

    async fn open_sink(&self) -> Result<Box<dyn PcmSink>, TransportError> {
        let mut state = self.state.lock();
        if state.joined != Some(self.channel) {
            return Err(TransportError::Closed);
        }
        state.sinks_opened += 1;
        Ok(Box::new(MemorySink {
            state: self.state.clone(),
            closed: false,
        }))
    }

    async fn leave(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.joined == Some(self.channel) {
            state.joined = None;
            state.link_alive = false;
        }
        Ok(())
    }
}

struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

#[async_trait]
impl PcmSink for MemorySink {
    async fn write(&mut self, block: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let delay = self.state.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().blocks.push(block.to_vec());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.state.lock().closes += 1;
        }
        Ok(())
    }
}
