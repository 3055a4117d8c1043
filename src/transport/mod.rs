//! Collaborator contract for the voice service.
//!
//! ```text
//! VoiceTransport ── login / logout / directory queries
//!      │ join(channel)
//!      ▼
//!  VoiceLink ────── leave, liveness
//!      │ open_sink()
//!      ▼
//!  PcmSink ──────── 3840-byte blocks of 48 kHz stereo s16le, flush, close
//! ```

pub mod dump;
pub mod memory;
pub mod paced;

use async_trait::async_trait;

pub use dump::DumpTransport;
pub use memory::MemoryTransport;
pub use paced::PacedSink;

use crate::common::{
    errors::TransportError,
    types::{ChannelId, GuildId},
};

/// Raw PCM output into a joined voice channel.
#[async_trait]
pub trait PcmSink: Send {
    /// Queue one block. May wait for transport backpressure.
    async fn write(&mut self, block: &[u8]) -> Result<(), TransportError>;

    /// Wait until everything written so far has been played out.
    async fn flush(&mut self) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A joined voice channel.
#[async_trait]
pub trait VoiceLink: Send + Sync {
    fn channel(&self) -> ChannelId;

    /// Live connectivity as reported by the transport.
    fn is_connected(&self) -> bool;

    async fn open_sink(&self) -> Result<Box<dyn PcmSink>, TransportError>;

    async fn leave(&self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Watching,
    Streaming,
}

/// Presence shown next to the client's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub text: String,
    pub stream_url: Option<String>,
}

impl Activity {
    /// A stream URL turns the activity into a streaming one.
    pub fn new(text: impl Into<String>, stream_url: Option<String>) -> Self {
        let stream_url = stream_url.filter(|u| !u.is_empty());
        Self {
            kind: if stream_url.is_some() {
                ActivityKind::Streaming
            } else {
                ActivityKind::Watching
            },
            text: text.into(),
            stream_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannelInfo {
    pub id: ChannelId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildVoiceChannels {
    pub guild: GuildId,
    pub name: String,
    pub channels: Vec<VoiceChannelInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub user_id: u64,
    pub name: String,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMembers {
    pub guild: GuildId,
    pub members: Vec<GuildMember>,
}

/// Session with the voice service.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn login(&self, credential: &str) -> Result<(), TransportError>;

    async fn logout(&self) -> Result<(), TransportError>;

    async fn join(&self, channel: ChannelId) -> Result<Box<dyn VoiceLink>, TransportError>;

    async fn set_activity(&self, _activity: &Activity) -> Result<(), TransportError> {
        Ok(())
    }

    async fn list_voice_channels(&self) -> Result<Vec<GuildVoiceChannels>, TransportError> {
        Ok(Vec::new())
    }

    async fn list_members(
        &self,
        _include_offline: bool,
    ) -> Result<Vec<GuildMembers>, TransportError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_selects_streaming_activity() {
        let a = Activity::new("lofi", Some("https://twitch.tv/x".into()));
        assert_eq!(a.kind, ActivityKind::Streaming);

        let b = Activity::new("the chat", Some(String::new()));
        assert_eq!(b.kind, ActivityKind::Watching);
        assert_eq!(b.stream_url, None);
    }
}
