use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::info;

use super::{GuildVoiceChannels, PcmSink, VoiceChannelInfo, VoiceLink, VoiceTransport};
use crate::common::{
    errors::TransportError,
    types::{ChannelId, GuildId},
};

/// Writes the outgoing stream to a raw PCM file (s16le, 48 kHz, stereo).
///
/// Every channel "exists"; joining one truncates the dump file. Play it back
/// with e.g. `ffplay -f s16le -ar 48000 -ac 2 voxboard.pcm`.
pub struct DumpTransport {
    path: PathBuf,
    logged_in: AtomicBool,
    joined: Arc<Mutex<Option<ChannelId>>>,
}

impl DumpTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            logged_in: AtomicBool::new(false),
            joined: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl VoiceTransport for DumpTransport {
    async fn login(&self, credential: &str) -> Result<(), TransportError> {
        if credential.is_empty() {
            return Err(TransportError::Rejected("empty token".into()));
        }
        self.logged_in.store(true, Ordering::Release);
        Ok(())
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.logged_in.store(false, Ordering::Release);
        *self.joined.lock() = None;
        Ok(())
    }

    async fn join(&self, channel: ChannelId) -> Result<Box<dyn VoiceLink>, TransportError> {
        if !self.logged_in.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        File::create(&self.path).await?;
        *self.joined.lock() = Some(channel);
        info!("dumping channel {} to {}", channel, self.path.display());
        Ok(Box::new(DumpLink {
            path: self.path.clone(),
            channel,
            joined: self.joined.clone(),
        }))
    }

    async fn list_voice_channels(&self) -> Result<Vec<GuildVoiceChannels>, TransportError> {
        let current = *self.joined.lock();
        Ok(vec![GuildVoiceChannels {
            guild: GuildId(0),
            name: "dump".into(),
            channels: current
                .map(|id| VoiceChannelInfo {
                    id,
                    name: self.path.display().to_string(),
                })
                .into_iter()
                .collect(),
        }])
    }
}

struct DumpLink {
    path: PathBuf,
    channel: ChannelId,
    joined: Arc<Mutex<Option<ChannelId>>>,
}

#[async_trait]
impl VoiceLink for DumpLink {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn is_connected(&self) -> bool {
        *self.joined.lock() == Some(self.channel)
    }

    async fn open_sink(&self) -> Result<Box<dyn PcmSink>, TransportError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(Box::new(DumpSink {
            writer: Some(BufWriter::new(file)),
        }))
    }

    async fn leave(&self) -> Result<(), TransportError> {
        let mut joined = self.joined.lock();
        if *joined == Some(self.channel) {
            *joined = None;
        }
        Ok(())
    }
}

struct DumpSink {
    writer: Option<BufWriter<File>>,
}

#[async_trait]
impl PcmSink for DumpSink {
    async fn write(&mut self, block: &[u8]) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(block).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_land_in_the_dump_file() {
        let path = std::env::temp_dir().join(format!("voxboard-{}.pcm", uuid::Uuid::new_v4()));
        let transport = DumpTransport::new(&path);
        assert!(transport.login("").await.is_err());
        transport.login("token").await.unwrap();

        let link = transport.join(ChannelId(3)).await.unwrap();
        let mut sink = link.open_sink().await.unwrap();
        sink.write(&[1, 2, 3, 4]).await.unwrap();
        sink.close().await.unwrap();

        let mut sink = link.open_sink().await.unwrap();
        sink.write(&[5, 6]).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        link.leave().await.unwrap();
        assert!(!link.is_connected());
        std::fs::remove_file(path).ok();
    }
}
