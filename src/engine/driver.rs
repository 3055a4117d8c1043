use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace, warn};

use super::{
    events::{EngineEvent, EventHub},
    status::EngineStatus,
};
use crate::{
    audio::{AudioPipeline, constants::BLOCK_SIZE},
    common::errors::TransportError,
    transport::{PacedSink, PcmSink, VoiceLink},
};

/// Result of pushing one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// A full block went out.
    Written,
    /// The final, zero-padded block went out; the source is drained.
    Last,
    /// Nothing left to read; no block was written.
    Exhausted,
    /// The pipeline or the sink failed; treat as end of stream.
    Failed,
}

/// State of the transmission loop: the flags the loop observes between
/// blocks, the volume, the send handle and the reusable block buffer.
pub struct StreamDriver {
    streaming: bool,
    paused: bool,
    abort: bool,
    skip_count: u32,
    looping: bool,
    volume: f32,
    buffer_empty: bool,
    pace_output: bool,
    sink: Option<Box<dyn PcmSink>>,
    block: Vec<u8>,
    events: Arc<EventHub>,
    status: Arc<EngineStatus>,
}

impl StreamDriver {
    pub fn new(
        volume: f32,
        pace_output: bool,
        events: Arc<EventHub>,
        status: Arc<EngineStatus>,
    ) -> Self {
        status.set_volume(volume);
        Self {
            streaming: false,
            paused: false,
            abort: false,
            skip_count: 0,
            looping: false,
            volume,
            buffer_empty: true,
            pace_output,
            sink: None,
            block: vec![0; BLOCK_SIZE],
            events,
            status,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn abort_requested(&self) -> bool {
        self.abort
    }

    pub fn skip_count(&self) -> u32 {
        self.skip_count
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Flip the streaming flag, notifying on every actual transition.
    pub fn set_streaming(&mut self, on: bool, track: &str) {
        if self.streaming == on {
            return;
        }
        self.streaming = on;
        self.status.set_streaming(on);
        self.events.emit(EngineEvent::StreamStateChanged {
            streaming: on,
            track: track.to_string(),
        });
    }

    pub fn set_paused(&mut self, on: bool) {
        self.paused = on;
        self.status.set_paused(on);
    }

    pub fn request_abort(&mut self) {
        self.abort = true;
    }

    pub fn set_looping(&mut self, on: bool) {
        self.looping = on;
        self.status.set_looping(on);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
        self.status.set_volume(self.volume);
    }

    pub fn reset_buffer_empty(&mut self) {
        self.buffer_empty = false;
        self.status.set_buffer_empty(false);
    }

    /// Queue `n` skips. Ignored unless streaming.
    pub fn skip(&mut self, n: u32) {
        if self.streaming {
            self.skip_count = self.skip_count.saturating_add(n);
            self.status.set_skip_count(self.skip_count);
        }
    }

    /// Consume the skip that caused the current break.
    pub fn consume_skip(&mut self) {
        self.skip_count = self.skip_count.saturating_sub(1);
        self.status.set_skip_count(self.skip_count);
    }

    /// Open the send handle on `link` unless one is already open.
    pub async fn open_sink(&mut self, link: &dyn VoiceLink) -> Result<(), TransportError> {
        if self.sink.is_none() {
            let raw = link.open_sink().await?;
            let sink: Box<dyn PcmSink> = if self.pace_output {
                Box::new(PacedSink::new(raw))
            } else {
                raw
            };
            self.sink = Some(sink);
            debug!("send handle opened on channel {}", link.channel());
        }
        Ok(())
    }

    /// Close and drop the send handle, if any.
    pub async fn close_sink(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close().await {
                warn!("closing send handle failed: {}", e);
            }
        }
    }

    /// Apply `stop` flags to whatever handle is still open.
    pub async fn settle_sink(&mut self, flush: bool, close: bool) {
        if flush {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.flush().await {
                    warn!("flushing send handle failed: {}", e);
                }
            }
        }
        if close {
            self.close_sink().await;
        }
    }

    /// Read one block from the active chain and write it out.
    pub async fn pump_block(&mut self, pipeline: &mut AudioPipeline, boost: bool) -> BlockOutcome {
        let read = match pipeline.read_block(boost, &mut self.block) {
            Ok(n) => n,
            Err(e) => {
                warn!("pipeline read failed on '{}': {}", pipeline.track(), e);
                return BlockOutcome::Failed;
            }
        };
        if read == 0 {
            return BlockOutcome::Exhausted;
        }

        if !boost {
            apply_volume(&mut self.block[..read], self.volume);
        }

        let last = read < BLOCK_SIZE;
        if last {
            self.block[read..].fill(0);
            self.buffer_empty = true;
            self.status.set_buffer_empty(true);
        }

        let Some(sink) = self.sink.as_mut() else {
            warn!("no send handle while streaming '{}'", pipeline.track());
            return BlockOutcome::Failed;
        };
        if let Err(e) = sink.write(&self.block).await {
            warn!("send handle write failed: {}", e);
            return BlockOutcome::Failed;
        }
        trace!("block out ({} bytes read)", read);

        if last {
            BlockOutcome::Last
        } else {
            BlockOutcome::Written
        }
    }

    /// Terminal exit of the loop. Returns whether end-of-file was announced.
    pub async fn finish(&mut self) -> bool {
        self.skip_count = 0;
        self.status.set_skip_count(0);

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush().await {
                warn!("flushing send handle failed: {}", e);
            }
        }
        self.close_sink().await;
        self.abort = false;

        if self.paused {
            debug!("stream stopped by pause, end-of-file suppressed");
            false
        } else {
            self.events.emit(EngineEvent::EndOfFile);
            true
        }
    }
}

/// Scale every little-endian 16-bit sample in `block` by `volume`.
///
/// Float to integer casts saturate, so overdriven samples clip at the 16-bit
/// range instead of wrapping.
pub fn apply_volume(block: &mut [u8], volume: f32) {
    for pair in block.chunks_exact_mut(2) {
        let s = LittleEndian::read_i16(pair);
        LittleEndian::write_i16(pair, (s as f32 * volume) as i16);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        audio::{MemorySource, PitchStage, SourceStage},
        common::types::ChannelId,
        transport::{MemoryTransport, VoiceTransport},
    };

    fn pipeline(samples: Vec<i16>) -> AudioPipeline {
        let stage = SourceStage::new(Box::new(MemorySource::new(samples, 48_000, 2))).unwrap();
        let source = Arc::new(parking_lot::Mutex::new(stage));
        let pitch = PitchStage::new(source.clone(), 1.0);
        AudioPipeline::assemble(source, pitch, "clip")
    }

    async fn driver_with_sink() -> (StreamDriver, MemoryTransport, Arc<EventHub>) {
        let transport = MemoryTransport::new();
        transport.login("t").await.unwrap();
        let link = transport.join(ChannelId(1)).await.unwrap();
        let hub = Arc::new(EventHub::new(16));
        let mut driver =
            StreamDriver::new(1.0, false, hub.clone(), Arc::new(EngineStatus::default()));
        driver.open_sink(link.as_ref()).await.unwrap();
        (driver, transport, hub)
    }

    #[test]
    fn volume_truncates_toward_zero() {
        let mut block = Vec::new();
        for s in [1_000i16, -1_001, 3, i16::MAX] {
            block.extend_from_slice(&s.to_le_bytes());
        }
        apply_volume(&mut block, 0.5);
        let out: Vec<i16> = block
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(out, vec![500, -500, 1, 16_383]);
    }

    #[test]
    fn volume_saturates() {
        let mut block = 20_000i16.to_le_bytes().to_vec();
        apply_volume(&mut block, 4.0);
        assert_eq!(i16::from_le_bytes([block[0], block[1]]), i16::MAX);
    }

    #[tokio::test]
    async fn short_read_is_zero_padded() {
        let (mut driver, transport, _hub) = driver_with_sink().await;
        let mut p = pipeline(vec![100; 1_000]);

        assert_eq!(driver.pump_block(&mut p, false).await, BlockOutcome::Last);
        assert_eq!(driver.pump_block(&mut p, false).await, BlockOutcome::Exhausted);

        let blocks = transport.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), BLOCK_SIZE);
        assert!(blocks[0][..2_000].chunks(2).all(|p| p == [100, 0]));
        assert!(blocks[0][2_000..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn boost_skips_volume() {
        let (mut driver, transport, _hub) = driver_with_sink().await;
        driver.set_volume(0.0);
        let mut p = pipeline(vec![10; 3_840]);

        driver.pump_block(&mut p, true).await;
        driver.pump_block(&mut p, false).await;
        let blocks = transport.blocks();
        assert_eq!(&blocks[0][..2], &1_000i16.to_le_bytes());
        assert_eq!(&blocks[1][..2], &[0, 0]);
    }

    #[tokio::test]
    async fn finish_announces_end_of_file_unless_paused() {
        let (mut driver, transport, hub) = driver_with_sink().await;
        let mut rx = hub.subscribe();
        driver.request_abort();

        assert!(driver.finish().await);
        assert!(!driver.has_sink());
        assert!(!driver.abort_requested());
        assert_eq!((transport.flushes(), transport.closes()), (1, 1));
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::EndOfFile);

        driver.set_paused(true);
        assert!(!driver.finish().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn skips_only_count_while_streaming() {
        let (mut driver, _transport, _hub) = driver_with_sink().await;
        driver.skip(1);
        assert_eq!(driver.skip_count(), 0);

        driver.set_streaming(true, "clip");
        driver.skip(1);
        driver.skip(2);
        assert_eq!(driver.skip_count(), 3);
        driver.consume_skip();
        assert_eq!(driver.skip_count(), 2);
        driver.finish().await;
        assert_eq!(driver.skip_count(), 0);
    }

    #[tokio::test]
    async fn paced_writes_hold_the_cadence() {
        let transport = MemoryTransport::new();
        transport.login("t").await.unwrap();
        let link = transport.join(ChannelId(1)).await.unwrap();
        let mut driver = StreamDriver::new(
            1.0,
            true,
            Arc::new(EventHub::new(4)),
            Arc::new(EngineStatus::default()),
        );
        driver.open_sink(link.as_ref()).await.unwrap();

        let mut p = pipeline(vec![1; 1_920 * 4]);
        let started = std::time::Instant::now();
        for _ in 0..4 {
            driver.pump_block(&mut p, false).await;
        }
        assert!(started.elapsed() >= Duration::from_millis(55));
        assert_eq!(transport.block_count(), 4);
    }
}
