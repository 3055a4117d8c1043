use std::time::Duration;

use super::{PcmSource, SourceSpec, duration_to_frames, frames_to_duration};
use crate::common::errors::PipelineError;

/// Frames handed out per `decode_next` call.
const CHUNK_FRAMES: usize = 1_024;

/// Interleaved PCM held in memory. Always seekable.
///
/// Used for generated sounds and captured clips, and as a deterministic
/// source in tests.
pub struct MemorySource {
    samples: Vec<i16>,
    spec: SourceSpec,
    /// Read head in frames.
    cursor: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            spec: SourceSpec {
                sample_rate,
                channels,
            },
            cursor: 0,
        }
    }

    fn total_frames(&self) -> usize {
        if self.spec.channels == 0 {
            0
        } else {
            self.samples.len() / self.spec.channels
        }
    }
}

impl PcmSource for MemorySource {
    fn spec(&self) -> SourceSpec {
        self.spec
    }

    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<bool, PipelineError> {
        let total = self.total_frames();
        if self.cursor >= total {
            return Ok(false);
        }
        let end = (self.cursor + CHUNK_FRAMES).min(total);
        let ch = self.spec.channels;
        out.extend_from_slice(&self.samples[self.cursor * ch..end * ch]);
        self.cursor = end;
        Ok(true)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, position: Duration) -> Result<Duration, PipelineError> {
        let frame = duration_to_frames(position, self.spec.sample_rate) as usize;
        self.cursor = frame.min(self.total_frames());
        Ok(self.position())
    }

    fn position(&self) -> Duration {
        frames_to_duration(self.cursor as u64, self.spec.sample_rate)
    }

    fn duration(&self) -> Option<Duration> {
        Some(frames_to_duration(
            self.total_frames() as u64,
            self.spec.sample_rate,
        ))
    }
}
