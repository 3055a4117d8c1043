//! Per-track signal chain.
//!
//! ```text
//! PcmSource ─► SourceStage ─┬─► PitchStage ───────────────► (boost off)
//!  (decoder)   (48k stereo) └─► PitchStage' ─► BoostStage ─► (boost on)
//! ```
//!
//! Both chains pull from the same [`SourceStage`], so switching between them
//! never loses or repeats audio. Only one of them is read per block.

pub mod boost;
pub mod delay_line;
pub mod pitch;
pub mod source_stage;

use std::{sync::Arc, time::Duration};

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use tracing::debug;

pub use boost::BoostStage;
pub use pitch::{PitchShifter, PitchStage};
pub use source_stage::SourceStage;

use crate::{
    audio::constants::{BLOCK_SAMPLES, BYTES_PER_SAMPLE},
    common::errors::PipelineError,
};

/// The source stage shared by every chain of one pipeline.
pub type SharedSource = Arc<Mutex<SourceStage>>;

/// A stage producing canonical interleaved stereo i16 PCM.
pub trait PcmStage: Send {
    /// Fill `out` with samples. Returns the number written, which is less than
    /// `out.len()` only once the underlying source is exhausted.
    fn read(&mut self, out: &mut [i16]) -> Result<usize, PipelineError>;

    /// Drop internal state (delay lines, carried samples) after a seek.
    fn reset(&mut self);
}

pub struct AudioPipeline {
    track: String,
    source: SharedSource,
    pitch: PitchStage,
    boost: BoostStage,
    scratch: Vec<i16>,
}

impl AudioPipeline {
    /// Wire up a pipeline around an already built pitch chain. The boost chain
    /// is derived from a snapshot of `pitch` taken now.
    pub fn assemble(source: SharedSource, pitch: PitchStage, track: impl Into<String>) -> Self {
        let boost = BoostStage::new(pitch.snapshot());
        Self {
            track: track.into(),
            source,
            pitch,
            boost,
            scratch: vec![0; BLOCK_SAMPLES],
        }
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.factor()
    }

    pub fn boost_pitch(&self) -> f32 {
        self.boost.pitch()
    }

    /// Swap in a rebuilt pitch chain. The boost chain keeps its snapshot.
    pub fn replace_pitch(&mut self, stage: PitchStage) {
        debug!(
            "pipeline '{}': pitch chain {} -> {}",
            self.track,
            self.pitch.factor(),
            stage.factor()
        );
        self.pitch = stage;
    }

    /// Read one block of little-endian PCM bytes from the active chain into
    /// `out`. Returns the number of bytes written.
    pub fn read_block(&mut self, boost: bool, out: &mut [u8]) -> Result<usize, PipelineError> {
        let wanted = out.len() / BYTES_PER_SAMPLE;
        if self.scratch.len() < wanted {
            self.scratch.resize(wanted, 0);
        }

        let samples = &mut self.scratch[..wanted];
        let n = if boost {
            self.boost.read(samples)?
        } else {
            self.pitch.read(samples)?
        };

        LittleEndian::write_i16_into(&samples[..n], &mut out[..n * BYTES_PER_SAMPLE]);
        Ok(n * BYTES_PER_SAMPLE)
    }

    pub fn can_seek(&self) -> bool {
        self.source.lock().can_seek()
    }

    pub fn seek(&mut self, position: Duration) -> Result<Duration, PipelineError> {
        let reached = self.source.lock().seek(position)?;
        self.pitch.reset();
        self.boost.reset();
        Ok(reached)
    }

    pub fn position(&self) -> Duration {
        self.source.lock().position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.source.lock().duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{constants::BLOCK_SIZE, source::MemorySource};

    fn pipeline(samples: Vec<i16>, pitch: f32) -> AudioPipeline {
        let stage = SourceStage::new(Box::new(MemorySource::new(samples, 48_000, 2))).unwrap();
        let source = Arc::new(Mutex::new(stage));
        let pitch = PitchStage::new(source.clone(), pitch);
        AudioPipeline::assemble(source, pitch, "clip")
    }

    #[test]
    fn blocks_are_little_endian() {
        let mut p = pipeline(vec![0x0102, -2, 3, 4], 1.0);
        let mut block = [0u8; BLOCK_SIZE];
        assert_eq!(p.read_block(false, &mut block).unwrap(), 8);
        assert_eq!(&block[..8], &[0x02, 0x01, 0xFE, 0xFF, 3, 0, 4, 0]);
    }

    #[test]
    fn switching_chains_keeps_the_cursor() {
        let samples: Vec<i16> = (0..BLOCK_SAMPLES * 3).map(|i| (i % 100) as i16).collect();
        let mut p = pipeline(samples, 1.0);
        let mut block = [0u8; BLOCK_SIZE];

        p.read_block(false, &mut block).unwrap();
        p.read_block(true, &mut block).unwrap();
        assert_eq!(p.read_block(false, &mut block).unwrap(), BLOCK_SIZE);
        assert_eq!(p.read_block(true, &mut block).unwrap(), 0);
    }

    #[test]
    fn boost_keeps_load_time_pitch() {
        let mut p = pipeline(vec![0; 100], 1.5);
        let rebuilt = PitchStage::new(p.source().clone(), 0.75);
        p.replace_pitch(rebuilt);
        assert_eq!(p.pitch(), 0.75);
        assert_eq!(p.boost_pitch(), 1.5);
    }

    #[test]
    fn seek_rewinds_every_chain() {
        let samples: Vec<i16> = (0..BLOCK_SAMPLES * 2).map(|i| i as i16).collect();
        let mut p = pipeline(samples, 1.0);
        let mut block = [0u8; BLOCK_SIZE];
        p.read_block(false, &mut block).unwrap();
        p.read_block(false, &mut block).unwrap();
        assert_eq!(p.position(), Duration::from_millis(40));

        assert_eq!(p.seek(Duration::ZERO).unwrap(), Duration::ZERO);
        p.read_block(true, &mut block).unwrap();
        assert_eq!(&block[..4], &[0, 0, 100, 0]);
    }
}
