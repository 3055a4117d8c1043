//! Source layer: where PCM comes from.
//!
//! ```text
//! src/audio/source/
//! ├── mod.rs        ← AudioSource + PcmSource traits
//! ├── http/         ← HttpSource (prefetch thread, streaming HTTP)
//! ├── memory.rs     ← MemorySource (interleaved PCM held in memory)
//! └── resolver.rs   ← PlaybackRequest locator → PcmSource
//! ```
//!
//! Byte sources ([`AudioSource`]) are handed to symphonia through
//! [`crate::audio::decoder::SymphoniaSource`]; everything downstream only sees the
//! decoded [`PcmSource`] contract.

pub mod http;
pub mod memory;
pub mod resolver;

pub use http::HttpSource;
pub use memory::MemorySource;
pub use resolver::{CaptureProvider, DefaultResolver, SourceLocator, SourceResolver};

use std::{
    io::{Read, Seek},
    time::Duration,
};

use symphonia::core::io::MediaSource;

use crate::common::errors::PipelineError;

/// Common trait implemented by every readable byte source.
///
/// Combines `Read + Seek + MediaSource` (required by symphonia) with metadata
/// accessors.
pub trait AudioSource: Read + Seek + MediaSource + Send {
    /// MIME / content-type of the stream, if known.
    fn content_type(&self) -> Option<String> {
        None
    }

    /// Whether the source supports seeking (i.e. its length is known).
    fn seekable(&self) -> bool {
        self.is_seekable()
    }
}

impl AudioSource for std::fs::File {}

/// Native layout of a decoded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpec {
    pub sample_rate: u32,
    pub channels: usize,
}

/// A seekable decoder producing interleaved i16 PCM in its native layout.
pub trait PcmSource: Send {
    fn spec(&self) -> SourceSpec;

    /// Decode the next chunk and append its interleaved samples to `out`.
    ///
    /// Returns `Ok(false)` once the stream is exhausted.
    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<bool, PipelineError>;

    fn can_seek(&self) -> bool;

    /// Move the read head. Returns the position actually reached.
    fn seek(&mut self, position: Duration) -> Result<Duration, PipelineError>;

    /// Position of the next sample `decode_next` will return.
    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;
}

/// Convert a frame count at `sample_rate` into a duration.
pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let secs = frames / sample_rate as u64;
    let rem = frames % sample_rate as u64;
    Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / sample_rate as u64)
}

/// Convert a duration into a whole frame count at `sample_rate`.
pub fn duration_to_frames(position: Duration, sample_rate: u32) -> u64 {
    (position.as_nanos() * sample_rate as u128 / 1_000_000_000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_conversions_agree() {
        assert_eq!(frames_to_duration(48_000, 48_000), Duration::from_secs(1));
        assert_eq!(frames_to_duration(24_000, 48_000), Duration::from_millis(500));
        assert_eq!(duration_to_frames(Duration::from_millis(250), 44_100), 11_025);
        assert_eq!(frames_to_duration(10, 0), Duration::ZERO);
    }
}
