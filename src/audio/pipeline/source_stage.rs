use std::time::Duration;

use tracing::debug;

use super::PcmStage;
use crate::{
    audio::{
        constants::{CHANNELS, TARGET_SAMPLE_RATE},
        resample::Resampler,
        source::{PcmSource, SourceSpec, frames_to_duration},
    },
    common::errors::PipelineError,
};

/// Normalizes a decoder's native layout to 48 kHz interleaved stereo.
///
/// Mono is duplicated into both channels; anything wider than stereo keeps the
/// first two channels (front left / front right in every symphonia layout).
pub struct SourceStage {
    source: Box<dyn PcmSource>,
    spec: SourceSpec,
    resampler: Resampler,
    decoded: Vec<i16>,
    stereo: Vec<i16>,
    /// Canonical samples not yet handed out; `cursor` marks the read head.
    pending: Vec<i16>,
    cursor: usize,
    finished: bool,
}

impl SourceStage {
    pub fn new(source: Box<dyn PcmSource>) -> Result<Self, PipelineError> {
        let spec = source.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(PipelineError::Unsupported(format!(
                "{}Hz with {} channels",
                spec.sample_rate, spec.channels
            )));
        }

        debug!(
            "source stage: {}Hz {}ch -> {}Hz {}ch",
            spec.sample_rate, spec.channels, TARGET_SAMPLE_RATE, CHANNELS
        );

        Ok(Self {
            resampler: Resampler::for_rates(spec.sample_rate, TARGET_SAMPLE_RATE, CHANNELS),
            source,
            spec,
            decoded: Vec::new(),
            stereo: Vec::new(),
            pending: Vec::new(),
            cursor: 0,
            finished: false,
        })
    }

    pub fn can_seek(&self) -> bool {
        self.source.can_seek()
    }

    pub fn seek(&mut self, position: Duration) -> Result<Duration, PipelineError> {
        let reached = self.source.seek(position)?;
        self.reset();
        Ok(reached)
    }

    /// Playback position of the next sample `read` will return.
    pub fn position(&self) -> Duration {
        let buffered = ((self.pending.len() - self.cursor) / CHANNELS) as u64;
        self.source
            .position()
            .saturating_sub(frames_to_duration(buffered, TARGET_SAMPLE_RATE))
    }

    pub fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }

    fn refill(&mut self) -> Result<bool, PipelineError> {
        self.decoded.clear();
        if !self.source.decode_next(&mut self.decoded)? {
            self.finished = true;
            return Ok(false);
        }

        to_stereo(&self.decoded, self.spec.channels, &mut self.stereo);

        self.pending.drain(..self.cursor);
        self.cursor = 0;
        if self.resampler.is_passthrough() {
            self.pending.extend_from_slice(&self.stereo);
        } else {
            self.resampler.process(&self.stereo, &mut self.pending);
        }
        Ok(true)
    }
}

impl PcmStage for SourceStage {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, PipelineError> {
        let mut written = 0;
        while written < out.len() {
            if self.cursor == self.pending.len() {
                if self.finished || !self.refill()? {
                    break;
                }
                continue;
            }
            let n = (self.pending.len() - self.cursor).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
            self.cursor += n;
            written += n;
        }
        Ok(written)
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.cursor = 0;
        self.resampler.reset();
        self.finished = false;
    }
}

/// Rewrite `input` (interleaved, `channels` wide) as interleaved stereo.
fn to_stereo(input: &[i16], channels: usize, out: &mut Vec<i16>) {
    out.clear();
    match channels {
        1 => {
            out.reserve(input.len() * 2);
            for &s in input {
                out.push(s);
                out.push(s);
            }
        }
        2 => out.extend_from_slice(input),
        n => {
            out.reserve(input.len() / n * 2);
            for frame in input.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MemorySource;

    #[test]
    fn mono_is_duplicated() {
        let mut out = Vec::new();
        to_stereo(&[1, 2, 3], 1, &mut out);
        assert_eq!(out, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn surround_keeps_front_pair() {
        let mut out = Vec::new();
        to_stereo(&[1, 2, 9, 9, 9, 9, 3, 4, 9, 9, 9, 9], 6, &mut out);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn reads_fill_across_decode_chunks() {
        let samples: Vec<i16> = (0..10_000).map(|i| (i % 3_000) as i16).collect();
        let mut stage =
            SourceStage::new(Box::new(MemorySource::new(samples.clone(), 48_000, 2))).unwrap();

        let mut block = vec![0i16; 1_920];
        let mut collected = Vec::new();
        loop {
            let n = stage.read(&mut block).unwrap();
            collected.extend_from_slice(&block[..n]);
            if n < block.len() {
                break;
            }
        }
        assert_eq!(collected, samples);
        assert_eq!(stage.read(&mut block).unwrap(), 0);
    }

    #[test]
    fn resamples_to_canonical_rate() {
        let mut stage =
            SourceStage::new(Box::new(MemorySource::new(vec![100; 24_000], 24_000, 1))).unwrap();
        let mut out = vec![0i16; 200_000];
        let n = stage.read(&mut out).unwrap();
        let frames = n / CHANNELS;
        // one second of 24 kHz mono becomes about a second of 48 kHz stereo
        assert!((47_990..=48_000).contains(&frames), "got {frames}");
    }

    #[test]
    fn seek_discards_buffered_audio() {
        let samples: Vec<i16> = (0..96_000).map(|i| (i / 2) as i16).collect();
        let mut stage =
            SourceStage::new(Box::new(MemorySource::new(samples, 48_000, 2))).unwrap();
        let mut block = vec![0i16; 1_920];
        stage.read(&mut block).unwrap();

        stage.seek(Duration::from_millis(500)).unwrap();
        assert_eq!(stage.position(), Duration::from_millis(500));
        stage.read(&mut block).unwrap();
        assert_eq!(block[0], 24_000);
    }

    #[test]
    fn rejects_empty_layout() {
        let res = SourceStage::new(Box::new(MemorySource::new(vec![], 48_000, 0)));
        assert!(matches!(res, Err(PipelineError::Unsupported(_))));
    }
}
