//! `SymphoniaSource`, a seekable [`PcmSource`] over any container symphonia
//! can probe.
//!
//! Decoding happens on demand: every call to `decode_next` pulls packets until
//! one of them yields audio for the selected track. Timestamps are tracked in
//! frames so position reads never touch the format reader.

use std::{path::Path, time::Duration};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::Decoder,
    errors::Error,
    formats::{FormatReader, SeekMode, SeekTo},
    io::MediaSource,
    units::{Time, TimeBase},
};
use tracing::{debug, warn};

use crate::{
    audio::{
        demux::{Demuxed, open_format},
        source::{PcmSource, SourceSpec, duration_to_frames, frames_to_duration},
    },
    common::{errors::PipelineError, types::AudioFormat},
};

pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    spec: SourceSpec,
    time_base: Option<TimeBase>,
    sample_buf: Option<SampleBuffer<i16>>,
    /// Frames handed out so far (or seek target), in source-rate frames.
    position: u64,
    total_frames: Option<u64>,
    /// Frames still to drop after an accurate seek landed early.
    trim: u64,
    seekable: bool,
    exhausted: bool,
}

impl SymphoniaSource {
    pub fn open(
        source: Box<dyn MediaSource>,
        kind: Option<AudioFormat>,
    ) -> Result<Self, PipelineError> {
        let Demuxed {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            time_base,
            n_frames,
            seekable,
        } = open_format(source, kind)?;

        let mut this = Self {
            format,
            decoder,
            track_id,
            spec: SourceSpec {
                sample_rate,
                channels,
            },
            time_base,
            sample_buf: None,
            position: 0,
            total_frames: None,
            trim: 0,
            seekable,
            exhausted: false,
        };
        this.total_frames = n_frames.map(|ts| this.ts_to_frames(ts));
        Ok(this)
    }

    /// Open a local file, hinting the probe with its extension.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path)?;
        let kind = AudioFormat::from_path(&path.to_string_lossy());
        Self::open(Box::new(file), Some(kind))
    }

    fn ts_to_frames(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => {
                let t = tb.calc_time(ts);
                let frames = (t.seconds as f64 + t.frac) * self.spec.sample_rate as f64;
                frames.round() as u64
            }
            None => ts,
        }
    }
}

impl PcmSource for SymphoniaSource {
    fn spec(&self) -> SourceSpec {
        self.spec
    }

    fn decode_next(&mut self, out: &mut Vec<i16>) -> Result<bool, PipelineError> {
        if self.exhausted {
            return Ok(false);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    return Ok(false);
                }
                Err(Error::ResetRequired) => {
                    self.decoder.reset();
                    self.sample_buf = None;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(Error::DecodeError(e)) => {
                    warn!("Decode error (recoverable): {e}");
                    continue;
                }
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let mut buf = match self.sample_buf.take() {
                Some(b) if b.capacity() >= decoded.capacity() * spec.channels.count() => b,
                _ => SampleBuffer::<i16>::new(decoded.capacity() as u64, spec),
            };
            buf.copy_interleaved_ref(decoded);

            let ch = self.spec.channels.max(1);
            let samples = buf.samples();
            let frames = (samples.len() / ch) as u64;
            let skip = self.trim.min(frames);
            self.trim -= skip;

            let kept = &samples[skip as usize * ch..];
            out.extend_from_slice(kept);
            let any = !kept.is_empty();
            self.position += (kept.len() / ch) as u64;
            self.sample_buf = Some(buf);

            if any {
                return Ok(true);
            }
        }
    }

    fn can_seek(&self) -> bool {
        self.seekable
    }

    fn seek(&mut self, position: Duration) -> Result<Duration, PipelineError> {
        if !self.seekable {
            return Err(PipelineError::Unsupported("source is not seekable".into()));
        }

        let rate = self.spec.sample_rate;
        let mut target = duration_to_frames(position, rate);
        if let Some(total) = self.total_frames {
            if target >= total {
                debug!("seek past end ({:?}), parking at end of stream", position);
                self.position = total;
                self.trim = 0;
                self.exhausted = true;
                return Ok(frames_to_duration(total, rate));
            }
            target = target.min(total);
        }

        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::from(target as f64 / rate as f64),
                track_id: Some(self.track_id),
            },
        )?;

        self.decoder.reset();
        self.sample_buf = None;
        self.exhausted = false;

        let actual = self.ts_to_frames(seeked.actual_ts);
        let required = self.ts_to_frames(seeked.required_ts);
        self.trim = required.saturating_sub(actual);
        self.position = required;

        debug!(
            "seeked to {:?} (actual frame {}, trimming {})",
            position, actual, self.trim
        );
        Ok(frames_to_duration(self.position, rate))
    }

    fn position(&self) -> Duration {
        frames_to_duration(self.position, self.spec.sample_rate)
    }

    fn duration(&self) -> Option<Duration> {
        self.total_frames
            .map(|f| frames_to_duration(f, self.spec.sample_rate))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;

    /// Build an in-memory 16-bit PCM WAV file.
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.write_u32::<LittleEndian>(36 + data_len).unwrap();
        out.extend_from_slice(b"WAVEfmt ");
        out.write_u32::<LittleEndian>(16).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(channels).unwrap();
        out.write_u32::<LittleEndian>(sample_rate).unwrap();
        out.write_u32::<LittleEndian>(sample_rate * channels as u32 * 2)
            .unwrap();
        out.write_u16::<LittleEndian>(channels * 2).unwrap();
        out.write_u16::<LittleEndian>(16).unwrap();
        out.extend_from_slice(b"data");
        out.write_u32::<LittleEndian>(data_len).unwrap();
        for s in samples {
            out.write_i16::<LittleEndian>(*s).unwrap();
        }
        out
    }

    fn open_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> SymphoniaSource {
        let bytes = wav_bytes(sample_rate, channels, samples);
        SymphoniaSource::open(Box::new(Cursor::new(bytes)), Some(AudioFormat::Wav)).unwrap()
    }

    fn drain(src: &mut SymphoniaSource) -> Vec<i16> {
        let mut out = Vec::new();
        while src.decode_next(&mut out).unwrap() {}
        out
    }

    #[test]
    fn decodes_every_sample_of_a_wav() {
        let samples: Vec<i16> = (0..9_600).map(|i| (i % 1000) as i16).collect();
        let mut src = open_wav(48_000, 2, &samples);

        assert_eq!(
            src.spec(),
            SourceSpec {
                sample_rate: 48_000,
                channels: 2
            }
        );
        assert_eq!(src.duration(), Some(Duration::from_millis(100)));
        assert_eq!(drain(&mut src), samples);
        assert_eq!(src.position(), Duration::from_millis(100));
        // stays exhausted
        assert!(!src.decode_next(&mut Vec::new()).unwrap());
    }

    #[test]
    fn seek_to_zero_restarts_the_stream() {
        let samples: Vec<i16> = (0..4_800).map(|i| i as i16).collect();
        let mut src = open_wav(48_000, 1, &samples);
        assert!(src.can_seek());

        drain(&mut src);
        assert_eq!(src.seek(Duration::ZERO).unwrap(), Duration::ZERO);
        assert_eq!(drain(&mut src), samples);
    }

    #[test]
    fn seek_lands_on_the_requested_frame() {
        let samples: Vec<i16> = (0..48_000).map(|i| (i / 10) as i16).collect();
        let mut src = open_wav(48_000, 1, &samples);

        let reached = src.seek(Duration::from_millis(500)).unwrap();
        assert_eq!(reached, Duration::from_millis(500));
        let rest = drain(&mut src);
        assert_eq!(rest.len(), 24_000);
        assert_eq!(rest[0], samples[24_000]);
    }

    #[test]
    fn seek_past_end_exhausts() {
        let mut src = open_wav(48_000, 2, &[0; 960]);
        let reached = src.seek(Duration::from_secs(5)).unwrap();
        assert_eq!(reached, Duration::from_millis(10));
        assert!(!src.decode_next(&mut Vec::new()).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        let res = SymphoniaSource::open(Box::new(Cursor::new(vec![0u8; 64])), None);
        assert!(res.is_err());
    }
}
