use std::f64::consts::PI;

use super::{PcmStage, SharedSource, delay_line::DelayLine};
use crate::{
    audio::constants::{CHANNELS, MAX_PITCH, MIN_PITCH, PITCH_WINDOW_MS, SAMPLE_RATE_F64},
    common::errors::PipelineError,
};

/// Delay-line pitch shifter.
///
/// Two read taps sweep through a window of delay half a period apart. Each
/// tap's delay drifts by `1 - factor` samples per sample, so it replays the
/// input at `factor` speed; the sin² crossfade hides the jump when a tap wraps
/// around the window. Length-preserving: one output frame per input frame.
pub struct PitchShifter {
    lines: Vec<DelayLine>,
    factor: f64,
    window: f64,
    phase: f64,
}

impl PitchShifter {
    pub fn new(factor: f32) -> Self {
        let window = (PITCH_WINDOW_MS / 1000.0 * SAMPLE_RATE_F64).round();
        Self {
            lines: (0..CHANNELS)
                .map(|_| DelayLine::new(window as usize + 2))
                .collect(),
            factor: factor.clamp(MIN_PITCH, MAX_PITCH) as f64,
            window,
            phase: 0.0,
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor as f32
    }

    /// Shift interleaved stereo `samples` in place.
    pub fn process(&mut self, samples: &mut [i16]) {
        let step = (1.0 - self.factor) / self.window;

        for frame in samples.chunks_exact_mut(CHANNELS) {
            let phase_b = (self.phase + 0.5).fract();
            let delay_a = self.phase * self.window;
            let delay_b = phase_b * self.window;
            let gain_a = (PI * self.phase).sin().powi(2);
            let gain_b = 1.0 - gain_a;

            for (sample, line) in frame.iter_mut().zip(self.lines.iter_mut()) {
                line.write(*sample as f32);
                let out = line.read(delay_a) as f64 * gain_a + line.read(delay_b) as f64 * gain_b;
                *sample = out.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            }

            self.phase = (self.phase + step).rem_euclid(1.0);
        }
    }

    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.phase = 0.0;
    }
}

/// Pitch-adjusted view over the shared [`SourceStage`](super::SourceStage).
/// A factor of 1.0 bypasses the shifter entirely.
pub struct PitchStage {
    source: SharedSource,
    shifter: Option<PitchShifter>,
    factor: f32,
}

impl PitchStage {
    pub fn new(source: SharedSource, factor: f32) -> Self {
        let factor = factor.clamp(MIN_PITCH, MAX_PITCH);
        let shifter = ((factor - 1.0).abs() > f32::EPSILON).then(|| PitchShifter::new(factor));
        Self {
            source,
            shifter,
            factor,
        }
    }

    /// An independent chain with the same pitch over the same source.
    pub fn snapshot(&self) -> Self {
        Self::new(self.source.clone(), self.factor)
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn is_bypassed(&self) -> bool {
        self.shifter.is_none()
    }
}

impl PcmStage for PitchStage {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, PipelineError> {
        let n = self.source.lock().read(out)?;
        if let Some(shifter) = &mut self.shifter {
            shifter.process(&mut out[..n]);
        }
        Ok(n)
    }

    fn reset(&mut self) {
        if let Some(shifter) = &mut self.shifter {
            shifter.reset();
        }
    }
}
