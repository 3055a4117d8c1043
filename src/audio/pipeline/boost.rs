use super::{PcmStage, pitch::PitchStage};
use crate::{audio::constants::BOOST_GAIN, common::errors::PipelineError};

/// Fixed high-gain chain built once per load from a snapshot of the pitch
/// chain. Later pitch changes do not reach it.
pub struct BoostStage {
    inner: PitchStage,
    gain: f32,
}

impl BoostStage {
    pub fn new(snapshot: PitchStage) -> Self {
        Self {
            inner: snapshot,
            gain: BOOST_GAIN,
        }
    }

    /// Pitch the chain was snapshotted with.
    pub fn pitch(&self) -> f32 {
        self.inner.factor()
    }
}

impl PcmStage for BoostStage {
    fn read(&mut self, out: &mut [i16]) -> Result<usize, PipelineError> {
        let n = self.inner.read(out)?;
        let gain = self.gain;
        for sample in &mut out[..n] {
            let s = (*sample as f32 * gain) as i32;
            *sample = s.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
        Ok(n)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
