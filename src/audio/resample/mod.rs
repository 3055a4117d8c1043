//! Rate conversion to the 48 kHz output rate.
//!
//! Conversion is streaming: each `process` call may hold back the last few
//! frames, which are needed to interpolate across the next block boundary.

pub mod hermite;

pub use hermite::HermiteResampler;

/// Converter for one track. Matching rates pass through untouched.
pub struct Resampler {
    cubic: Option<HermiteResampler>,
}

impl Resampler {
    pub fn for_rates(source_rate: u32, target_rate: u32, channels: usize) -> Self {
        let cubic = (source_rate != target_rate)
            .then(|| HermiteResampler::new(source_rate, target_rate, channels));
        Self { cubic }
    }

    pub fn is_passthrough(&self) -> bool {
        self.cubic.is_none()
    }

    /// Append the converted form of `input` to `output`.
    pub fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        match self.cubic.as_mut() {
            Some(r) => r.process(input, output),
            None => output.extend_from_slice(input),
        }
    }

    pub fn reset(&mut self) {
        if let Some(r) = self.cubic.as_mut() {
            r.reset();
        }
    }
}
