use crate::models::config::DEFAULT_ATTENUATION;
use crate::models::segment::Sample;

/// Constant-factor attenuation applied to every raw sample.
///
/// Out-of-range products saturate at the `i16` bounds, which only matters
/// for factors above 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleScaler {
    factor: f32,
}

impl SampleScaler {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn scale(&self, sample: Sample) -> Sample {
        (sample as f32 * self.factor) as Sample
    }

    pub fn scale_in_place(&self, samples: &mut [Sample]) {
        for sample in samples.iter_mut() {
            *sample = self.scale(*sample);
        }
    }
}

impl Default for SampleScaler {
    fn default() -> Self {
        Self::new(DEFAULT_ATTENUATION)
    }
}
