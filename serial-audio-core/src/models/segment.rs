/// One quantized 16-bit amplitude as read from the serial device.
pub type Sample = i16;

/// Size of one sample on the wire.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<Sample>();

/// Append-only run of little-endian PCM bytes.
///
/// Filled by the acquisition loop, then moved whole into a sink: either the
/// complete recording (file sink) or one fixed-duration chunk (playback).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    data: Vec<u8>,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate room for `samples` samples.
    pub fn with_sample_capacity(samples: usize) -> Self {
        Self {
            data: Vec::with_capacity(samples * SAMPLE_SIZE),
        }
    }

    pub fn push_sample(&mut self, sample: Sample) {
        self.data.extend_from_slice(&sample.to_le_bytes());
    }

    pub fn extend_samples(&mut self, samples: &[Sample]) {
        self.data.reserve(samples.len() * SAMPLE_SIZE);
        for &sample in samples {
            self.push_sample(sample);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.data.len() / SAMPLE_SIZE
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode the payload back into samples.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.data
            .chunks_exact(SAMPLE_SIZE)
            .map(|pair| Sample::from_le_bytes([pair[0], pair[1]]))
    }
}
