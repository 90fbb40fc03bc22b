use serde::{Deserialize, Serialize};

/// Bit depth of every sample produced by the sampler.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Channel count of every stream produced by the sampler.
pub const CHANNELS: u16 = 1;

/// Fixed PCM stream description shared by both sinks of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub bits_per_sample: u16,
    pub sampling_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    /// 16-bit mono at the given rate.
    pub fn mono16(sampling_rate: u32) -> Self {
        Self {
            bits_per_sample: BITS_PER_SAMPLE,
            sampling_rate,
            channels: CHANNELS,
        }
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes per frame (all channels of one instant).
    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }

    pub fn byte_rate(&self) -> u32 {
        self.sampling_rate * self.block_align() as u32
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sampling_rate == 0 {
            return Err("sampling rate must be positive".into());
        }
        if self.bits_per_sample != BITS_PER_SAMPLE {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        if self.channels != CHANNELS {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

/// Which sink a session is feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    File,
    Playback,
}

/// An audio output device available for live streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub index: u32,
    pub name: String,
}

/// Depth counters for the playback queue.
///
/// The queue is unbounded; a `depth` that keeps growing means the device
/// is consuming segments slower than the producer creates them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub depth: usize,
    pub peak_depth: usize,
    pub submitted: u64,
    pub completed: u64,
    pub bytes_in_flight: usize,
}

/// Counters for debugging a sampling session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplerDiagnostics {
    pub samples_read: u64,
    pub empty_polls: u64,
    pub segments_submitted: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono16_derived_fields() {
        let format = StreamFormat::mono16(8000);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.byte_rate(), 16000);
        assert!(format.validate().is_ok());
    }

    #[test]
    fn zero_rate_is_invalid() {
        assert!(StreamFormat::mono16(0).validate().is_err());
    }

    #[test]
    fn stereo_is_rejected() {
        let format = StreamFormat {
            channels: 2,
            ..StreamFormat::mono16(44100)
        };
        assert_eq!(format.validate().unwrap_err(), "unsupported channel count: 2");
    }
}
