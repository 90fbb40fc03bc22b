use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{SinkKind, StreamFormat};

/// Result of a finished file recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata describing a recorded WAV file.
///
/// Serializable for the optional JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub format: StreamFormat,
    pub sample_count: u64,
}

impl RecordingMetadata {
    pub fn new(format: StreamFormat, sample_count: u64, file_path: &str, checksum: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs: duration_secs(sample_count, format.sampling_rate),
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            format,
            sample_count,
        }
    }
}

/// Outcome of a session, returned by `SerialAudioSampler::sync`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub sink: SinkKind,
    pub format: StreamFormat,
    pub samples_captured: u64,
    pub segments_submitted: u64,
    pub wall_time: Duration,
    /// Present for file sessions.
    pub recording: Option<RecordingResult>,
}

impl SessionReport {
    /// Audio duration represented by the captured samples.
    pub fn audio_duration_secs(&self) -> f64 {
        duration_secs(self.samples_captured, self.format.sampling_rate)
    }
}

pub(crate) fn duration_secs(sample_count: u64, sampling_rate: u32) -> f64 {
    if sampling_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sampling_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn metadata_duration_from_sample_count() {
        let metadata = RecordingMetadata::new(StreamFormat::mono16(8000), 4000, "out.wav", "abc");
        assert_relative_eq!(metadata.duration_secs, 0.5);
        assert!(!metadata.id.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.created_at).is_ok());
    }

    #[test]
    fn zero_rate_has_zero_duration() {
        assert_eq!(duration_secs(100, 0), 0.0);
    }
}
