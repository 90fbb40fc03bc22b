use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use log::info;
use sha2::{Digest, Sha256};

use crate::models::audio_models::StreamFormat;
use crate::models::error::SamplerError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::segment::Segment;
use crate::processing::wav_format;
use crate::storage::metadata;

/// Encode `payload` as WAV and write it to `path` in a single write.
///
/// The container is built in memory first, so a failure to create the file
/// leaves nothing on disk. Returns the SHA-256 hex digest of the written bytes.
pub fn write_wav_file(path: &Path, format: &StreamFormat, payload: &Segment) -> Result<String, SamplerError> {
    let wav = wav_format::encode_wav(format, payload.as_bytes())?;

    // Ensure output directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| SamplerError::StorageError(format!("failed to create directory: {}", e)))?;
    }

    let mut file = File::create(path)
        .map_err(|e| SamplerError::StorageError(format!("failed to create {}: {}", path.display(), e)))?;
    file.write_all(&wav)
        .map_err(|e| SamplerError::StorageError(format!("write failed: {}", e)))?;
    file.flush().map_err(|e| SamplerError::StorageError(e.to_string()))?;

    Ok(hex_encode(&Sha256::digest(&wav)))
}

/// Write the recording and build its result, plus the JSON sidecar when
/// `write_sidecar` is set.
pub fn finalize_recording(
    path: &Path,
    format: &StreamFormat,
    payload: &Segment,
    write_sidecar: bool,
) -> Result<RecordingResult, SamplerError> {
    let checksum = write_wav_file(path, format, payload)?;
    let sample_count = payload.sample_count() as u64;
    let recording_metadata = RecordingMetadata::new(*format, sample_count, &path.to_string_lossy(), &checksum);

    if write_sidecar {
        metadata::write_metadata(&recording_metadata, path)?;
    }

    info!(
        "Saved {} samples ({:.2}s at {} Hz) to {}",
        sample_count,
        recording_metadata.duration_secs,
        format.sampling_rate,
        path.display()
    );

    Ok(RecordingResult {
        file_path: path.to_path_buf(),
        duration_secs: recording_metadata.duration_secs,
        checksum,
        metadata: recording_metadata,
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_file_path;
    use approx::assert_relative_eq;

    #[test]
    fn writes_header_and_payload() {
        let path = temp_file_path("writer_plain.wav");
        let mut payload = Segment::new();
        payload.extend_samples(&[10, -10, 20, -20]);

        let checksum = write_wav_file(&path, &StreamFormat::mono16(8000), &payload).unwrap();
        assert_eq!(checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 8);
        assert_eq!(&file_data[0..4], b"RIFF");
        let data_size = u32::from_le_bytes([file_data[40], file_data[41], file_data[42], file_data[43]]);
        assert_eq!(data_size, 8);
        assert_eq!(hex_encode(&Sha256::digest(&file_data)), checksum);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn unopenable_target_writes_nothing() {
        let dir = temp_file_path("writer_is_a_dir");
        fs::create_dir_all(&dir).unwrap();

        // A directory cannot be opened as a file.
        let err = write_wav_file(&dir, &StreamFormat::mono16(8000), &Segment::new()).unwrap_err();
        assert!(matches!(err, SamplerError::StorageError(_)));
        assert!(dir.is_dir());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn finalize_builds_result_and_sidecar() {
        let path = temp_file_path("writer_final.wav");
        let mut payload = Segment::new();
        payload.extend_samples(&vec![0; 4000]);

        let result = finalize_recording(&path, &StreamFormat::mono16(8000), &payload, true).unwrap();
        assert_eq!(result.file_path, path);
        assert_relative_eq!(result.duration_secs, 0.5);
        assert_eq!(result.metadata.sample_count, 4000);

        let sidecar = metadata::read_metadata(&path).unwrap();
        assert_eq!(sidecar.checksum, result.checksum);

        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = temp_file_path("writer_nested");
        let path = dir.join("inner").join("take.wav");

        write_wav_file(&path, &StreamFormat::mono16(8000), &Segment::new()).unwrap();
        assert!(path.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
