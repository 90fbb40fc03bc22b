use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::SamplerError;
use crate::models::recording_result::RecordingMetadata;

/// Path of the sidecar for `recording_path`: `{stem}.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), SamplerError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| SamplerError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| SamplerError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, SamplerError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| SamplerError::StorageError(format!("failed to read metadata: {}", e)))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| SamplerError::StorageError(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}
