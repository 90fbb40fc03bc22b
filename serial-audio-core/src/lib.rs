//! # serial-audio-core
//!
//! Platform-agnostic core of the serial audio sampler.
//!
//! A microcontroller streams raw 16-bit samples over a serial line without
//! announcing its rate. This crate calibrates the rate, runs the acquisition
//! loop, and feeds either a WAV file or a live playback queue. Platform
//! backends (Windows serial + waveOut) implement `SerialTransport` and
//! `AudioOutput` and plug into the generic `SerialAudioSampler`.
//!
//! ## Architecture
//!
//! ```text
//! serial-audio-core (this crate)
//! ├── traits/       ← SerialTransport, AudioOutput, Clock, SamplerDelegate
//! ├── models/       ← SamplerError, SessionState, StreamFormat, Segment, AppConfig, etc.
//! ├── processing/   ← RateEstimator, SampleReader, SampleScaler, WAV format, PlaybackQueue
//! ├── session/      ← SerialAudioSampler (controller) and the acquisition loop
//! └── storage/      ← WAV file writer, metadata sidecar, config file
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioDevice, QueueStats, SamplerDiagnostics, SinkKind, StreamFormat};
pub use models::config::{AppConfig, SamplerConfig};
pub use models::error::{AudioOutputError, ErrorKind, SamplerError, TransportError};
pub use models::recording_result::{RecordingMetadata, RecordingResult, SessionReport};
pub use models::segment::{Sample, Segment};
pub use models::state::SessionState;
pub use processing::playback_queue::PlaybackQueue;
pub use processing::rate_estimator::RateEstimator;
pub use session::sampler::{SerialAudioSampler, SinkTarget};
pub use storage::config_file::{ConfigFile, DEFAULT_CONFIG_FILE};
pub use traits::audio_output::{AudioOutput, CompletionCallback, SubmissionHandle};
pub use traits::clock::{Clock, MonotonicClock};
pub use traits::sampler_delegate::SamplerDelegate;
pub use traits::serial_transport::SerialTransport;
