use std::sync::Arc;

use crate::models::audio_models::{AudioDevice, StreamFormat};
use crate::models::error::AudioOutputError;
use crate::models::segment::Segment;

/// Callback a device invokes once per finished segment.
///
/// May be called from any thread. Completions must be reported in the order
/// the segments were submitted.
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Opaque token identifying one submitted segment on the device side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionHandle(u64);

impl SubmissionHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Interface for platform audio output devices.
///
/// Implemented by:
/// - `WaveOutDevice` (Windows waveOut)
/// - recording fakes in tests
pub trait AudioOutput: Send {
    /// Open the device for `format`. `on_complete` fires once per segment
    /// whose playback has finished.
    fn open(&mut self, format: &StreamFormat, on_complete: CompletionCallback) -> Result<(), AudioOutputError>;

    /// Queue `segment` for playback and return immediately.
    ///
    /// The device keeps its own reference to the bytes until it reports the
    /// completion.
    fn submit(&mut self, segment: Arc<Segment>) -> Result<SubmissionHandle, AudioOutputError>;

    /// Close the device. Segments still playing may be cut short.
    fn close(&mut self);

    /// Information about the device backing this output.
    fn device_info(&self) -> AudioDevice;
}
