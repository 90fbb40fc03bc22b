use crate::models::error::SamplerError;
use crate::models::recording_result::SessionReport;
use crate::models::state::SessionState;

/// Event delegate for sampler notifications.
///
/// State changes are reported from the caller's thread on start/stop and from
/// the producer thread when it exits. `on_segment_submitted` and
/// `on_session_finished` always come from the producer thread, so keep the
/// implementations cheap.
pub trait SamplerDelegate: Send + Sync {
    fn on_state_changed(&self, state: &SessionState);

    /// A playback segment of `sample_count` samples was handed to the device.
    fn on_segment_submitted(&self, sample_count: usize, queue_depth: usize);

    fn on_error(&self, error: &SamplerError);

    fn on_session_finished(&self, report: &SessionReport);
}
