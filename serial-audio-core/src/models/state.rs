use super::error::SamplerError;

/// Sampling session state machine.
///
/// State transitions:
/// ```text
/// idle → sampling → stopping → stopped
///           ↓          ↓
///         failed ←─────┘
/// ```
///
/// `Stopped` and `Failed` end a session. Starting again on the same sampler
/// begins a fresh session from either of them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Sampling,
    Stopping,
    Stopped,
    Failed(SamplerError),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self, Self::Sampling)
    }

    /// A producer thread may still be running in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Sampling | Self::Stopping)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed(_))
    }

    /// Whether a new session may be started from this state.
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }
}
