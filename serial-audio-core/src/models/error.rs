use thiserror::Error;

/// Errors reported by a serial transport.
///
/// The first four variants are produced by `open`; the rest can occur at any
/// point after the port is open and are fatal to a running session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("serial device not found: {0}")]
    FileNotFound(String),

    #[error("invalid handle for serial device: {0}")]
    InvalidHandle(String),

    #[error("unsupported baud rate: {0}")]
    InvalidBaudRate(u32),

    #[error("serial configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("serial read failed: {0}")]
    ReadFailed(String),

    #[error("serial write failed: {0}")]
    WriteFailed(String),

    #[error("serial port is closed")]
    Closed,
}

/// Errors reported by a platform audio output device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioOutputError {
    #[error("audio device {0} not available")]
    DeviceNotAvailable(u32),

    #[error("audio device open failed: {0}")]
    OpenFailed(String),

    #[error("audio device is not open")]
    NotOpen,

    #[error("segment submission failed: {0}")]
    SubmitFailed(String),
}

/// Error categories, one per failure class a session can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad settings or hardware discovered at startup; no session starts.
    Configuration,
    /// Serial I/O failure after a session started; the session is aborted.
    Transport,
    /// API misuse, rejected without a state change.
    Usage,
    /// Audio output or file output failure.
    Output,
    Internal,
}

/// Errors that can occur while calibrating, sampling, or writing output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    AudioOutput(#[from] AudioOutputError),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("calibration measured 0 Hz; no data arrived from the serial device")]
    ZeroSamplingRate,

    #[error("a sampling session is already active")]
    AlreadySampling,

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SamplerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(TransportError::FileNotFound(_))
            | Self::Transport(TransportError::InvalidHandle(_))
            | Self::Transport(TransportError::InvalidBaudRate(_))
            | Self::Transport(TransportError::ConfigurationFailed(_))
            | Self::ConfigurationFailed(_)
            | Self::ZeroSamplingRate => ErrorKind::Configuration,
            Self::Transport(_) => ErrorKind::Transport,
            Self::AlreadySampling => ErrorKind::Usage,
            Self::AudioOutput(_) | Self::EncodingFailed(_) | Self::StorageError(_) => ErrorKind::Output,
            Self::Unknown(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_are_configuration_errors() {
        let err: SamplerError = TransportError::InvalidBaudRate(12345).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "unsupported baud rate: 12345");
    }

    #[test]
    fn read_failure_is_transport_error() {
        let err: SamplerError = TransportError::ReadFailed("device unplugged".into()).into();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn usage_and_calibration_kinds() {
        assert_eq!(SamplerError::AlreadySampling.kind(), ErrorKind::Usage);
        assert_eq!(SamplerError::ZeroSamplingRate.kind(), ErrorKind::Configuration);
        let err: SamplerError = AudioOutputError::NotOpen.into();
        assert_eq!(err.kind(), ErrorKind::Output);
    }
}
