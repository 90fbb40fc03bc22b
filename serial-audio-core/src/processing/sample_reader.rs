use std::time::Duration;

use crate::models::error::TransportError;
use crate::models::segment::{Sample, SAMPLE_SIZE};
use crate::traits::serial_transport::SerialTransport;

/// Assembles whole samples from a serial transport.
///
/// A short-timeout read can return a single byte; that byte is kept until its
/// partner arrives, so the sample stream never shifts by one byte.
#[derive(Debug, Default)]
pub struct SampleReader {
    pending: [u8; SAMPLE_SIZE],
    filled: usize,
}

impl SampleReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll the transport once. Returns `Ok(None)` if no complete sample is
    /// available yet.
    pub fn poll<T: SerialTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<Option<Sample>, TransportError> {
        let read = transport.read_bytes(&mut self.pending[self.filled..], timeout)?;
        self.filled = (self.filled + read).min(SAMPLE_SIZE);
        if self.filled < SAMPLE_SIZE {
            return Ok(None);
        }
        self.filled = 0;
        Ok(Some(Sample::from_le_bytes(self.pending)))
    }

    /// Whether half a sample is buffered.
    pub fn has_partial(&self) -> bool {
        self.filled > 0
    }
}
