use std::time::Duration;

use crate::models::error::TransportError;

/// Byte-oriented access to an open serial device.
///
/// Implemented by:
/// - `Win32SerialPort` (Windows)
/// - in-memory fakes in tests
///
/// Opening is implementation specific; a value of this trait is always an
/// open port until `close` is called.
pub trait SerialTransport: Send {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// A zero timeout returns whatever is already buffered. `Ok(0)` means
    /// nothing arrived in time; `Err` is a hard failure of the device.
    fn read_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Write all of `data`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Number of bytes waiting in the receive buffer.
    fn available(&mut self) -> Result<usize, TransportError>;

    /// Release the device. Further reads fail with `TransportError::Closed`.
    fn close(&mut self);

    /// Device name the port was opened with (e.g. `COM3`).
    fn port_name(&self) -> &str;

    fn baud_rate(&self) -> u32;
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn read_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read_bytes(buf, timeout)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write_bytes(data)
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        (**self).available()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn port_name(&self) -> &str {
        (**self).port_name()
    }

    fn baud_rate(&self) -> u32 {
        (**self).baud_rate()
    }
}
