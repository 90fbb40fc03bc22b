//! Win32 serial port transport.
//!
//! Opens a COM device with `CreateFileW`, configures 8N1 framing through the
//! device control block, and reads with `COMMTIMEOUTS` tuned so that a read
//! returns as soon as any byte is buffered.

use std::time::Duration;

use log::{debug, info, warn};
use windows::core::PCWSTR;
use windows::Win32::Devices::Communication::*;
use windows::Win32::Foundation::*;
use windows::Win32::Storage::FileSystem::*;

use serial_audio_core::models::config::SUPPORTED_BAUD_RATES;
use serial_audio_core::models::error::TransportError;
use serial_audio_core::traits::serial_transport::SerialTransport;

// DCB bit field layout.
const DCB_BINARY: u32 = 1 << 0;
const DCB_DTR_CONTROL_SHIFT: u32 = 4;
const DCB_RTS_CONTROL_SHIFT: u32 = 12;
const DTR_CONTROL_ENABLE: u32 = 1;
const RTS_CONTROL_ENABLE: u32 = 1;

/// Modem line status reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModemStatus {
    pub cts: bool,
    pub dsr: bool,
    pub ring: bool,
    pub dcd: bool,
}

/// A COM port opened for raw byte I/O.
pub struct Win32SerialPort {
    handle: HANDLE,
    name: String,
    baud_rate: u32,
    /// Timeout the device is currently configured for.
    read_timeout: Option<Duration>,
}

// SAFETY: the handle is owned exclusively by this value and only used through
// `&mut self`; Win32 file handles may be used from any thread.
unsafe impl Send for Win32SerialPort {}

impl Win32SerialPort {
    /// Open `name` (e.g. `COM3`) at `baud_rate`, 8 data bits, no parity, one
    /// stop bit.
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
            return Err(TransportError::InvalidBaudRate(baud_rate));
        }

        let path = device_path(name);
        let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();

        let handle = unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                (GENERIC_READ | GENERIC_WRITE).0,
                FILE_SHARE_MODE(0),
                None,
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                None,
            )
        }
        .map_err(|e| {
            if e.code() == ERROR_FILE_NOT_FOUND.to_hresult() {
                TransportError::FileNotFound(name.to_string())
            } else {
                TransportError::InvalidHandle(format!("{}: {}", name, e))
            }
        })?;

        let mut port = Self {
            handle,
            name: name.to_string(),
            baud_rate,
            read_timeout: None,
        };
        port.configure()?;
        port.set_read_timeout(Duration::ZERO)?;
        // Bytes queued before the open would skew calibration.
        port.flush_receiver()?;

        info!("Opened {} at {} baud", port.name, baud_rate);
        Ok(port)
    }

    fn configure(&mut self) -> Result<(), TransportError> {
        let mut dcb = DCB {
            DCBlength: std::mem::size_of::<DCB>() as u32,
            ..Default::default()
        };
        unsafe { GetCommState(self.handle, &mut dcb) }
            .map_err(|e| TransportError::ConfigurationFailed(format!("GetCommState failed: {}", e)))?;

        dcb.BaudRate = self.baud_rate;
        dcb.ByteSize = 8;
        dcb.Parity = NOPARITY;
        dcb.StopBits = ONESTOPBIT;
        dcb._bitfield = DCB_BINARY
            | (DTR_CONTROL_ENABLE << DCB_DTR_CONTROL_SHIFT)
            | (RTS_CONTROL_ENABLE << DCB_RTS_CONTROL_SHIFT);

        unsafe { SetCommState(self.handle, &dcb) }
            .map_err(|e| TransportError::ConfigurationFailed(format!("SetCommState failed: {}", e)))
    }

    /// Configure how long `ReadFile` may wait when the buffer is empty.
    ///
    /// With `ReadIntervalTimeout` and the multiplier at `MAXDWORD`, a read
    /// returns immediately when bytes are buffered and otherwise waits up to
    /// the constant; a zero constant makes it return at once.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.read_timeout == Some(timeout) {
            return Ok(());
        }
        let millis = timeout.as_millis().min(u32::MAX as u128 - 1) as u32;
        let timeouts = COMMTIMEOUTS {
            ReadIntervalTimeout: u32::MAX,
            ReadTotalTimeoutMultiplier: if millis == 0 { 0 } else { u32::MAX },
            ReadTotalTimeoutConstant: millis,
            WriteTotalTimeoutMultiplier: 0,
            WriteTotalTimeoutConstant: 1000,
        };
        unsafe { SetCommTimeouts(self.handle, &timeouts) }
            .map_err(|e| TransportError::ConfigurationFailed(format!("SetCommTimeouts failed: {}", e)))?;
        self.read_timeout = Some(timeout);
        Ok(())
    }

    pub fn set_dtr(&mut self, on: bool) -> Result<(), TransportError> {
        self.escape(if on { SETDTR } else { CLRDTR })
    }

    pub fn set_rts(&mut self, on: bool) -> Result<(), TransportError> {
        self.escape(if on { SETRTS } else { CLRRTS })
    }

    fn escape(&mut self, function: ESCAPE_COMM_FUNCTION) -> Result<(), TransportError> {
        self.ensure_open()?;
        unsafe { EscapeCommFunction(self.handle, function) }
            .map_err(|e| TransportError::WriteFailed(format!("EscapeCommFunction failed: {}", e)))
    }

    /// Query CTS, DSR, RI and DCD.
    pub fn modem_status(&self) -> Result<ModemStatus, TransportError> {
        self.ensure_open()?;
        let mut flags = MODEM_STATUS_FLAGS(0);
        unsafe { GetCommModemStatus(self.handle, &mut flags) }
            .map_err(|e| TransportError::ReadFailed(format!("GetCommModemStatus failed: {}", e)))?;
        Ok(ModemStatus {
            cts: flags.0 & MS_CTS_ON.0 != 0,
            dsr: flags.0 & MS_DSR_ON.0 != 0,
            ring: flags.0 & MS_RING_ON.0 != 0,
            dcd: flags.0 & MS_RLSD_ON.0 != 0,
        })
    }

    /// Discard everything waiting in the receive buffer.
    pub fn flush_receiver(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        unsafe { PurgeComm(self.handle, PURGE_RXCLEAR | PURGE_RXABORT) }
            .map_err(|e| TransportError::ReadFailed(format!("PurgeComm failed: {}", e)))
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.handle.is_invalid() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl SerialTransport for Win32SerialPort {
    fn read_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.ensure_open()?;
        self.set_read_timeout(timeout)?;

        let mut read = 0u32;
        unsafe { ReadFile(self.handle, Some(buf), Some(&mut read), None) }
            .map_err(|e| TransportError::ReadFailed(format!("{}: {}", self.name, e)))?;
        Ok(read as usize)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut offset = 0;
        while offset < data.len() {
            let mut written = 0u32;
            unsafe { WriteFile(self.handle, Some(&data[offset..]), Some(&mut written), None) }
                .map_err(|e| TransportError::WriteFailed(format!("{}: {}", self.name, e)))?;
            if written == 0 {
                return Err(TransportError::WriteFailed(format!("{}: write timed out", self.name)));
            }
            offset += written as usize;
        }
        Ok(())
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        self.ensure_open()?;
        let mut status = COMSTAT::default();
        unsafe { ClearCommError(self.handle, None, Some(&mut status)) }
            .map_err(|e| TransportError::ReadFailed(format!("ClearCommError failed: {}", e)))?;
        Ok(status.cbInQue as usize)
    }

    fn close(&mut self) {
        if self.handle.is_invalid() {
            return;
        }
        if let Err(e) = unsafe { CloseHandle(self.handle) } {
            warn!("Closing {} failed: {}", self.name, e);
        }
        self.handle = INVALID_HANDLE_VALUE;
        debug!("Closed {}", self.name);
    }

    fn port_name(&self) -> &str {
        &self.name
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Drop for Win32SerialPort {
    fn drop(&mut self) {
        self.close();
    }
}

/// `COM10` and above are only reachable through the device namespace.
fn device_path(name: &str) -> String {
    if name.starts_with(r"\\.\") {
        name.to_string()
    } else {
        format!(r"\\.\{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_uses_device_namespace() {
        assert_eq!(device_path("COM3"), r"\\.\COM3");
        assert_eq!(device_path(r"\\.\COM12"), r"\\.\COM12");
    }

    #[test]
    fn unsupported_baud_rate_is_rejected_before_open() {
        let err = Win32SerialPort::open("COM1", 12345).err();
        assert_eq!(err, Some(TransportError::InvalidBaudRate(12345)));
    }

    #[test]
    fn line_control_on_closed_port_fails() {
        let mut port = Win32SerialPort {
            handle: INVALID_HANDLE_VALUE,
            name: "COM1".into(),
            baud_rate: 9600,
            read_timeout: None,
        };
        assert_eq!(port.set_dtr(true), Err(TransportError::Closed));
        assert_eq!(port.set_rts(false), Err(TransportError::Closed));
        assert_eq!(port.modem_status(), Err(TransportError::Closed));
        assert_eq!(port.flush_receiver(), Err(TransportError::Closed));
        assert_eq!(port.available(), Err(TransportError::Closed));
    }

    #[test]
    fn missing_port_is_not_found() {
        let err = Win32SerialPort::open("COM255", 9600).err();
        assert!(matches!(
            err,
            Some(TransportError::FileNotFound(_)) | Some(TransportError::InvalidHandle(_))
        ));
    }
}
