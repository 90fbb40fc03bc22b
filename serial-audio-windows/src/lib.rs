//! # serial-audio-windows
//!
//! Windows backend for serial-audio-kit.
//!
//! Provides:
//! - `Win32SerialPort`: COM port transport via `CreateFileW`, DCB and `COMMTIMEOUTS`
//! - `WaveOutDevice`: Live playback via waveOut with an event-driven completion thread
//! - `list_output_devices`: waveOut output device enumeration
//!
//! ## Usage
//! ```ignore
//! use serial_audio_core::{SamplerConfig, SerialAudioSampler};
//! use serial_audio_windows::{Win32SerialPort, WaveOutDevice};
//! use std::time::Duration;
//!
//! let port = Win32SerialPort::open("COM3", 115200).unwrap();
//! let mut sampler = SerialAudioSampler::new(port, SamplerConfig::default()).unwrap();
//! sampler.start_streaming(Box::new(WaveOutDevice::new(0).unwrap()), Duration::from_millis(50)).unwrap();
//! ```

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod serial_port;
#[cfg(target_os = "windows")]
pub mod wave_out;

#[cfg(target_os = "windows")]
pub use device_enumerator::list_output_devices;
#[cfg(target_os = "windows")]
pub use serial_port::{ModemStatus, Win32SerialPort};
#[cfg(target_os = "windows")]
pub use wave_out::WaveOutDevice;
