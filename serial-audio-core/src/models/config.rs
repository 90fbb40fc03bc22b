use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Baud rates the serial layer accepts.
pub const SUPPORTED_BAUD_RATES: [u32; 15] = [
    110, 300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 56000, 57600, 115200, 128000, 256000,
];

/// Longest playback segment accepted, in milliseconds.
pub const MAX_STREAM_BUFFER_MS: u32 = 10_000;

/// Default attenuation applied to every raw sample.
pub const DEFAULT_ATTENUATION: f32 = 0.33;

/// Runtime settings for a `SerialAudioSampler`.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Length of the sampling-rate calibration window (default: 5 s).
    pub calibration: Duration,

    /// Factor applied to each raw sample (default: 0.33).
    pub attenuation: f32,

    /// Timeout for each sample poll; zero means busy polling (default).
    pub read_timeout: Duration,

    /// Write a JSON metadata sidecar next to each recorded WAV file.
    pub write_metadata: bool,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.calibration < Duration::from_millis(100) {
            return Err("calibration window must cover at least one 100 ms interval".into());
        }
        if !self.attenuation.is_finite() || self.attenuation <= 0.0 {
            return Err(format!("attenuation must be positive: {}", self.attenuation));
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            calibration: Duration::from_secs(5),
            attenuation: DEFAULT_ATTENUATION,
            read_timeout: Duration::ZERO,
            write_metadata: false,
        }
    }
}

/// `[SerialPort]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialPortSection {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "BaudRate")]
    pub baud_rate: u32,
}

impl Default for SerialPortSection {
    fn default() -> Self {
        Self {
            name: "COM1".into(),
            baud_rate: 115200,
        }
    }
}

/// `[Audio]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    /// Output device index used for live streaming.
    #[serde(rename = "Device")]
    pub device: u32,

    #[serde(rename = "SampleCalcDurationSec")]
    pub sample_calc_duration_sec: u32,

    /// Duration of each playback segment.
    #[serde(rename = "StreamBufferMs")]
    pub stream_buffer_ms: u32,

    #[serde(rename = "FileName")]
    pub file_name: String,

    #[serde(rename = "Attenuation")]
    pub attenuation: f32,

    #[serde(rename = "ReadTimeoutMs")]
    pub read_timeout_ms: u32,

    #[serde(rename = "WriteMetadata")]
    pub write_metadata: bool,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            device: 0,
            sample_calc_duration_sec: 5,
            stream_buffer_ms: 50,
            file_name: "result.wav".into(),
            attenuation: DEFAULT_ATTENUATION,
            read_timeout_ms: 0,
            write_metadata: false,
        }
    }
}

/// Application settings as stored in the sectioned configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(rename = "SerialPort")]
    pub serial_port: SerialPortSection,

    #[serde(rename = "Audio")]
    pub audio: AudioSection,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.serial_port.name.trim().is_empty() {
            return Err("serial port name is empty".into());
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.serial_port.baud_rate) {
            return Err(format!("unsupported baud rate: {}", self.serial_port.baud_rate));
        }
        if self.audio.sample_calc_duration_sec == 0 {
            return Err("SampleCalcDurationSec must be at least 1".into());
        }
        if self.audio.stream_buffer_ms == 0 || self.audio.stream_buffer_ms > MAX_STREAM_BUFFER_MS {
            return Err(format!(
                "StreamBufferMs must be between 1 and {}: {}",
                MAX_STREAM_BUFFER_MS, self.audio.stream_buffer_ms
            ));
        }
        if self.audio.file_name.trim().is_empty() {
            return Err("output file name is empty".into());
        }
        self.sampler_config().validate()
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            calibration: Duration::from_secs(self.audio.sample_calc_duration_sec as u64),
            attenuation: self.audio.attenuation,
            read_timeout: Duration::from_millis(self.audio.read_timeout_ms as u64),
            write_metadata: self.audio.write_metadata,
        }
    }

    pub fn stream_buffer(&self) -> Duration {
        Duration::from_millis(self.audio.stream_buffer_ms as u64)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.audio.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial_port.name, "COM1");
        assert_eq!(config.audio.stream_buffer_ms, 50);
        assert_eq!(config.stream_buffer(), Duration::from_millis(50));
    }

    #[test]
    fn rejects_unsupported_baud_rate() {
        let mut config = AppConfig::default();
        config.serial_port.baud_rate = 12345;
        assert_eq!(config.validate().unwrap_err(), "unsupported baud rate: 12345");
    }

    #[test]
    fn rejects_zero_calibration() {
        let mut config = AppConfig::default();
        config.audio.sample_calc_duration_sec = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn stream_buffer_bounds() {
        let mut config = AppConfig::default();
        config.audio.stream_buffer_ms = MAX_STREAM_BUFFER_MS;
        assert!(config.validate().is_ok());

        config.audio.stream_buffer_ms = u32::MAX;
        assert!(config.validate().unwrap_err().starts_with("StreamBufferMs must be between"));

        config.audio.stream_buffer_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sampler_config_derivation() {
        let mut config = AppConfig::default();
        config.audio.sample_calc_duration_sec = 1;
        config.audio.read_timeout_ms = 5;
        let sampler = config.sampler_config();
        assert_eq!(sampler.calibration, Duration::from_secs(1));
        assert_eq!(sampler.read_timeout, Duration::from_millis(5));
        assert!(!sampler.write_metadata);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config: AppConfig = toml::from_str("[SerialPort]\nName = \"COM7\"\n").unwrap();
        assert_eq!(config.serial_port.name, "COM7");
        assert_eq!(config.serial_port.baud_rate, 115200);
        assert_eq!(config.audio, AudioSection::default());
    }
}
