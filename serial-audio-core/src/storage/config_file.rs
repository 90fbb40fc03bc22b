use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::models::config::AppConfig;
use crate::models::error::SamplerError;

/// File name used when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.cfg";

/// Sectioned key/value configuration file that repairs itself on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, falling back to defaults for anything missing
    /// or malformed, then write the normalized file back.
    ///
    /// Only a file that exists but cannot be read is an error. A failed
    /// write-back is logged and the loaded values are still returned.
    pub fn load_or_heal(&self) -> Result<AppConfig, SamplerError> {
        let config = match fs::read_to_string(&self.path) {
            Ok(text) => parse_lenient(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config at {}, creating defaults", self.path.display());
                AppConfig::default()
            }
            Err(e) => {
                return Err(SamplerError::ConfigurationFailed(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if let Err(e) = self.save(&config) {
            warn!("Could not write config back: {}", e);
        }
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), SamplerError> {
        let text = toml::to_string_pretty(config)
            .map_err(|e| SamplerError::ConfigurationFailed(format!("failed to serialize config: {}", e)))?;
        fs::write(&self.path, text)
            .map_err(|e| SamplerError::StorageError(format!("failed to write {}: {}", self.path.display(), e)))
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

/// Parse configuration text, keeping defaults for every key that is absent
/// or unparsable. A leading UTF-8 BOM is ignored.
///
/// The file is read as `[Section]` headers followed by `Key=Value` lines.
/// Strings may be bare or double-quoted, booleans are `true`/`TRUE`, and
/// anything after an unquoted `;` or `#` is a comment. Files written by
/// `ConfigFile::save` use the same layout.
pub fn parse_lenient(text: &str) -> AppConfig {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let sections = read_sections(text);
    let mut config = AppConfig::default();

    overlay(&sections, "SerialPort", "Name", &mut config.serial_port.name);
    overlay(&sections, "SerialPort", "BaudRate", &mut config.serial_port.baud_rate);

    let audio = &mut config.audio;
    overlay(&sections, "Audio", "Device", &mut audio.device);
    overlay(&sections, "Audio", "SampleCalcDurationSec", &mut audio.sample_calc_duration_sec);
    overlay(&sections, "Audio", "StreamBufferMs", &mut audio.stream_buffer_ms);
    overlay(&sections, "Audio", "FileName", &mut audio.file_name);
    overlay(&sections, "Audio", "Attenuation", &mut audio.attenuation);
    overlay(&sections, "Audio", "ReadTimeoutMs", &mut audio.read_timeout_ms);
    overlay(&sections, "Audio", "WriteMetadata", &mut audio.write_metadata);

    config
}

/// Raw values by section, then key.
type Sections = HashMap<String, HashMap<String, String>>;

fn read_sections(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current = String::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[') {
            let name = header.split_once(']').map_or(header, |(name, _)| name);
            current = name.trim().to_string();
            continue;
        }

        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("Ignoring config line {}: expected Key=Value", number + 1);
            continue;
        };
        sections
            .entry(current.clone())
            .or_default()
            .insert(key.trim().to_string(), value.trim().to_string());
    }
    sections
}

/// Cut `line` at the first `;` or `#` outside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (pos, c) in line.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(open)) if c == open => quote = None,
            (';' | '#', None) => return &line[..pos],
            _ => {}
        }
    }
    line
}

/// Strip one pair of matching double or single quotes. `save` writes
/// strings with backslashes (Windows paths) in single quotes.
fn unquote(raw: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|q| raw.strip_prefix(q).and_then(|inner| inner.strip_suffix(q)))
        .unwrap_or(raw)
}

/// A setting that can be read from a raw file value.
trait ConfigValue: Sized {
    fn from_raw(raw: &str) -> Option<Self>;
}

impl ConfigValue for String {
    fn from_raw(raw: &str) -> Option<Self> {
        let value = unquote(raw);
        (!value.is_empty()).then(|| value.to_string())
    }
}

impl ConfigValue for u32 {
    fn from_raw(raw: &str) -> Option<Self> {
        unquote(raw).parse().ok()
    }
}

impl ConfigValue for f32 {
    fn from_raw(raw: &str) -> Option<Self> {
        unquote(raw).parse::<f32>().ok().filter(|v| v.is_finite())
    }
}

impl ConfigValue for bool {
    fn from_raw(raw: &str) -> Option<Self> {
        match unquote(raw).to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

fn overlay<T: ConfigValue>(sections: &Sections, section: &str, key: &str, slot: &mut T) {
    let Some(raw) = sections.get(section).and_then(|s| s.get(key)) else {
        return;
    };
    match T::from_raw(raw) {
        Some(value) => *slot = value,
        None => warn!("Ignoring {}.{}: cannot use {:?}", section, key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::AudioSection;
    use crate::test_support::temp_file_path;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = temp_file_path("cfg_missing.cfg");
        fs::remove_file(&path).ok();

        let config = ConfigFile::new(&path).load_or_heal().unwrap();
        assert_eq!(config, AppConfig::default());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[SerialPort]"));
        assert!(written.contains("Name = \"COM1\""));
        assert_eq!(parse_lenient(&written), AppConfig::default());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn bom_is_stripped() {
        let config = parse_lenient("\u{feff}[SerialPort]\nName = \"COM4\"\nBaudRate = 9600\n");
        assert_eq!(config.serial_port.name, "COM4");
        assert_eq!(config.serial_port.baud_rate, 9600);
    }

    #[test]
    fn bad_value_keeps_default_for_that_key_only() {
        let config = parse_lenient("[Audio]\nStreamBufferMs = \"fast\"\nFileName = \"take.wav\"\n");
        assert_eq!(config.audio.stream_buffer_ms, 50);
        assert_eq!(config.audio.file_name, "take.wav");
    }

    #[test]
    fn unusable_lines_keep_defaults() {
        let path = temp_file_path("cfg_malformed.cfg");
        fs::write(&path, "[SerialPort\nName = \ngarbage\n").unwrap();

        let config = ConfigFile::new(&path).load_or_heal().unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(parse_lenient(&fs::read_to_string(&path).unwrap()), AppConfig::default());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn legacy_key_value_file_survives_healing() {
        // Layout written by the earlier tool: sorted keys, no spaces around
        // `=`, quoted strings, `#` descriptions and trailing `;` comments.
        let legacy = "\u{feff}#Sampler audio settings\n\
                      [Audio]\n\
                      Device=2\n\
                      FileName=\"take.wav\"\n\
                      SampleCalcDurationSec=3\t;seconds\n\
                      StreamBufferMs=80\n\
                      \n\
                      [SerialPort]\n\
                      BaudRate=9600\n\
                      Name=\"COM3\"\n";
        let path = temp_file_path("cfg_legacy.cfg");
        fs::write(&path, legacy).unwrap();

        let config = ConfigFile::new(&path).load_or_heal().unwrap();
        assert_eq!(config.serial_port.name, "COM3");
        assert_eq!(config.serial_port.baud_rate, 9600);
        assert_eq!(config.audio.device, 2);
        assert_eq!(config.audio.file_name, "take.wav");
        assert_eq!(config.audio.sample_calc_duration_sec, 3);
        assert_eq!(config.audio.stream_buffer_ms, 80);
        assert_eq!(config.audio.attenuation, AudioSection::default().attenuation);

        // The healed file keeps every value and gains the missing keys.
        let healed = fs::read_to_string(&path).unwrap();
        assert_eq!(parse_lenient(&healed), config);
        assert!(healed.contains("ReadTimeoutMs"));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn bare_strings_and_upper_case_booleans() {
        let config = parse_lenient(
            "[SerialPort]\nName=COM3 ; left port\n[Audio]\nFileName=out/take 1.wav\nWriteMetadata=TRUE\n",
        );
        assert_eq!(config.serial_port.name, "COM3");
        assert_eq!(config.audio.file_name, "out/take 1.wav");
        assert!(config.audio.write_metadata);
    }

    #[test]
    fn comment_characters_inside_quotes_are_kept() {
        let config = parse_lenient("[Audio]\nFileName = \"take#2;b.wav\" # comment\n");
        assert_eq!(config.audio.file_name, "take#2;b.wav");
    }

    #[test]
    fn partial_file_is_completed_on_disk() {
        let path = temp_file_path("cfg_partial.cfg");
        fs::write(&path, "[Audio]\nDevice = 2\n").unwrap();

        let config = ConfigFile::new(&path).load_or_heal().unwrap();
        assert_eq!(config.audio.device, 2);

        let healed = fs::read_to_string(&path).unwrap();
        assert!(healed.contains("SampleCalcDurationSec = 5"));
        assert!(healed.contains("[SerialPort]"));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn save_then_load_preserves_values() {
        let path = temp_file_path("cfg_save.cfg");
        let mut config = AppConfig::default();
        config.serial_port.name = "COM9".into();
        config.audio.write_metadata = true;
        config.audio.file_name = r"C:\rec\take.wav".into();

        let file = ConfigFile::new(&path);
        file.save(&config).unwrap();
        assert_eq!(file.load_or_heal().unwrap(), config);

        fs::remove_file(&path).ok();
    }
}
