//! Command-line interface for serial-audio
//!
//! Handles argument parsing, logging configuration and the interactive prompts.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::LevelFilter;

use serial_audio_core::DEFAULT_CONFIG_FILE;

/// What to do with the sampled audio.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Record into the configured WAV file
    File,
    /// Play live on the configured output device
    Stream,
}

/// serial-audio - Record or play audio sampled by a device on a serial port
#[derive(Parser, Debug)]
#[command(name = "serial-audio")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file, created with defaults if missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output mode; asked for on stdin when omitted
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// List audio output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Increase logging verbosity
    /// -v = debug, -vv = trace, -vvv = trace for dependencies too
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(if args.verbose >= 3 { args.log_level() } else { LevelFilter::Warn });

    for module in ["serial_audio", "serial_audio_core", "serial_audio_windows"] {
        builder.filter_module(module, args.log_level());
    }

    builder.format_timestamp_millis().init();
}

/// Parse a mode answer: `0` records to file, `1` streams.
pub fn parse_mode(answer: &str) -> Result<Mode> {
    match answer.trim() {
        "0" => Ok(Mode::File),
        "1" => Ok(Mode::Stream),
        other => bail!("invalid mode '{}': expected 0 (file) or 1 (stream)", other),
    }
}

/// Ask for the mode on `input` until a valid answer arrives.
///
/// Fails only when the input ends or cannot be read.
pub fn prompt_mode(input: &mut impl BufRead) -> Result<Mode> {
    loop {
        println!("Select mode: 0 = record to file, 1 = stream to audio device");
        let mut line = String::new();
        let read = input.read_line(&mut line).context("failed to read mode from stdin")?;
        if read == 0 {
            bail!("no mode selected before end of input");
        }
        match parse_mode(&line) {
            Ok(mode) => return Ok(mode),
            Err(e) => println!("{}", e),
        }
    }
}

/// Block until a line (or end of input) arrives on `input`.
pub fn wait_for_enter(input: &mut impl BufRead) -> Result<()> {
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read from stdin")?;
    Ok(())
}
