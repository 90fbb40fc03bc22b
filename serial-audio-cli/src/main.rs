mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use serial_audio_core::{AppConfig, ConfigFile};

fn main() -> ExitCode {
    let args = cli::Args::parse();
    cli::init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &cli::Args) -> Result<()> {
    let config_file = ConfigFile::new(&args.config);
    let config: AppConfig = config_file
        .load_or_heal()
        .with_context(|| format!("failed to load {}", config_file.path().display()))?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("invalid configuration in {}", config_file.path().display()))?;

    info!(
        "Config: port {} at {} baud, calibration {}s",
        config.serial_port.name, config.serial_port.baud_rate, config.audio.sample_calc_duration_sec
    );

    platform::run(args, &config)
}

#[cfg(target_os = "windows")]
mod platform {
    use std::io;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use log::{debug, info, warn};

    use serial_audio_core::{AppConfig, SerialAudioSampler, SessionReport};
    use serial_audio_windows::{list_output_devices, WaveOutDevice, Win32SerialPort};

    use crate::cli::{self, Args, Mode};

    pub fn run(args: &Args, config: &AppConfig) -> Result<()> {
        if args.list_devices {
            for device in list_output_devices() {
                println!("{}: {}", device.index, device.name);
            }
            return Ok(());
        }

        let mode = match args.mode {
            Some(mode) => mode,
            None => cli::prompt_mode(&mut io::stdin().lock())?,
        };

        let port = Win32SerialPort::open(&config.serial_port.name, config.serial_port.baud_rate)
            .with_context(|| format!("failed to open {}", config.serial_port.name))?;
        match port.modem_status() {
            Ok(lines) => debug!(
                "Modem lines: CTS={} DSR={} RI={} DCD={}",
                lines.cts, lines.dsr, lines.ring, lines.dcd
            ),
            Err(e) => warn!("Could not read modem status: {}", e),
        }
        let mut sampler =
            SerialAudioSampler::new(port, config.sampler_config()).context("sampling rate calibration failed")?;

        match mode {
            Mode::File => sampler.start_to_file(config.output_path())?,
            Mode::Stream => {
                let device = WaveOutDevice::new(config.audio.device)
                    .with_context(|| format!("audio device {} not available", config.audio.device))?;
                sampler.start_streaming(Box::new(device), config.stream_buffer())?;
            }
        }

        println!("Sampling at {} Hz. Press Enter to stop.", sampler.sampling_rate());
        cli::wait_for_enter(&mut io::stdin().lock())?;

        sampler.stop();
        let report = sampler.sync()?;

        if mode == Mode::Stream {
            let timeout = config.stream_buffer() * 4 + Duration::from_millis(500);
            if !sampler.drain_playback(timeout) {
                warn!("Playback did not drain within {} ms", timeout.as_millis());
            }
            if let Some(stats) = sampler.queue_stats() {
                info!(
                    "Playback queue: {} submitted, {} completed, peak depth {}",
                    stats.submitted, stats.completed, stats.peak_depth
                );
            }
        }

        if let Some(report) = report {
            log_report(&report);
        }
        Ok(())
    }

    fn log_report(report: &SessionReport) {
        info!(
            "Captured {} samples ({:.2}s of audio) in {:.2}s",
            report.samples_captured,
            report.audio_duration_secs(),
            report.wall_time.as_secs_f64()
        );
        if let Some(ref recording) = report.recording {
            info!("Wrote {} (sha256 {})", recording.file_path.display(), recording.checksum);
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use anyhow::{bail, Result};

    use serial_audio_core::AppConfig;

    use crate::cli::Args;

    pub fn run(_args: &Args, _config: &AppConfig) -> Result<()> {
        bail!("no serial port or audio backend for this platform; serial-audio requires Windows")
    }
}
