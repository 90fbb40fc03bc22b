use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::models::audio_models::{QueueStats, SamplerDiagnostics, StreamFormat};
use crate::models::config::{SamplerConfig, MAX_STREAM_BUFFER_MS};
use crate::models::error::SamplerError;
use crate::models::recording_result::SessionReport;
use crate::models::state::SessionState;
use crate::processing::playback_queue::PlaybackQueue;
use crate::processing::rate_estimator::RateEstimator;
use crate::processing::sample_scaler::SampleScaler;
use crate::session::acquisition::{Acquisition, ActiveSink, FileSink, LiveCounters, PlaybackSink};
use crate::traits::audio_output::AudioOutput;
use crate::traits::clock::{Clock, MonotonicClock};
use crate::traits::sampler_delegate::SamplerDelegate;
use crate::traits::serial_transport::SerialTransport;

/// Where a session sends its samples.
pub enum SinkTarget {
    /// Record the whole session into one WAV file, written on stop.
    File { path: PathBuf },
    /// Stream `buffer`-long segments to an audio device.
    Playback {
        output: Box<dyn AudioOutput>,
        buffer: Duration,
    },
}

/// Session controller for a serial audio source.
///
/// The sampling rate is calibrated once, when the sampler is created, and
/// stays fixed for every session that follows:
/// ```text
/// [SerialTransport] → [SampleReader] → [SampleScaler] ─┬→ [FileSink] → WAV file
///                                                      └→ [PlaybackSink] → [PlaybackQueue] → [AudioOutput]
/// ```
///
/// At most one producer thread runs per sampler. `start` spawns it, `stop`
/// asks it to finish, `sync` waits for it and returns the session outcome.
pub struct SerialAudioSampler<T: SerialTransport + 'static> {
    transport: Arc<Mutex<T>>,
    config: SamplerConfig,
    format: StreamFormat,
    scaler: SampleScaler,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<SessionState>>,
    stop_flag: Arc<AtomicBool>,
    counters: Arc<LiveCounters>,
    delegate: Option<Arc<dyn SamplerDelegate>>,
    playback: Option<Arc<PlaybackQueue>>,
    worker: Option<thread::JoinHandle<Result<SessionReport, SamplerError>>>,
}

impl<T: SerialTransport + 'static> SerialAudioSampler<T> {
    /// Calibrate the sampling rate on `transport` and build a sampler.
    ///
    /// Blocks for `config.calibration`.
    pub fn new(transport: T, config: SamplerConfig) -> Result<Self, SamplerError> {
        Self::with_clock(transport, config, Arc::new(MonotonicClock::new()))
    }

    /// Like `new`, timing calibration and segments with `clock`.
    pub fn with_clock(mut transport: T, config: SamplerConfig, clock: Arc<dyn Clock>) -> Result<Self, SamplerError> {
        config.validate().map_err(SamplerError::ConfigurationFailed)?;

        let rate = RateEstimator::new(config.calibration).estimate(&mut transport, clock.as_ref())?;
        Self::with_format(transport, config, StreamFormat::mono16(rate), clock)
    }

    /// Build a sampler for a source whose rate is already known.
    pub fn with_format(
        transport: T,
        config: SamplerConfig,
        format: StreamFormat,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SamplerError> {
        config.validate().map_err(SamplerError::ConfigurationFailed)?;
        format.validate().map_err(SamplerError::ConfigurationFailed)?;

        Ok(Self {
            transport: Arc::new(Mutex::new(transport)),
            scaler: SampleScaler::new(config.attenuation),
            config,
            format,
            clock,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(LiveCounters::default()),
            delegate: None,
            playback: None,
            worker: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SamplerDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn sampling_rate(&self) -> u32 {
        self.format.sampling_rate
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Counters for the current or most recent session.
    pub fn diagnostics(&self) -> SamplerDiagnostics {
        self.counters.snapshot()
    }

    /// Playback queue counters, if a live session has run.
    pub fn queue_stats(&self) -> Option<QueueStats> {
        self.playback.as_ref().map(|queue| queue.stats())
    }

    pub fn start_to_file(&mut self, path: impl Into<PathBuf>) -> Result<(), SamplerError> {
        self.start(SinkTarget::File { path: path.into() })
    }

    pub fn start_streaming(&mut self, output: Box<dyn AudioOutput>, buffer: Duration) -> Result<(), SamplerError> {
        self.start(SinkTarget::Playback { output, buffer })
    }

    /// Bind the sink and spawn the producer. Transitions: idle/stopped/failed → sampling.
    ///
    /// Fails with `AlreadySampling` while a session is sampling or stopping;
    /// the running session is left untouched.
    pub fn start(&mut self, target: SinkTarget) -> Result<(), SamplerError> {
        if !self.state.lock().can_start() {
            return Err(SamplerError::AlreadySampling);
        }

        // The previous producer has already published its final state.
        if let Some(stale) = self.worker.take() {
            if let Ok(Err(e)) = stale.join() {
                debug!("Discarding unsynced result of previous session: {}", e);
            }
        }
        if let Some(previous) = self.playback.take() {
            previous.close();
        }

        let sink = match target {
            SinkTarget::File { path } => {
                info!("Recording to {}", path.display());
                ActiveSink::File(FileSink::new(path, self.format, self.config.write_metadata))
            }
            SinkTarget::Playback { output, buffer } => {
                if buffer.is_zero() || buffer > Duration::from_millis(MAX_STREAM_BUFFER_MS.into()) {
                    return Err(SamplerError::ConfigurationFailed(format!(
                        "stream buffer must be between 1 and {} ms",
                        MAX_STREAM_BUFFER_MS
                    )));
                }
                let queue = Arc::new(PlaybackQueue::open(output, self.format)?);
                info!(
                    "Streaming to '{}' in {} ms segments",
                    queue.device().name,
                    buffer.as_millis()
                );
                self.playback = Some(Arc::clone(&queue));
                ActiveSink::Playback(PlaybackSink::new(
                    queue,
                    buffer,
                    Arc::clone(&self.clock),
                    self.delegate.clone(),
                ))
            }
        };

        self.stop_flag.store(false, Ordering::SeqCst);
        self.counters.reset();

        let acquisition = Acquisition {
            transport: Arc::clone(&self.transport),
            format: self.format,
            scaler: self.scaler,
            read_timeout: self.config.read_timeout,
            sink,
            stop_flag: Arc::clone(&self.stop_flag),
            counters: Arc::clone(&self.counters),
            clock: Arc::clone(&self.clock),
        };

        let previous_state = self.state();
        publish_state(&self.state, &self.delegate, SessionState::Sampling);

        let state = Arc::clone(&self.state);
        let delegate = self.delegate.clone();
        let spawned = thread::Builder::new()
            .name("serial-acquisition".into())
            .spawn(move || {
                let result = acquisition.run();
                match &result {
                    Ok(report) => {
                        publish_state(&state, &delegate, SessionState::Stopped);
                        if let Some(ref d) = delegate {
                            d.on_session_finished(report);
                        }
                    }
                    Err(e) => {
                        if let Some(ref d) = delegate {
                            d.on_error(e);
                        }
                        publish_state(&state, &delegate, SessionState::Failed(e.clone()));
                    }
                }
                result
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = previous_state;
                Err(SamplerError::Unknown(format!("failed to spawn acquisition thread: {}", e)))
            }
        }
    }

    /// Ask the producer to finish. Non-blocking; transitions sampling → stopping.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if !state.is_sampling() {
                return;
            }
            *state = SessionState::Stopping;
        }
        if let Some(ref d) = self.delegate {
            d.on_state_changed(&SessionState::Stopping);
        }
        // Raised after the notification so the producer's final state is
        // always reported last.
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Wait for the producer and return its outcome.
    ///
    /// Returns `Ok(None)` at once when no session was started since the last
    /// sync. Without a prior `stop` this blocks until the transport fails.
    pub fn sync(&mut self) -> Result<Option<SessionReport>, SamplerError> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };
        match handle.join() {
            Ok(result) => result.map(Some),
            Err(_) => {
                let e = SamplerError::Unknown("acquisition thread panicked".into());
                publish_state(&self.state, &self.delegate, SessionState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Wait for submitted playback segments to finish. Returns `true` if the
    /// queue emptied (or there is none) within `timeout`.
    pub fn drain_playback(&self, timeout: Duration) -> bool {
        match self.playback {
            Some(ref queue) => queue.drain(timeout),
            None => true,
        }
    }
}

impl<T: SerialTransport + 'static> Drop for SerialAudioSampler<T> {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Acquisition thread panicked during shutdown");
            }
        }
        if let Some(queue) = self.playback.take() {
            queue.close();
        }
        self.transport.lock().close();
    }
}

fn publish_state(state: &Mutex<SessionState>, delegate: &Option<Arc<dyn SamplerDelegate>>, new_state: SessionState) {
    *state.lock() = new_state.clone();
    if let Some(ref d) = delegate {
        d.on_state_changed(&new_state);
    }
}
