//! In-memory transports, clocks and devices shared by the unit tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioDevice, StreamFormat};
use crate::models::error::{AudioOutputError, TransportError};
use crate::models::segment::Segment;
use crate::traits::audio_output::{AudioOutput, CompletionCallback, SubmissionHandle};
use crate::traits::clock::Clock;
use crate::traits::serial_transport::SerialTransport;

/// Unique path under the system temp directory.
pub fn temp_file_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("serial_audio_{}_{}", std::process::id(), name))
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// One scripted outcome of `FakeTransport::read_bytes`.
#[derive(Debug)]
pub enum Step {
    /// Bytes delivered across as many reads as needed.
    Bytes(Vec<u8>),
    /// A read that times out with nothing.
    Empty,
    Fail(TransportError),
    /// Move the attached clock forward; the read returns nothing.
    Advance(Duration),
}

/// Scripted serial device. Once the script runs out every read returns 0.
///
/// With a clock attached, each read moves it forward by `tick` before the
/// step is consumed, which paces the byte stream in virtual time.
pub struct FakeTransport {
    steps: VecDeque<Step>,
    clock: Option<Arc<ManualClock>>,
    tick: Duration,
    remaining: Arc<AtomicUsize>,
    written: Vec<u8>,
    closed: bool,
}

impl FakeTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        let remaining = Arc::new(AtomicUsize::new(steps.len()));
        Self {
            steps: steps.into(),
            clock: None,
            tick: Duration::ZERO,
            remaining,
            written: Vec::new(),
            closed: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<ManualClock>, tick: Duration) -> Self {
        self.clock = Some(clock);
        self.tick = tick;
        self
    }

    pub fn set_clock(&mut self, clock: Arc<ManualClock>) {
        self.clock = Some(clock);
    }

    /// Number of script steps not yet fully consumed, observable after the
    /// transport has moved into a sampler.
    pub fn remaining(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.remaining)
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    fn pop(&mut self) -> Option<Step> {
        let step = self.steps.pop_front();
        self.remaining.store(self.steps.len(), Ordering::SeqCst);
        step
    }
}

impl SerialTransport for FakeTransport {
    fn read_bytes(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(clock) = &self.clock {
            clock.advance(self.tick);
        }

        match self.pop() {
            None | Some(Step::Empty) => Ok(0),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Advance(by)) => {
                if let Some(clock) = &self.clock {
                    clock.advance(by);
                }
                Ok(0)
            }
            Some(Step::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.steps.push_front(Step::Bytes(bytes[n..].to_vec()));
                    self.remaining.store(self.steps.len(), Ordering::SeqCst);
                }
                Ok(n)
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        Ok(self
            .steps
            .iter()
            .map(|step| match step {
                Step::Bytes(bytes) => bytes.len(),
                _ => 0,
            })
            .sum())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn port_name(&self) -> &str {
        "FAKE0"
    }

    fn baud_rate(&self) -> u32 {
        115_200
    }
}

/// What a `RecordingOutput` has seen.
#[derive(Default)]
pub struct OutputLog {
    pub opened_with: Option<StreamFormat>,
    pub submitted: Vec<Arc<Segment>>,
    pub callback: Option<CompletionCallback>,
    pub closed: bool,
    /// Make the next submissions fail.
    pub fail_submit: bool,
    /// Report each segment finished before `submit` returns.
    pub complete_inline: bool,
}

/// Audio device that records submissions and completes only on request.
pub struct RecordingOutput {
    log: Arc<Mutex<OutputLog>>,
}

impl RecordingOutput {
    pub fn new() -> (Self, Arc<Mutex<OutputLog>>) {
        let log = Arc::new(Mutex::new(OutputLog::default()));
        (Self { log: Arc::clone(&log) }, log)
    }

    /// Report one finished segment the way a device thread would.
    pub fn complete_one(log: &Arc<Mutex<OutputLog>>) {
        let callback = log.lock().callback.clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl AudioOutput for RecordingOutput {
    fn open(&mut self, format: &StreamFormat, on_complete: CompletionCallback) -> Result<(), AudioOutputError> {
        let mut log = self.log.lock();
        log.opened_with = Some(*format);
        log.callback = Some(on_complete);
        Ok(())
    }

    fn submit(&mut self, segment: Arc<Segment>) -> Result<SubmissionHandle, AudioOutputError> {
        let mut log = self.log.lock();
        if log.fail_submit {
            return Err(AudioOutputError::SubmitFailed("device rejected buffer".into()));
        }
        let handle = SubmissionHandle::new(log.submitted.len() as u64);
        log.submitted.push(segment);

        let inline = log.complete_inline.then(|| log.callback.clone()).flatten();
        drop(log);
        if let Some(callback) = inline {
            callback();
        }
        Ok(handle)
    }

    fn close(&mut self) {
        self.log.lock().closed = true;
    }

    fn device_info(&self) -> AudioDevice {
        AudioDevice {
            index: 0,
            name: "Recording output".into(),
        }
    }
}
