use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::models::audio_models::{AudioDevice, QueueStats, StreamFormat};
use crate::models::error::AudioOutputError;
use crate::models::segment::Segment;
use crate::traits::audio_output::{AudioOutput, CompletionCallback, SubmissionHandle};

/// A segment owned by the queue from submission until its completion.
#[derive(Debug, Clone)]
pub struct QueueUnit {
    pub id: u64,
    pub segment: Arc<Segment>,
    /// Device token; `None` until the device has accepted the segment.
    pub handle: Option<SubmissionHandle>,
}

#[derive(Debug, Default)]
struct QueueInner {
    units: VecDeque<QueueUnit>,
    stats: QueueStats,
    next_id: u64,
}

impl QueueInner {
    fn complete(&mut self) -> Option<QueueUnit> {
        let Some(unit) = self.units.pop_front() else {
            warn!("Completion notification with no outstanding segment");
            return None;
        };
        self.stats.completed += 1;
        self.stats.depth = self.units.len();
        self.stats.bytes_in_flight -= unit.segment.byte_len();
        Some(unit)
    }
}

/// FIFO bridge between the producer and an asynchronous audio device.
///
/// `submit` is called by the acquisition thread; completions come from the
/// device's own thread through the `CompletionCallback` installed at open
/// time, or from anyone calling `on_device_completion`. Devices complete
/// segments in submission order, so each completion releases the head unit.
///
/// The queue is unbounded: if the device stalls, segments accumulate.
/// Watch `stats().depth` to detect that.
pub struct PlaybackQueue {
    inner: Arc<Mutex<QueueInner>>,
    output: Mutex<Option<Box<dyn AudioOutput>>>,
    format: StreamFormat,
    device: AudioDevice,
}

impl PlaybackQueue {
    /// Open `output` for `format` and wire its completions to this queue.
    pub fn open(mut output: Box<dyn AudioOutput>, format: StreamFormat) -> Result<Self, AudioOutputError> {
        let inner = Arc::new(Mutex::new(QueueInner::default()));

        let completions = Arc::clone(&inner);
        let on_complete: CompletionCallback = Arc::new(move || {
            completions.lock().complete();
        });
        output.open(&format, on_complete)?;

        let device = output.device_info();
        debug!("Playback queue opened on '{}' at {} Hz", device.name, format.sampling_rate);

        Ok(Self {
            inner,
            output: Mutex::new(Some(output)),
            format,
            device,
        })
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn device(&self) -> &AudioDevice {
        &self.device
    }

    /// Append `segment` to the tail and hand it to the device.
    ///
    /// Returns the queue depth after the submission. On failure the unit is
    /// removed again and the queue is left as it was.
    pub fn submit(&self, segment: Segment) -> Result<usize, AudioOutputError> {
        let mut output = self.output.lock();
        let output = output.as_mut().ok_or(AudioOutputError::NotOpen)?;

        let segment = Arc::new(segment);
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.units.push_back(QueueUnit {
                id,
                segment: Arc::clone(&segment),
                handle: None,
            });
            inner.stats.bytes_in_flight += segment.byte_len();
            inner.stats.depth = inner.units.len();
            inner.stats.peak_depth = inner.stats.peak_depth.max(inner.stats.depth);
            id
        };

        // The inner lock is released here: a device may report the
        // completion before `submit` returns.
        let result = output.submit(segment);

        let mut inner = self.inner.lock();
        match result {
            Ok(handle) => {
                if let Some(unit) = inner.units.iter_mut().find(|unit| unit.id == id) {
                    unit.handle = Some(handle);
                }
                inner.stats.submitted += 1;
                Ok(inner.units.len())
            }
            Err(e) => {
                if let Some(pos) = inner.units.iter().position(|unit| unit.id == id) {
                    if let Some(unit) = inner.units.remove(pos) {
                        inner.stats.bytes_in_flight -= unit.segment.byte_len();
                    }
                }
                inner.stats.depth = inner.units.len();
                Err(e)
            }
        }
    }

    /// Release the oldest outstanding unit. Safe to call from any thread.
    pub fn on_device_completion(&self) -> Option<QueueUnit> {
        self.inner.lock().complete()
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().units.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }

    /// Wait until every submitted segment has completed or `timeout` elapses.
    ///
    /// Returns `true` if the queue drained.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.depth() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Close the device. Outstanding units are discarded.
    pub fn close(&self) {
        // Take the device out before closing it; its completion thread may
        // still need the inner lock while shutting down.
        let output = self.output.lock().take();
        if let Some(mut output) = output {
            output.close();
            let mut inner = self.inner.lock();
            let dropped = inner.units.len();
            inner.units.clear();
            inner.stats.depth = 0;
            inner.stats.bytes_in_flight = 0;
            if dropped > 0 {
                debug!("Playback closed with {} segment(s) still queued", dropped);
            }
        }
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        self.close();
    }
}
