use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use parking_lot::Mutex;

use crate::models::audio_models::{SamplerDiagnostics, SinkKind, StreamFormat};
use crate::models::error::SamplerError;
use crate::models::recording_result::{RecordingResult, SessionReport};
use crate::models::segment::{Sample, Segment, SAMPLE_SIZE};
use crate::processing::playback_queue::PlaybackQueue;
use crate::processing::sample_reader::SampleReader;
use crate::processing::sample_scaler::SampleScaler;
use crate::storage::wav_writer;
use crate::traits::clock::Clock;
use crate::traits::sampler_delegate::SamplerDelegate;
use crate::traits::serial_transport::SerialTransport;

/// Counters updated by the producer and read by the controller.
#[derive(Debug, Default)]
pub(crate) struct LiveCounters {
    samples_read: AtomicU64,
    empty_polls: AtomicU64,
    segments_submitted: AtomicU64,
    bytes_produced: AtomicU64,
}

impl LiveCounters {
    pub(crate) fn reset(&self) {
        self.samples_read.store(0, Ordering::Relaxed);
        self.empty_polls.store(0, Ordering::Relaxed);
        self.segments_submitted.store(0, Ordering::Relaxed);
        self.bytes_produced.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SamplerDiagnostics {
        SamplerDiagnostics {
            samples_read: self.samples_read.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            segments_submitted: self.segments_submitted.load(Ordering::Relaxed),
            bytes_produced: self.bytes_produced.load(Ordering::Relaxed),
        }
    }

    fn record_sample(&self) {
        self.samples_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_produced.fetch_add(SAMPLE_SIZE as u64, Ordering::Relaxed);
    }
}

/// Accumulates the whole session and writes one WAV file on stop.
pub(crate) struct FileSink {
    path: PathBuf,
    format: StreamFormat,
    payload: Segment,
    write_metadata: bool,
}

impl FileSink {
    pub(crate) fn new(path: PathBuf, format: StreamFormat, write_metadata: bool) -> Self {
        Self {
            path,
            format,
            payload: Segment::new(),
            write_metadata,
        }
    }

    fn accept(&mut self, sample: Sample) {
        self.payload.push_sample(sample);
    }

    fn finish(self) -> Result<RecordingResult, SamplerError> {
        wav_writer::finalize_recording(&self.path, &self.format, &self.payload, self.write_metadata)
    }
}

/// Upper bound on the samples reserved up front for one playback segment.
/// Longer segments grow as samples arrive.
const MAX_PREALLOCATED_SAMPLES: usize = 1 << 16;

/// Cuts the stream into fixed-duration segments for the playback queue.
pub(crate) struct PlaybackSink {
    queue: Arc<PlaybackQueue>,
    current: Segment,
    buffer: Duration,
    segment_capacity: usize,
    last_handoff: Duration,
    clock: Arc<dyn Clock>,
    delegate: Option<Arc<dyn SamplerDelegate>>,
    submitted: u64,
}

impl PlaybackSink {
    pub(crate) fn new(
        queue: Arc<PlaybackQueue>,
        buffer: Duration,
        clock: Arc<dyn Clock>,
        delegate: Option<Arc<dyn SamplerDelegate>>,
    ) -> Self {
        let rate = queue.format().sampling_rate as f64;
        let segment_capacity = ((rate * buffer.as_secs_f64()).ceil() as usize).min(MAX_PREALLOCATED_SAMPLES);
        let last_handoff = clock.now();
        Self {
            queue,
            current: Segment::with_sample_capacity(segment_capacity),
            buffer,
            segment_capacity,
            last_handoff,
            clock,
            delegate,
            submitted: 0,
        }
    }

    fn accept(&mut self, sample: Sample, counters: &LiveCounters) -> Result<(), SamplerError> {
        self.current.push_sample(sample);

        let now = self.clock.now();
        if now.saturating_sub(self.last_handoff) < self.buffer {
            return Ok(());
        }
        self.last_handoff = now;

        let segment = mem::replace(&mut self.current, Segment::with_sample_capacity(self.segment_capacity));
        let sample_count = segment.sample_count();
        let depth = self.queue.submit(segment)?;
        self.submitted += 1;
        counters.segments_submitted.fetch_add(1, Ordering::Relaxed);
        debug!("Submitted segment of {} samples, queue depth {}", sample_count, depth);

        if let Some(ref delegate) = self.delegate {
            delegate.on_segment_submitted(sample_count, depth);
        }
        Ok(())
    }

    fn finish(self) {
        if !self.current.is_empty() {
            debug!("Discarding partial segment of {} samples", self.current.sample_count());
        }
    }
}

pub(crate) enum ActiveSink {
    File(FileSink),
    Playback(PlaybackSink),
}

impl ActiveSink {
    pub(crate) fn kind(&self) -> SinkKind {
        match self {
            Self::File(_) => SinkKind::File,
            Self::Playback(_) => SinkKind::Playback,
        }
    }
}

/// Everything the producer thread owns for one session.
pub(crate) struct Acquisition<T: SerialTransport> {
    pub(crate) transport: Arc<Mutex<T>>,
    pub(crate) format: StreamFormat,
    pub(crate) scaler: SampleScaler,
    pub(crate) read_timeout: Duration,
    pub(crate) sink: ActiveSink,
    pub(crate) stop_flag: Arc<AtomicBool>,
    pub(crate) counters: Arc<LiveCounters>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<T: SerialTransport> Acquisition<T> {
    /// Producer loop. Returns once the stop flag is observed or the
    /// transport fails.
    ///
    /// A file sink is only written after a clean stop; on a transport error
    /// nothing reaches the disk.
    pub(crate) fn run(self) -> Result<SessionReport, SamplerError> {
        let Acquisition {
            transport,
            format,
            scaler,
            read_timeout,
            mut sink,
            stop_flag,
            counters,
            clock,
        } = self;

        let started = clock.now();
        let kind = sink.kind();
        let mut reader = SampleReader::new();
        let mut samples_captured = 0u64;

        {
            let mut transport = transport.lock();
            info!(
                "Acquisition started on {} at {} Hz ({:?} sink)",
                transport.port_name(),
                format.sampling_rate,
                kind
            );

            while !stop_flag.load(Ordering::SeqCst) {
                let sample = match reader.poll(&mut *transport, read_timeout) {
                    Ok(Some(sample)) => sample,
                    Ok(None) => {
                        counters.empty_polls.fetch_add(1, Ordering::Relaxed);
                        if read_timeout.is_zero() {
                            std::hint::spin_loop();
                        }
                        continue;
                    }
                    Err(e) => {
                        error!("Serial read failed, aborting session: {}", e);
                        return Err(e.into());
                    }
                };

                counters.record_sample();
                samples_captured += 1;
                let sample = scaler.scale(sample);

                match sink {
                    ActiveSink::File(ref mut file) => file.accept(sample),
                    ActiveSink::Playback(ref mut playback) => {
                        if let Err(e) = playback.accept(sample, &counters) {
                            error!("Playback submission failed, aborting session: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }

        if reader.has_partial() {
            debug!("Dropping half a sample left in the reader");
        }

        let (recording, segments_submitted) = match sink {
            ActiveSink::File(file) => (Some(file.finish()?), 0),
            ActiveSink::Playback(playback) => {
                let submitted = playback.submitted;
                playback.finish();
                (None, submitted)
            }
        };

        let report = SessionReport {
            sink: kind,
            format,
            samples_captured,
            segments_submitted,
            wall_time: clock.now().saturating_sub(started),
            recording,
        };
        info!(
            "Acquisition finished: {} samples ({:.2}s of audio)",
            report.samples_captured,
            report.audio_duration_secs()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ManualClock, RecordingOutput};

    fn sink_for(rate: u32, buffer: Duration) -> PlaybackSink {
        let (output, _log) = RecordingOutput::new();
        let queue = Arc::new(PlaybackQueue::open(Box::new(output), StreamFormat::mono16(rate)).unwrap());
        PlaybackSink::new(queue, buffer, Arc::new(ManualClock::new()), None)
    }

    #[test]
    fn segment_reservation_matches_buffer() {
        let sink = sink_for(8000, Duration::from_millis(125));
        assert_eq!(sink.segment_capacity, 1000);
    }

    #[test]
    fn huge_buffer_reservation_is_capped() {
        let sink = sink_for(44_100, Duration::from_millis(u64::from(u32::MAX)));
        assert_eq!(sink.segment_capacity, MAX_PREALLOCATED_SAMPLES);
    }

    #[test]
    fn segments_grow_past_reservation() {
        let mut sink = sink_for(44_100, Duration::from_secs(60));
        let counters = LiveCounters::default();
        for i in 0..(MAX_PREALLOCATED_SAMPLES + 10) {
            sink.accept(i as Sample, &counters).unwrap();
        }
        assert_eq!(sink.current.sample_count(), MAX_PREALLOCATED_SAMPLES + 10);
        assert_eq!(sink.submitted, 0);
    }
}
