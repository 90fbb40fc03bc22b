//! waveOut playback device.
//!
//! Segments are written with `waveOutWrite` and complete asynchronously. The
//! device signals an event whenever a buffer finishes; a dedicated thread
//! waits on it, releases finished headers in submission order, and reports
//! each one through the `CompletionCallback`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, error, warn};
use parking_lot::Mutex;
use windows::core::{PCWSTR, PSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Media::Audio::*;
use windows::Win32::Media::MMSYSERR_NOERROR;
use windows::Win32::System::Threading::{CreateEventW, SetEvent, WaitForSingleObject};

use serial_audio_core::models::audio_models::{AudioDevice, StreamFormat};
use serial_audio_core::models::error::AudioOutputError;
use serial_audio_core::models::segment::Segment;
use serial_audio_core::traits::audio_output::{AudioOutput, CompletionCallback, SubmissionHandle};

use crate::device_enumerator;

/// How long the completion thread sleeps between checks without a signal.
const COMPLETION_POLL_MS: u32 = 50;

const WAVEHDR_SIZE: u32 = std::mem::size_of::<WAVEHDR>() as u32;

/// A header the driver still owns, plus the bytes it points into.
struct InFlight {
    header: Box<WAVEHDR>,
    _segment: Arc<Segment>,
}

// SAFETY: the header's raw pointers refer to `_segment`, which travels with it.
unsafe impl Send for InFlight {}

impl InFlight {
    fn is_done(&self) -> bool {
        // Written by the driver on its own thread.
        let flags = unsafe { std::ptr::read_volatile(&self.header.dwFlags) };
        flags & WHDR_DONE != 0
    }
}

#[derive(Clone, Copy)]
struct DeviceHandles {
    wave_out: HWAVEOUT,
    event: HANDLE,
}

// SAFETY: waveOut and event handles are process-wide and thread-agnostic.
unsafe impl Send for DeviceHandles {}
unsafe impl Sync for DeviceHandles {}

struct OpenDevice {
    handles: DeviceHandles,
    in_flight: Arc<Mutex<VecDeque<InFlight>>>,
    running: Arc<AtomicBool>,
    completion_thread: Option<thread::JoinHandle<()>>,
    next_handle: u64,
}

/// Audio output through the waveOut API.
pub struct WaveOutDevice {
    index: u32,
    name: String,
    open: Option<OpenDevice>,
}

impl WaveOutDevice {
    /// Output device `index` as listed by `list_output_devices`.
    pub fn new(index: u32) -> Result<Self, AudioOutputError> {
        let name = device_enumerator::device_name(index).ok_or(AudioOutputError::DeviceNotAvailable(index))?;
        Ok(Self { index, name, open: None })
    }
}

impl AudioOutput for WaveOutDevice {
    fn open(&mut self, format: &StreamFormat, on_complete: CompletionCallback) -> Result<(), AudioOutputError> {
        if self.open.is_some() {
            return Err(AudioOutputError::OpenFailed("device already open".into()));
        }

        let wave_format = WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_PCM as u16,
            nChannels: format.channels,
            nSamplesPerSec: format.sampling_rate,
            nAvgBytesPerSec: format.byte_rate(),
            nBlockAlign: format.block_align(),
            wBitsPerSample: format.bits_per_sample,
            cbSize: 0,
        };

        let event = unsafe { CreateEventW(None, false, false, PCWSTR::null()) }
            .map_err(|e| AudioOutputError::OpenFailed(format!("CreateEventW failed: {}", e)))?;

        let mut wave_out = HWAVEOUT::default();
        let result = unsafe {
            waveOutOpen(
                Some(&mut wave_out as *mut HWAVEOUT),
                self.index,
                &wave_format,
                event.0 as usize,
                0,
                CALLBACK_EVENT,
            )
        };
        if result != MMSYSERR_NOERROR {
            unsafe {
                let _ = CloseHandle(event);
            }
            return Err(AudioOutputError::OpenFailed(format!(
                "waveOutOpen on device {} returned {}",
                self.index, result
            )));
        }

        let handles = DeviceHandles { wave_out, event };
        let in_flight = Arc::new(Mutex::new(VecDeque::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread_in_flight = Arc::clone(&in_flight);
        let thread_running = Arc::clone(&running);
        let completion_thread = thread::Builder::new()
            .name("waveout-completion".into())
            .spawn(move || completion_loop(handles, thread_in_flight, thread_running, on_complete));

        let completion_thread = match completion_thread {
            Ok(handle) => handle,
            Err(e) => {
                unsafe {
                    waveOutClose(wave_out);
                    let _ = CloseHandle(event);
                }
                return Err(AudioOutputError::OpenFailed(format!("failed to spawn completion thread: {}", e)));
            }
        };

        debug!(
            "waveOut device {} opened at {} Hz, {} bit",
            self.index, format.sampling_rate, format.bits_per_sample
        );
        self.open = Some(OpenDevice {
            handles,
            in_flight,
            running,
            completion_thread: Some(completion_thread),
            next_handle: 0,
        });
        Ok(())
    }

    fn submit(&mut self, segment: Arc<Segment>) -> Result<SubmissionHandle, AudioOutputError> {
        let device = self.open.as_mut().ok_or(AudioOutputError::NotOpen)?;
        let length = u32::try_from(segment.byte_len())
            .map_err(|_| AudioOutputError::SubmitFailed("segment too large".into()))?;

        let mut header = Box::new(WAVEHDR {
            lpData: PSTR(segment.as_bytes().as_ptr() as *mut u8),
            dwBufferLength: length,
            ..Default::default()
        });

        // Held across prepare and write so the completion thread never sees
        // a header it cannot find.
        let mut in_flight = device.in_flight.lock();
        let wave_out = device.handles.wave_out;

        let result = unsafe { waveOutPrepareHeader(wave_out, header.as_mut(), WAVEHDR_SIZE) };
        if result != MMSYSERR_NOERROR {
            return Err(AudioOutputError::SubmitFailed(format!("waveOutPrepareHeader returned {}", result)));
        }
        let result = unsafe { waveOutWrite(wave_out, header.as_mut(), WAVEHDR_SIZE) };
        if result != MMSYSERR_NOERROR {
            unsafe {
                waveOutUnprepareHeader(wave_out, header.as_mut(), WAVEHDR_SIZE);
            }
            return Err(AudioOutputError::SubmitFailed(format!("waveOutWrite returned {}", result)));
        }

        in_flight.push_back(InFlight {
            header,
            _segment: segment,
        });

        let handle = SubmissionHandle::new(device.next_handle);
        device.next_handle += 1;
        Ok(handle)
    }

    fn close(&mut self) {
        let Some(mut device) = self.open.take() else {
            return;
        };
        let DeviceHandles { wave_out, event } = device.handles;

        // Reset marks every queued buffer done; the completion thread reports
        // them on its way out.
        unsafe {
            waveOutReset(wave_out);
        }
        device.running.store(false, Ordering::SeqCst);
        unsafe {
            let _ = SetEvent(event);
        }
        if let Some(handle) = device.completion_thread.take() {
            if handle.join().is_err() {
                error!("waveOut completion thread panicked");
            }
        }

        let leftover = std::mem::take(&mut *device.in_flight.lock());
        if !leftover.is_empty() {
            warn!("{} waveOut buffer(s) never completed", leftover.len());
        }
        for mut entry in leftover {
            unsafe {
                waveOutUnprepareHeader(wave_out, entry.header.as_mut(), WAVEHDR_SIZE);
            }
        }

        unsafe {
            let result = waveOutClose(wave_out);
            if result != MMSYSERR_NOERROR {
                warn!("waveOutClose returned {}", result);
            }
            let _ = CloseHandle(event);
        }
        debug!("waveOut device {} closed", self.index);
    }

    fn device_info(&self) -> AudioDevice {
        AudioDevice {
            index: self.index,
            name: self.name.clone(),
        }
    }
}

impl Drop for WaveOutDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn completion_loop(
    handles: DeviceHandles,
    in_flight: Arc<Mutex<VecDeque<InFlight>>>,
    running: Arc<AtomicBool>,
    on_complete: CompletionCallback,
) {
    loop {
        let keep_running = running.load(Ordering::SeqCst);
        unsafe {
            WaitForSingleObject(handles.event, COMPLETION_POLL_MS);
        }

        // Pop finished headers from the front only: the driver completes
        // buffers in the order they were written.
        let mut finished = Vec::new();
        {
            let mut queue = in_flight.lock();
            while queue.front().is_some_and(InFlight::is_done) {
                if let Some(entry) = queue.pop_front() {
                    finished.push(entry);
                }
            }
        }

        for mut entry in finished {
            unsafe {
                waveOutUnprepareHeader(handles.wave_out, entry.header.as_mut(), WAVEHDR_SIZE);
            }
            on_complete();
        }

        if !keep_running {
            break;
        }
    }
}
