//! waveOut output device enumeration.

use windows::Win32::Media::Audio::{waveOutGetDevCapsW, waveOutGetNumDevs, WAVEOUTCAPSW};
use windows::Win32::Media::MMSYSERR_NOERROR;

use serial_audio_core::models::audio_models::AudioDevice;

/// List the output devices waveOut can open, by index.
pub fn list_output_devices() -> Vec<AudioDevice> {
    let count = unsafe { waveOutGetNumDevs() };
    (0..count)
        .filter_map(|index| device_name(index).map(|name| AudioDevice { index, name }))
        .collect()
}

/// Product name of output device `index`, or `None` if it does not exist.
pub fn device_name(index: u32) -> Option<String> {
    let mut caps = WAVEOUTCAPSW::default();
    let result = unsafe {
        waveOutGetDevCapsW(
            index as usize,
            &mut caps,
            std::mem::size_of::<WAVEOUTCAPSW>() as u32,
        )
    };
    if result != MMSYSERR_NOERROR {
        return None;
    }
    Some(wide_to_string(&caps.szPname))
}

fn wide_to_string(wide: &[u16]) -> String {
    let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
}
