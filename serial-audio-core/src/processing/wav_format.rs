//! WAV container encoding and decoding.
//!
//! Produces the canonical 44-byte RIFF/WAVE PCM header followed by the raw
//! sample payload. All fields are a pure function of the stream format and
//! the payload length.

use crate::models::audio_models::StreamFormat;
use crate::models::error::SamplerError;

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// PCM format tag.
pub const WAVE_FORMAT_PCM: u16 = 1;

/// Size of the `fmt ` sub-chunk body for PCM.
const FMT_CHUNK_SIZE: u32 = 16;

/// Generate a 44-byte WAV RIFF header.
///
/// Layout (little-endian):
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bits / 8
/// [32-33]  block_align = channels * bits / 8
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &StreamFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let chunk_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    header[20..22].copy_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sampling_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Encode a complete WAV file: header + payload.
///
/// Fails if the payload cannot be described by the 32-bit size fields.
pub fn encode_wav(format: &StreamFormat, payload: &[u8]) -> Result<Vec<u8>, SamplerError> {
    let data_size = u32::try_from(payload.len())
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(|| SamplerError::EncodingFailed(format!("payload too large for WAV: {} bytes", payload.len())))?;

    let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + payload.len());
    wav.extend_from_slice(&generate_wav_header(format, data_size));
    wav.extend_from_slice(payload);
    Ok(wav)
}

/// Parse a canonical PCM WAV file produced by `encode_wav`.
///
/// Returns the stream format and the payload slice.
pub fn decode_wav(bytes: &[u8]) -> Result<(StreamFormat, &[u8]), SamplerError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(decode_error(format!("file shorter than header: {} bytes", bytes.len())));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(decode_error("missing RIFF/WAVE magic".into()));
    }
    if &bytes[12..16] != b"fmt " || read_u32(bytes, 16) != FMT_CHUNK_SIZE {
        return Err(decode_error("unexpected fmt chunk".into()));
    }
    if read_u16(bytes, 20) != WAVE_FORMAT_PCM {
        return Err(decode_error(format!("not PCM: format tag {}", read_u16(bytes, 20))));
    }
    if &bytes[36..40] != b"data" {
        return Err(decode_error("missing data chunk".into()));
    }

    let format = StreamFormat {
        channels: read_u16(bytes, 22),
        sampling_rate: read_u32(bytes, 24),
        bits_per_sample: read_u16(bytes, 34),
    };
    if read_u32(bytes, 28) != format.byte_rate() || read_u16(bytes, 32) != format.block_align() {
        return Err(decode_error("byte rate or block align inconsistent with format".into()));
    }

    let data_size = read_u32(bytes, 40) as usize;
    let payload = &bytes[WAV_HEADER_SIZE..];
    if payload.len() != data_size {
        return Err(decode_error(format!(
            "data size {} does not match payload length {}",
            data_size,
            payload.len()
        )));
    }
    if read_u32(bytes, 4) as usize != 36 + data_size {
        return Err(decode_error("RIFF chunk size does not match payload".into()));
    }

    Ok((format, payload))
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn decode_error(message: String) -> SamplerError {
    SamplerError::EncodingFailed(format!("invalid WAV: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::segment::Segment;

    #[test]
    fn header_size_is_44_bytes() {
        let header = generate_wav_header(&StreamFormat::mono16(8000), 0);
        assert_eq!(header.len(), 44);
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(&StreamFormat::mono16(8000), 0);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_pcm_format() {
        let header = generate_wav_header(&StreamFormat::mono16(8000), 0);
        // Format code = 1 (PCM)
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        // fmt chunk size = 16
        assert_eq!(u32::from_le_bytes([header[16], header[17], header[18], header[19]]), 16);
    }

    #[test]
    fn header_8khz_mono_16bit() {
        let header = generate_wav_header(&StreamFormat::mono16(8000), 9600);

        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 1);
        assert_eq!(u32::from_le_bytes([header[24], header[25], header[26], header[27]]), 8000);
        assert_eq!(u32::from_le_bytes([header[28], header[29], header[30], header[31]]), 16000);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 2);
        assert_eq!(u16::from_le_bytes([header[34], header[35]]), 16);
        assert_eq!(u32::from_le_bytes([header[40], header[41], header[42], header[43]]), 9600);
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 36 + 9600);
    }

    #[test]
    fn sizes_track_sample_count() {
        let mut segment = Segment::new();
        segment.extend_samples(&[1, -1, 300, -300, 0, 7, 8]);
        let n = segment.sample_count() as u32;

        let wav = encode_wav(&StreamFormat::mono16(22050), segment.as_bytes()).unwrap();
        assert_eq!(wav.len(), 44 + 2 * n as usize);
        assert_eq!(read_u32(&wav, 4), 36 + 2 * n);
        assert_eq!(read_u32(&wav, 40), 2 * n);
        assert_eq!(&wav[44..], segment.as_bytes());
    }

    #[test]
    fn reencoding_decoded_file_is_identical() {
        let format = StreamFormat::mono16(8000);
        let payload: Vec<u8> = (0..200u16).flat_map(|v| v.to_le_bytes()).collect();

        let encoded = encode_wav(&format, &payload).unwrap();
        let (decoded_format, decoded_payload) = decode_wav(&encoded).unwrap();
        assert_eq!(decoded_format, format);
        assert_eq!(encode_wav(&decoded_format, decoded_payload).unwrap(), encoded);
    }

    #[test]
    fn empty_payload_round_trips() {
        let encoded = encode_wav(&StreamFormat::mono16(44100), &[]).unwrap();
        assert_eq!(encoded.len(), WAV_HEADER_SIZE);
        let (_, payload) = decode_wav(&encoded).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let mut encoded = encode_wav(&StreamFormat::mono16(8000), &[1, 2, 3, 4]).unwrap();
        encoded.pop();
        assert!(matches!(decode_wav(&encoded), Err(SamplerError::EncodingFailed(_))));
    }

    #[test]
    fn decode_rejects_non_pcm() {
        let mut encoded = encode_wav(&StreamFormat::mono16(8000), &[]).unwrap();
        encoded[20] = 3; // IEEE float
        assert!(decode_wav(&encoded).is_err());
        assert!(decode_wav(b"RIFF").is_err());
    }
}
