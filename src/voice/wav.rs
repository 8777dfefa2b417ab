//! WAV helpers: header inspection and data URL packaging

use std::io::Cursor;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::{Error, Result};

/// Media type prefix for inline WAV payloads
pub const WAV_DATA_URL_PREFIX: &str = "data:audio/wav;base64,";

/// Basic facts read from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub duration: Duration,
}

/// Read the header of an in-memory WAV file
///
/// # Errors
///
/// Returns error if the bytes are not a RIFF/WAVE stream hound understands
pub fn describe_wav(bytes: &[u8]) -> Result<WavSummary> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let frames = u64::from(reader.duration());
    let duration = if spec.sample_rate == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(frames * 1000 / u64::from(spec.sample_rate))
    };

    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        duration,
    })
}

/// Wrap WAV bytes as a `data:audio/wav;base64,...` URL
#[must_use]
pub fn wav_data_url(bytes: &[u8]) -> String {
    let mut url = String::with_capacity(WAV_DATA_URL_PREFIX.len() + bytes.len().div_ceil(3) * 4);
    url.push_str(WAV_DATA_URL_PREFIX);
    STANDARD.encode_string(bytes, &mut url);
    url
}

/// Decode the payload of a WAV data URL
///
/// # Errors
///
/// Returns error if the prefix is wrong or the payload is not base64
pub fn decode_wav_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(WAV_DATA_URL_PREFIX)
        .ok_or_else(|| Error::Audio("not a WAV data URL".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| Error::Audio(format!("invalid base64 payload: {e}")))
}

/// Encode mono f32 samples as 16-bit PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
