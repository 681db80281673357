//! PCM sample conversion
//!
//! Bit-exact conversions between little-endian signed 16-bit PCM bytes and
//! normalized `f32` samples:
//! - Decode: `sample / 32768.0`
//! - Encode: clamp to [-1, 1], scale by 0x7FFF (non-negative) or 0x8000
//!   (negative), truncate toward zero
//!
//! The asymmetric encode scale is what speech services and browsers produce;
//! matching it byte-for-byte keeps exported files interchangeable.

use crate::error::{Error, Result};

/// Bytes per 16-bit sample
pub const PCM16_SAMPLE_BYTES: usize = 2;

/// Size of one quantization step for 16-bit PCM in normalized units
pub const PCM16_STEP: f32 = 1.0 / 32768.0;

/// Convert i16 samples to f32 (range: -32768..32767 → -1.0..1.0)
///
/// # Example
/// ```
/// use dubsync_core::audio::format::i16_to_f32;
///
/// let f32_samples = i16_to_f32(&[0, 16384, -32768]);
///
/// assert_eq!(f32_samples[0], 0.0);
/// assert_eq!(f32_samples[1], 0.5);
/// assert_eq!(f32_samples[2], -1.0);
/// ```
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Convert one f32 sample to i16 using the asymmetric 0x7FFF / 0x8000 scale.
///
/// The product is computed in f64 and truncated toward zero so the result
/// matches double-precision encoders exactly.
#[inline]
pub fn f32_to_i16_sample(sample: f32) -> i16 {
    let clamped = (sample as f64).clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Convert f32 samples to i16 (range: -1.0..1.0 → -32768..32767)
///
/// Values outside the range are clamped. NaN encodes as silence.
///
/// # Example
/// ```
/// use dubsync_core::audio::format::f32_to_i16;
///
/// let i16_samples = f32_to_i16(&[0.0, 1.0, -1.0, 2.0]);
///
/// assert_eq!(i16_samples, vec![0, 32767, -32768, 32767]);
/// ```
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| f32_to_i16_sample(s)).collect()
}

/// Decode little-endian signed 16-bit PCM into normalized samples.
///
/// An odd byte count means the buffer was truncated mid-sample; the whole
/// decode fails rather than returning a partial result.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % PCM16_SAMPLE_BYTES != 0 {
        return Err(Error::Codec(format!(
            "PCM16 payload has odd length {} (truncated sample)",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(PCM16_SAMPLE_BYTES)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect())
}

/// Encode normalized samples as little-endian signed 16-bit PCM.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * PCM16_SAMPLE_BYTES);
    for &sample in samples {
        out.extend_from_slice(&f32_to_i16_sample(sample).to_le_bytes());
    }
    out
}
