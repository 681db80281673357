//! RIFF/WAVE container writing and parsing
//!
//! `wrap_wav` emits the canonical 44-byte header used for every audio-only
//! download. `parse_wav` is strict: a container with missing magic, missing
//! chunks or a data chunk that runs past the buffer is rejected instead of
//! being decoded from whatever bytes happen to be there.

use crate::audio::format::decode_pcm16;
use crate::error::{Error, Result};

/// Size of the canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

/// AudioFormat tag for integer PCM
pub const WAV_FORMAT_PCM: u16 = 1;

/// WAV `fmt ` chunk contents plus data chunk size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Audio format (1 = PCM)
    pub audio_format: u16,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bytes per second
    pub byte_rate: u32,
    /// Bytes per frame across all channels
    pub block_align: u16,
    /// Bits per sample (8, 16, 24, 32)
    pub bits_per_sample: u16,
    /// Size of audio data in bytes
    pub data_size: u32,
}

impl WavHeader {
    /// Header fields for raw PCM of `data_size` bytes.
    ///
    /// Fails with `Codec` when a derived field does not fit its 16/32-bit slot.
    pub fn for_pcm(
        data_size: usize,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Result<Self> {
        let bytes_per_sample = bits_per_sample / 8;
        let data_size = u32::try_from(data_size)
            .ok()
            .filter(|size| size.checked_add(36).is_some())
            .ok_or_else(|| {
                Error::Codec(format!("{} bytes of PCM exceed the WAV size limit", data_size))
            })?;
        let byte_rate = sample_rate
            .checked_mul(channels as u32)
            .and_then(|rate| rate.checked_mul(bytes_per_sample as u32))
            .ok_or_else(|| {
                Error::Codec(format!(
                    "byte rate overflows: {} Hz x {} channels x {} bits",
                    sample_rate, channels, bits_per_sample
                ))
            })?;
        let block_align = channels.checked_mul(bytes_per_sample).ok_or_else(|| {
            Error::Codec(format!(
                "block align overflows: {} channels x {} bits",
                channels, bits_per_sample
            ))
        })?;

        Ok(Self {
            audio_format: WAV_FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            data_size,
        })
    }

    /// Serialize to the canonical 44-byte layout
    pub fn to_bytes(&self) -> [u8; WAV_HEADER_LEN] {
        let mut header = [0u8; WAV_HEADER_LEN];

        // RIFF chunk descriptor
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.data_size.wrapping_add(36).to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        // "fmt " sub-chunk
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());

        // "data" sub-chunk
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_size.to_le_bytes());

        header
    }
}

/// Wrap raw PCM bytes in a canonical RIFF/WAVE container.
///
/// # Example
/// ```
/// use dubsync_core::audio::wav::wrap_wav;
///
/// let wav = wrap_wav(&[0, 0, 255, 127], 24000, 1, 16)?;
///
/// assert_eq!(wav.len(), 48);
/// assert_eq!(&wav[0..4], b"RIFF");
/// assert_eq!(&wav[44..], &[0, 0, 255, 127]);
/// # Ok::<(), dubsync_core::Error>(())
/// ```
pub fn wrap_wav(
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> Result<Vec<u8>> {
    let header = WavHeader::for_pcm(pcm.len(), sample_rate, channels, bits_per_sample)?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Check if data starts with a RIFF/WAVE signature
pub fn is_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Parse a WAV container, returning its header and the PCM payload.
///
/// Unknown chunks are skipped (with RIFF word padding). The data chunk must
/// fit inside `data`.
pub fn parse_wav(data: &[u8]) -> Result<(WavHeader, &[u8])> {
    if !is_wav(data) {
        return Err(Error::Codec(
            "Not a valid WAV file: missing RIFF/WAVE signature".to_string(),
        ));
    }

    let mut fmt: Option<WavHeader> = None;
    let mut pos = 12;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32(data, pos + 4) as usize;
        let body = pos + 8;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || body + chunk_size > data.len() {
                    return Err(Error::Codec(format!(
                        "Truncated fmt chunk ({} bytes declared)",
                        chunk_size
                    )));
                }
                fmt = Some(WavHeader {
                    audio_format: read_u16(data, body),
                    channels: read_u16(data, body + 2),
                    sample_rate: read_u32(data, body + 4),
                    byte_rate: read_u32(data, body + 8),
                    block_align: read_u16(data, body + 12),
                    bits_per_sample: read_u16(data, body + 14),
                    data_size: 0,
                });
            }
            b"data" => {
                let mut header = fmt.ok_or_else(|| {
                    Error::Codec("WAV data chunk precedes fmt chunk".to_string())
                })?;
                let available = data.len() - body;
                if chunk_size > available {
                    return Err(Error::Codec(format!(
                        "Truncated WAV data: {} bytes declared, {} available",
                        chunk_size, available
                    )));
                }
                header.data_size = chunk_size as u32;
                tracing::debug!(
                    "WAV header: format={}, channels={}, rate={}, bits={}, data_size={}",
                    header.audio_format,
                    header.channels,
                    header.sample_rate,
                    header.bits_per_sample,
                    header.data_size
                );
                return Ok((header, &data[body..body + chunk_size]));
            }
            _ => {}
        }

        // Chunks are word aligned
        pos = body + chunk_size + (chunk_size & 1);
    }

    if fmt.is_none() {
        Err(Error::Codec("WAV file missing fmt chunk".to_string()))
    } else {
        Err(Error::Codec("WAV file missing data chunk".to_string()))
    }
}

/// Parse a mono 16-bit PCM WAV into normalized samples and its sample rate.
pub fn decode_wav_pcm16(data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let (header, pcm) = parse_wav(data)?;

    if header.audio_format != WAV_FORMAT_PCM || header.bits_per_sample != 16 {
        return Err(Error::Codec(format!(
            "Unsupported WAV format: audio_format={}, bits_per_sample={}",
            header.audio_format, header.bits_per_sample
        )));
    }
    if header.channels != 1 {
        return Err(Error::Codec(format!(
            "Expected mono WAV, found {} channels",
            header.channels
        )));
    }

    Ok((decode_pcm16(pcm)?, header.sample_rate))
}
