//! Audio data structures and codecs
//!
//! This module provides:
//! - Bit-exact PCM16 ↔ f32 conversion (`format`)
//! - RIFF/WAVE container writing and strict parsing (`wav`)
//! - Clip and master-track buffers with zero-copy sharing (`buffer`)

pub mod buffer;
pub mod format;
pub mod wav;

pub use buffer::{Clip, MasterTrack, DEFAULT_SAMPLE_RATE};
pub use format::{decode_pcm16, encode_pcm16};
pub use wav::{decode_wav_pcm16, parse_wav, wrap_wav, WavHeader};
