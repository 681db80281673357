//! Clip loading for the `stitch` command

use std::path::Path;

use anyhow::{Context, Result};
use dubsync_core::audio::decode_wav_pcm16;
use dubsync_core::Clip;

/// Load one clip per segment index, in order.
///
/// `{index}.wav` (mono 16-bit) wins over `{index}.pcm` (raw LE i16). A
/// missing or unreadable clip becomes an empty clip so the slot stitches as
/// silence.
pub fn load_clips(
    dir: &Path,
    indices: impl IntoIterator<Item = usize>,
    sample_rate: u32,
) -> Vec<Clip> {
    indices
        .into_iter()
        .map(|index| match load_clip(dir, index, sample_rate) {
            Ok(Some(clip)) => {
                tracing::debug!("Loaded clip {}: {:?}", index, clip);
                clip
            }
            Ok(None) => {
                tracing::warn!("No clip for segment {} in {}", index, dir.display());
                Clip::empty()
            }
            Err(e) => {
                tracing::warn!("Skipping clip for segment {}: {:#}", index, e);
                Clip::empty()
            }
        })
        .collect()
}

fn load_clip(dir: &Path, index: usize, sample_rate: u32) -> Result<Option<Clip>> {
    let wav_path = dir.join(format!("{}.wav", index));
    if wav_path.exists() {
        let bytes = std::fs::read(&wav_path)
            .with_context(|| format!("Failed to read {}", wav_path.display()))?;
        let (samples, rate) = decode_wav_pcm16(&bytes)
            .with_context(|| format!("Invalid WAV {}", wav_path.display()))?;
        anyhow::ensure!(
            rate == sample_rate,
            "{} is {} Hz, expected {} Hz",
            wav_path.display(),
            rate,
            sample_rate
        );
        return Ok(Some(Clip::new(samples)));
    }

    let pcm_path = dir.join(format!("{}.pcm", index));
    if pcm_path.exists() {
        let bytes = std::fs::read(&pcm_path)
            .with_context(|| format!("Failed to read {}", pcm_path.display()))?;
        let clip = Clip::from_pcm16(&bytes)
            .with_context(|| format!("Invalid PCM {}", pcm_path.display()))?;
        return Ok(Some(clip));
    }

    Ok(None)
}
