//! WAV interoperability with an independent reader/writer (hound)

use std::io::Cursor;

use dubsync_core::audio::format::{f32_to_i16, PCM16_STEP};
use dubsync_core::audio::{decode_wav_pcm16, encode_pcm16, parse_wav, wrap_wav, MasterTrack};
use dubsync_core::timeline::{Segment, Stitcher};
use dubsync_core::Clip;

fn sine(len: usize, freq: f32, rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| 0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
        .collect()
}

#[test]
fn test_hound_reads_wrapped_pcm() {
    let samples = sine(2_400, 440.0, 24_000);
    let wav = wrap_wav(&encode_pcm16(&samples), 24_000, 1, 16).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read, f32_to_i16(&samples));
}

#[test]
fn test_hound_reads_stitched_track() {
    let segments = vec![
        Segment::new("Speaker 1", "a", 0.0, 0.1),
        Segment::new("Speaker 2", "b", 0.2, 0.3),
    ];
    let clips = vec![
        Clip::new(sine(2_400, 300.0, 24_000)),
        Clip::new(sine(2_400, 600.0, 24_000)),
    ];
    let track = Stitcher::new(24_000).stitch(&segments, &clips).unwrap();

    let reader = hound::WavReader::new(Cursor::new(track.to_wav().unwrap())).unwrap();
    assert_eq!(reader.duration() as usize, track.len());
    assert_eq!(reader.len() as usize, ((0.3 + 0.5) * 24_000.0_f64).ceil() as usize);
}

#[test]
fn test_decode_hound_written_file() {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let source: Vec<i16> = vec![0, 1, -1, 16_384, -16_384, i16::MAX, i16::MIN];

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in &source {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    let bytes = cursor.into_inner();

    let (header, data) = parse_wav(&bytes).unwrap();
    assert_eq!(header.sample_rate, 24_000);
    assert_eq!(header.channels, 1);
    assert_eq!(data.len(), source.len() * 2);

    let (samples, rate) = decode_wav_pcm16(&bytes).unwrap();
    assert_eq!(rate, 24_000);
    assert_eq!(samples.len(), source.len());
    for (decoded, original) in samples.iter().zip(&source) {
        assert!((decoded - *original as f32 / 32768.0).abs() <= PCM16_STEP);
    }

    let track = MasterTrack::new(samples, rate);
    assert_eq!(track.len(), source.len());
    assert_eq!(f32_to_i16(&track.samples()[..4]), vec![0, 0, -1, 16_383]);
}
