//! SRT (SubRip) subtitle export
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,500
//! First segment
//!
//! 2
//! 00:00:02,500 --> 00:00:05,000
//! Second segment
//! ```

use crate::timeline::Segment;

/// Convert seconds to an SRT timestamp (`HH:MM:SS,mmm`).
///
/// Milliseconds are rounded once on the total, then split into fields, so a
/// fractional part close to 1.0 carries into the seconds instead of printing
/// `,1000`. Negative or non-finite input renders as zero.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };

    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Render segments as an SRT document, numbered from 1 in list order.
///
/// Each block is `index\nstart --> end\ntext\n`; blocks are separated by a
/// blank line.
pub fn to_srt(segments: &[Segment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                index + 1,
                format_srt_timestamp(segment.start_time),
                format_srt_timestamp(segment.end_time),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
