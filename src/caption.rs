use regex::Regex;
use serde::{Deserialize, Serialize};

/// A time-bounded span of recognized text within a recording.
///
/// Times are seconds from the start of the audio, stored at millisecond
/// precision by the SRT round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            text: text.into(),
        }
    }
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm), rounding to the
/// nearest millisecond.
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT timestamp (HH:MM:SS,mmm) back into seconds.
pub fn parse_srt_time(s: &str) -> Option<f64> {
    let (hms, millis) = s.trim().split_once(',')?;
    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let secs: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let millis: u64 = millis.parse().ok()?;
    let total_ms = (hours * 3600 + minutes * 60 + secs) * 1000 + millis;
    Some(total_ms as f64 / 1000.0)
}

/// Render numbered SRT caption blocks from ordered segments.
pub fn segments_to_srt(segments: &[Segment]) -> String {
    let mut srt = String::new();
    for (i, segment) in segments.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_time(segment.start_secs),
            format_srt_time(segment.end_secs),
            segment.text.trim()
        ));
    }
    srt
}

/// Parse SRT content into ordered segments.
///
/// Tolerates blank lines and CRLF; a block whose timing line does not match
/// `HH:MM:SS,mmm --> HH:MM:SS,mmm` is a parse error. Blocks must be in
/// non-decreasing start order and overlap-free; a block that starts before
/// the previous one ends, or ends before it starts, is a parse error.
pub fn parse_srt(content: &str) -> Result<Vec<Segment>, String> {
    // Unwrap is fine: the pattern is a compile-time constant.
    let timing = Regex::new(
        r"^(\d{2}:\d{2}:\d{2},\d{3})\s*-->\s*(\d{2}:\d{2}:\d{2},\d{3})\s*$",
    )
    .unwrap();

    let mut segments: Vec<Segment> = Vec::new();
    let mut lines = content.lines().map(|l| l.trim_end_matches('\r')).peekable();

    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        // Block index line; the numbering itself is not trusted.
        if line.trim().parse::<u64>().is_err() {
            return Err(format!("expected caption index, found: '{}'", line.trim()));
        }
        let timing_line = lines
            .next()
            .ok_or_else(|| "caption block truncated before timing line".to_string())?;
        let caps = timing
            .captures(timing_line.trim())
            .ok_or_else(|| format!("malformed timing line: '{}'", timing_line.trim()))?;
        let start_secs = parse_srt_time(&caps[1])
            .ok_or_else(|| format!("bad start time: '{}'", &caps[1]))?;
        let end_secs = parse_srt_time(&caps[2])
            .ok_or_else(|| format!("bad end time: '{}'", &caps[2]))?;
        if end_secs < start_secs {
            return Err(format!(
                "caption block ends before it starts: '{}'",
                timing_line.trim()
            ));
        }
        if let Some(prev) = segments.last() {
            if start_secs < prev.end_secs {
                return Err(format!(
                    "caption block overlaps the previous one: '{}'",
                    timing_line.trim()
                ));
            }
        }

        let mut text_lines = Vec::new();
        while let Some(text) = lines.peek() {
            if text.trim().is_empty() {
                break;
            }
            text_lines.push(lines.next().unwrap().trim().to_string());
        }
        segments.push(Segment {
            start_secs,
            end_secs,
            text: text_lines.join(" "),
        });
    }

    Ok(segments)
}
