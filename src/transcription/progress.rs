use regex::Regex;
use std::time::Duration;

/// Highest percentage a scraped update may report. 100% is reserved for
/// actual completion of the pipeline; a stalled backend must never look done.
pub const PROGRESS_CAP: f64 = 99.9;

/// A progress reading derived from one console line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Position of the latest transcribed segment's end
    pub position: Duration,
    /// Percentage of the media duration covered, capped at [`PROGRESS_CAP`]
    pub percent: f64,
}

/// Scrapes transcription progress out of the backend's console output.
///
/// While transcribing, Whisper backends print one line per decoded segment,
/// `[MM:SS.mmm --> MM:SS.mmm] text...`. The end timestamp of the latest
/// segment against the total media duration is the only progress signal the
/// backend offers.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    segment_line: Regex,
    total: Duration,
}

impl ProgressParser {
    pub fn new(total: Duration) -> Self {
        Self {
            segment_line: Regex::new(r"\[([0-9:.]+) --> ([0-9:.]+)\]").unwrap(),
            total,
        }
    }

    /// Derive a progress reading from one console line.
    ///
    /// Returns None for lines without a segment marker, and whenever the
    /// total duration is unknown (zero).
    pub fn parse_line(&self, line: &str) -> Option<ProgressUpdate> {
        if self.total.is_zero() {
            return None;
        }

        let caps = self.segment_line.captures(line)?;
        let end_seconds = parse_console_timestamp(&caps[2]);
        let percent = (end_seconds / self.total.as_secs_f64()) * 100.0;

        Some(ProgressUpdate {
            position: Duration::from_secs_f64(end_seconds),
            percent: percent.min(PROGRESS_CAP),
        })
    }
}

/// Parse a console timestamp (`MM:SS`, `HH:MM:SS`, fractional seconds
/// allowed) into seconds.
///
/// Scraping must never fail a transcription run, so malformed input yields
/// 0.0 rather than an error.
pub fn parse_console_timestamp(timestamp: &str) -> f64 {
    let parts: Vec<&str> = timestamp.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => ("0", *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return 0.0,
    };

    let hours: f64 = match hours.parse::<u64>() {
        Ok(v) => v as f64,
        Err(_) => return 0.0,
    };
    let minutes: f64 = match minutes.parse::<u64>() {
        Ok(v) => v as f64,
        Err(_) => return 0.0,
    };
    let seconds: f64 = match seconds.parse() {
        Ok(v) => v,
        Err(_) => return 0.0,
    };

    hours * 3600.0 + minutes * 60.0 + seconds
}
