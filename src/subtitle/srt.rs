use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Error produced when an SRT timestamp string cannot be parsed
#[derive(Debug, thiserror::Error)]
pub enum TimestampError {
    #[error("malformed timestamp: {0:?}")]
    Malformed(String),

    #[error("invalid number in timestamp: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),
}

/// SRT (SubRip Subtitle) entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtEntry {
    /// Sequential number
    pub index: u32,
    /// Start timestamp
    pub start: Duration,
    /// End timestamp
    pub end: Duration,
    /// Subtitle text
    pub text: String,
}

impl SrtEntry {
    pub fn new(index: u32, start: Duration, end: Duration, text: String) -> Self {
        Self {
            index,
            start,
            end,
            text: text.trim().to_string(),
        }
    }
}

impl fmt::Display for SrtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_timestamp(self.start),
            format_timestamp(self.end),
            self.text
        )
    }
}

/// SRT file generator and formatter
#[derive(Debug, Clone, Default)]
pub struct SrtGenerator {
    entries: Vec<SrtEntry>,
}

impl SrtGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: SrtEntry) {
        self.entries.push(entry);
    }

    /// Sort entries by start time and renumber from 1
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| a.start.cmp(&b.start));

        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.index = (i + 1) as u32;
        }
    }

    /// Render the full SRT document
    pub fn generate(&self) -> String {
        let mut srt_content = String::new();

        for entry in &self.entries {
            srt_content.push_str(&entry.to_string());
            srt_content.push('\n');
        }

        srt_content
    }

    /// Save SRT to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.generate();
        tokio::fs::write(path.as_ref(), content).await?;
        Ok(())
    }

    /// Total duration covered by the entries
    pub fn total_duration(&self) -> Duration {
        self.entries
            .iter()
            .map(|entry| entry.end)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SrtEntry] {
        &self.entries
    }

    /// Check entries for common authoring problems
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.end <= entry.start {
                issues.push(format!("Entry {}: end time is not after start time", i + 1));
            }

            if entry.text.trim().is_empty() {
                issues.push(format!("Entry {}: empty text", i + 1));
            }
        }

        for i in 0..self.entries.len().saturating_sub(1) {
            if self.entries[i].end > self.entries[i + 1].start {
                issues.push(format!(
                    "Entries {} and {}: overlapping timestamps",
                    i + 1,
                    i + 2
                ));
            }
        }

        issues
    }
}

/// Format a duration as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_timestamp(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let milliseconds = duration.subsec_millis();

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, milliseconds)
}

/// Parse an SRT timestamp (HH:MM:SS,mmm) into a duration
pub fn parse_timestamp(timestamp: &str) -> Result<Duration, TimestampError> {
    let (time_part, millis_part) = timestamp
        .split_once(',')
        .ok_or_else(|| TimestampError::Malformed(timestamp.to_string()))?;

    let hms: Vec<&str> = time_part.split(':').collect();
    if hms.len() != 3 {
        return Err(TimestampError::Malformed(timestamp.to_string()));
    }

    let hours: u64 = hms[0].trim().parse()?;
    let minutes: u64 = hms[1].parse()?;
    let seconds: u64 = hms[2].parse()?;
    let milliseconds: u64 = millis_part.trim().parse()?;

    let total_millis = (hours * 3600 + minutes * 60 + seconds) * 1000 + milliseconds;
    Ok(Duration::from_millis(total_millis))
}

/// Collapse runs of whitespace and strip line breaks for single-line display
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_display() {
        let entry = SrtEntry::new(
            1,
            Duration::from_secs(10),
            Duration::from_millis(15_250),
            "  Test subtitle  ".to_string(),
        );

        assert_eq!(entry.text, "Test subtitle");
        let output = entry.to_string();
        assert!(output.starts_with("1\n"));
        assert!(output.contains("00:00:10,000 --> 00:00:15,250"));
        assert!(output.contains("Test subtitle"));
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(Duration::from_secs(3661)), "01:01:01,000");
        assert_eq!(format_timestamp(Duration::from_millis(1500)), "00:00:01,500");
        assert_eq!(format_timestamp(Duration::ZERO), "00:00:00,000");
    }

    #[test]
    fn test_timestamp_parsing() {
        assert_eq!(
            parse_timestamp("00:01:23,456").unwrap(),
            Duration::from_millis(83_456)
        );
        assert_eq!(parse_timestamp("01:00:00,000").unwrap(), Duration::from_secs(3600));

        assert!(matches!(
            parse_timestamp("00:01:23"),
            Err(TimestampError::Malformed(_))
        ));
        assert!(matches!(
            parse_timestamp("1:23,456"),
            Err(TimestampError::Malformed(_))
        ));
        assert!(parse_timestamp("aa:bb:cc,ddd").is_err());
    }

    #[test]
    fn test_timestamp_round_trip() {
        for millis in [0u64, 999, 61_001, 3_599_999, 7_384_250] {
            let duration = Duration::from_millis(millis);
            let formatted = format_timestamp(duration);
            assert_eq!(parse_timestamp(&formatted).unwrap(), duration);
        }
    }

    #[test]
    fn test_generator_sorts_and_renumbers() {
        let mut generator = SrtGenerator::new();
        generator.add_entry(SrtEntry::new(
            9,
            Duration::from_secs(5),
            Duration::from_secs(10),
            "Second".to_string(),
        ));
        generator.add_entry(SrtEntry::new(
            4,
            Duration::from_secs(0),
            Duration::from_secs(5),
            "First".to_string(),
        ));

        generator.sort_entries();
        let entries = generator.entries();
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[0].text, "First");
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].text, "Second");

        let content = generator.generate();
        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:05,000\nFirst\n\n"));
        assert_eq!(generator.total_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");

        let mut generator = SrtGenerator::new();
        generator.add_entry(SrtEntry::new(
            1,
            Duration::ZERO,
            Duration::from_secs(2),
            "Hello".to_string(),
        ));

        tokio_test::block_on(generator.save_to_file(&path)).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Hello"));
    }

    #[test]
    fn test_validation() {
        let mut generator = SrtGenerator::new();
        generator.add_entry(SrtEntry::new(
            1,
            Duration::from_secs(10),
            Duration::from_secs(5),
            "Backwards".to_string(),
        ));
        generator.add_entry(SrtEntry::new(
            2,
            Duration::from_secs(15),
            Duration::from_secs(20),
            "".to_string(),
        ));

        let issues = generator.validate();
        assert!(issues.iter().any(|i| i.contains("end time is not after")));
        assert!(issues.iter().any(|i| i.contains("empty text")));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  This\thas\n\rmultiple   spaces  "), "This has multiple spaces");
    }
}
