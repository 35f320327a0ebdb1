use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of cleaning a single subtitle file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub lines_in: usize,
    pub lines_out: usize,
    pub status: CleanStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanStatus {
    Completed,
    Failed,
}

/// Batch cleanup results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub outcomes: Vec<CleanOutcome>,
}

/// Strips SRT structure from subtitle files, leaving only the dialogue text.
///
/// Cue indexes, time-range lines and HTML markup are removed; everything
/// else survives verbatim, one line per surviving input line.
#[derive(Debug, Clone)]
pub struct SrtCleaner {
    time_line: Regex,
    markup: Regex,
}

impl SrtCleaner {
    pub fn new() -> Self {
        Self {
            time_line: Regex::new(r"\d{2}:\d{2}:\d{2},\d{3}\s-->\s\d{2}:\d{2}:\d{2},\d{3}")
                .unwrap(),
            markup: Regex::new(r"<[^>]+>").unwrap(),
        }
    }

    /// Clean raw SRT content into plain dialogue text.
    ///
    /// A digits-only line is treated as a cue index only when the next raw
    /// line carries a time range; a bare number inside dialogue is kept.
    /// Markup is stripped after the blank-line check, so a line consisting
    /// solely of tags still produces an (empty) output line.
    pub fn clean_content(&self, content: &str) -> String {
        let lines: Vec<&str> = content.lines().collect();
        let mut cleaned = Vec::new();

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim();

            if line.is_empty() {
                continue;
            }

            if self.time_line.is_match(line) {
                continue;
            }

            if line.chars().all(|c| c.is_ascii_digit()) {
                if let Some(next) = lines.get(i + 1) {
                    if self.time_line.is_match(next) {
                        continue;
                    }
                }
            }

            cleaned.push(self.markup.replace_all(line, "").into_owned());
        }

        cleaned.join("\n")
    }

    /// Clean one subtitle file, writing `<stem>.txt` next to the input (or
    /// into `output_dir` when given).
    pub fn clean_file(&self, input: &Path, output_dir: Option<&Path>) -> Result<CleanOutcome> {
        let content = read_subtitle_file(input)?;
        let cleaned = self.clean_content(&content);

        let output = match output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let stem = input
                    .file_stem()
                    .ok_or_else(|| anyhow::anyhow!("no file stem: {}", input.display()))?;
                dir.join(stem).with_extension("txt")
            }
            None => input.with_extension("txt"),
        };

        std::fs::write(&output, &cleaned)
            .with_context(|| format!("failed to write {}", output.display()))?;

        debug!("Cleaned {} -> {}", input.display(), output.display());

        Ok(CleanOutcome {
            input: input.to_path_buf(),
            output: Some(output),
            lines_in: content.lines().count(),
            lines_out: cleaned.lines().count(),
            status: CleanStatus::Completed,
            error_message: None,
        })
    }

    /// Clean a batch of subtitle files sequentially.
    ///
    /// A failing file is recorded and skipped; the batch never aborts.
    pub fn clean_batch(&self, files: &[PathBuf], output_dir: Option<&Path>) -> CleanSummary {
        let start_time = Instant::now();
        let total = files.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, input) in files.iter().enumerate() {
            info!("[{}/{}] Cleaning: {}", index + 1, total, input.display());

            match self.clean_file(input, output_dir) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!("Failed to clean {}: {:#}", input.display(), e);
                    outcomes.push(CleanOutcome {
                        input: input.clone(),
                        output: None,
                        lines_in: 0,
                        lines_out: 0,
                        status: CleanStatus::Failed,
                        error_message: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        let successful = outcomes
            .iter()
            .filter(|o| o.status == CleanStatus::Completed)
            .count();

        CleanSummary {
            total,
            successful,
            failed: total - successful,
            total_time: start_time.elapsed(),
            outcomes,
        }
    }
}

impl Default for SrtCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a subtitle file, tolerating non-UTF-8 encodings.
///
/// Subtitle files from Chinese-language tooling are frequently GBK; GB18030
/// is a superset that decodes every GBK byte sequence.
pub fn read_subtitle_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (text, encoding, had_replacements) = encoding_rs::GB18030.decode(&bytes);
            if had_replacements {
                warn!(
                    "could not decode {} accurately with {}",
                    path.display(),
                    encoding.name()
                );
            }
            text.into_owned()
        }
    })
}

/// Collect subtitle files from a mix of file and directory paths.
///
/// Explicitly named files are taken as-is; directories are scanned for the
/// configured extensions. Duplicates are dropped, first occurrence wins.
pub fn discover_subtitles(
    paths: &[PathBuf],
    extensions: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if seen.insert(path.clone()) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| has_extension(p, extensions))
                .collect();
            found.sort();

            for f in found {
                if seen.insert(f.clone()) {
                    files.push(f);
                }
            }
        } else {
            anyhow::bail!("no such file or directory: {}", path.display());
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
