use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::media::{MediaInfo, MediaScanner};
use crate::transcription::{TranscriptionResult, WhisperTranscriber};

/// Processing result for a single media file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub filename: String,
    pub media: Option<MediaInfo>,
    pub transcription: Option<TranscriptionResult>,
    pub srt_path: Option<PathBuf>,
    pub text_path: Option<PathBuf>,
    pub processing_time: Duration,
    pub status: FileStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Completed,
    Failed,
    Skipped,
}

/// Overall batch transcription results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Local>,
    pub total_time: Duration,
    pub results: Vec<FileResult>,
}

/// Batch transcription driver with bounded concurrency.
///
/// Workers default to 1: the model saturates all cores by itself, so
/// parallelism only pays off for batches of short clips.
pub struct BatchProcessor {
    config: Config,
    transcriber: WhisperTranscriber,
    scanner: MediaScanner,
    worker_semaphore: Arc<Semaphore>,
    max_workers: usize,
}

impl BatchProcessor {
    pub fn new(config: Config) -> Result<Self> {
        let max_workers = config.performance.max_workers;
        info!("Initializing batch processor with {} worker(s)", max_workers);

        let transcriber = WhisperTranscriber::new(config.transcription.clone());
        let scanner = MediaScanner::new(
            config.media.supported_extensions.clone(),
            config.media.recursive,
        );

        Ok(Self {
            config,
            transcriber,
            scanner,
            worker_semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        })
    }

    /// Transcribe a media file, or every media file under a directory.
    pub async fn run(&self, input: &Path) -> Result<BatchResult> {
        let started_at = Local::now();
        let start_time = Instant::now();

        let files = self.scanner.discover(input)?;

        if files.is_empty() {
            warn!("No supported media files found in {}", input.display());
            return Ok(BatchResult {
                total: 0,
                successful: 0,
                failed: 0,
                skipped: 0,
                started_at,
                total_time: start_time.elapsed(),
                results: Vec::new(),
            });
        }

        info!("🎬 Found {} media file(s) to transcribe", files.len());

        let results = self.process_parallel(files).await;

        let successful = results
            .iter()
            .filter(|r| r.status == FileStatus::Completed)
            .count();
        let skipped = results
            .iter()
            .filter(|r| r.status == FileStatus::Skipped)
            .count();
        let failed = results.len() - successful - skipped;

        let batch = BatchResult {
            total: results.len(),
            successful,
            failed,
            skipped,
            started_at,
            total_time: start_time.elapsed(),
            results,
        };

        if self.config.output.save_report {
            self.save_report(input, &batch).await?;
        }

        Ok(batch)
    }

    async fn process_parallel(&self, files: Vec<PathBuf>) -> Vec<FileResult> {
        let (tx, mut rx) = mpsc::channel(self.max_workers);
        let total = files.len();

        for (index, path) in files.into_iter().enumerate() {
            let transcriber = self.transcriber.clone();
            let scanner = self.scanner.clone();
            let output_dir = self.config.output.output_dir.clone();
            let skip_existing = self.config.transcription.skip_existing;
            let semaphore = Arc::clone(&self.worker_semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");

                info!("🎙️  [{}/{}] Processing: {}", index + 1, total, path.display());

                let result = process_file(
                    &transcriber,
                    &scanner,
                    &path,
                    output_dir.as_deref(),
                    skip_existing,
                )
                .await;

                if let Err(e) = tx.send((index, result)).await {
                    error!("Failed to report result for {}: {}", path.display(), e);
                }
            });
        }

        drop(tx);

        let mut indexed = Vec::with_capacity(total);
        while let Some((index, result)) = rx.recv().await {
            match result.status {
                FileStatus::Completed => {
                    info!(
                        "✅ Completed: {} in {:.1}s",
                        result.filename,
                        result.processing_time.as_secs_f64()
                    );
                }
                FileStatus::Skipped => {
                    info!("⏭️  Skipped (output exists): {}", result.filename);
                }
                FileStatus::Failed => {
                    warn!(
                        "❌ Failed: {} - {}",
                        result.filename,
                        result.error_message.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            indexed.push((index, result));
        }

        // restore input order regardless of completion order
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    async fn save_report(&self, input: &Path, batch: &BatchResult) -> Result<()> {
        let report_dir = match &self.config.output.output_dir {
            Some(dir) => dir.clone(),
            None if input.is_dir() => input.to_path_buf(),
            None => input.parent().unwrap_or(Path::new(".")).to_path_buf(),
        };
        tokio::fs::create_dir_all(&report_dir).await?;

        let report_path = report_dir.join("transcription_results.json");
        let json_data = serde_json::to_string_pretty(batch)?;
        tokio::fs::write(&report_path, json_data).await?;

        info!("💾 Batch report saved to: {}", report_path.display());
        Ok(())
    }

    /// Get processing statistics
    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats {
            max_workers: self.max_workers,
            available_permits: self.worker_semaphore.available_permits(),
        }
    }
}

/// Run one file through probe -> transcribe, capturing failures in the
/// result instead of aborting the batch.
async fn process_file(
    transcriber: &WhisperTranscriber,
    scanner: &MediaScanner,
    path: &Path,
    output_dir: Option<&Path>,
    skip_existing: bool,
) -> FileResult {
    let start_time = Instant::now();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    // outputs default next to the input file
    let target_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => path.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };

    let mut result = FileResult {
        path: path.to_path_buf(),
        filename,
        media: None,
        transcription: None,
        srt_path: None,
        text_path: None,
        processing_time: Duration::ZERO,
        status: FileStatus::Failed,
        error_message: None,
    };

    if skip_existing {
        let existing = path
            .file_stem()
            .map(|stem| target_dir.join(stem).with_extension("srt"));
        if existing.as_deref().map_or(false, Path::exists) {
            result.status = FileStatus::Skipped;
            result.srt_path = existing;
            result.processing_time = start_time.elapsed();
            return result;
        }
    }

    let media: MediaInfo = match scanner.probe(path).await {
        Ok(media) => media,
        Err(e) => {
            result.error_message = Some(format!("media probe failed: {:#}", e));
            result.processing_time = start_time.elapsed();
            return result;
        }
    };
    result.media = Some(media.clone());

    let transcription: TranscriptionResult =
        match transcriber.transcribe(&media, &target_dir).await {
            Ok(transcription) => transcription,
            Err(e) => {
                result.error_message = Some(format!("transcription failed: {:#}", e));
                result.processing_time = start_time.elapsed();
                return result;
            }
        };

    result.srt_path = transcription.srt_path.clone();
    result.text_path = transcription.text_path.clone();
    result.transcription = Some(transcription);
    result.status = FileStatus::Completed;
    result.processing_time = start_time.elapsed();
    result
}

#[derive(Debug, Clone)]
pub struct ProcessingStats {
    pub max_workers: usize,
    pub available_permits: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_batch_processor_creation() {
        let config = ConfigBuilder::new().with_workers(4).build();
        let processor = BatchProcessor::new(config).unwrap();

        let stats = processor.stats();
        assert_eq!(stats.max_workers, 4);
        assert_eq!(stats.available_permits, 4);
    }

    #[tokio::test]
    async fn test_empty_directory_run() {
        let config = Config::default();
        let processor = BatchProcessor::new(config).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let result = processor.run(temp_dir.path()).await.unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 0);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_skip_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let media_path = temp_dir.path().join("talk.mp4");
        tokio::fs::write(&media_path, b"not really a video").await.unwrap();
        tokio::fs::write(temp_dir.path().join("talk.srt"), b"1\n").await.unwrap();

        let config = ConfigBuilder::new().skip_existing(true).build();
        let transcriber = WhisperTranscriber::new(config.transcription.clone());
        let scanner = MediaScanner::new(vec!["mp4".to_string()], false);

        let result = process_file(&transcriber, &scanner, &media_path, None, true).await;
        assert_eq!(result.status, FileStatus::Skipped);
        assert!(result.srt_path.is_some());
        assert!(result.transcription.is_none());
    }

    #[tokio::test]
    async fn test_unprobeable_file_is_recorded_as_failed() {
        let temp_dir = TempDir::new().unwrap();
        let bogus = temp_dir.path().join("bogus.mp4");
        tokio::fs::write(&bogus, b"plain text, not media").await.unwrap();

        let config = Config::default();
        let transcriber = WhisperTranscriber::new(config.transcription.clone());
        let scanner = MediaScanner::new(vec!["mp4".to_string()], false);

        let result = process_file(&transcriber, &scanner, &bogus, None, false).await;
        assert_eq!(result.status, FileStatus::Failed);
        assert!(result.error_message.is_some());
    }
}
