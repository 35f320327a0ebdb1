//! Subtext - subtitle toolkit
//!
//! Batch cleanup of SRT subtitle files into plain dialogue text, and SRT
//! subtitle generation from media files through an external Whisper backend,
//! with progress scraped from the backend's console output.

pub mod config;
pub mod media;
pub mod processing;
pub mod subtitle;
pub mod transcription;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder, OutputFormat, TranscriptionConfig};
pub use crate::media::{MediaInfo, MediaScanner};
pub use crate::processing::{BatchProcessor, BatchResult, FileResult, FileStatus};
pub use crate::subtitle::clean::{CleanOutcome, CleanStatus, CleanSummary, SrtCleaner};
pub use crate::subtitle::srt::{SrtEntry, SrtGenerator, TimestampError};
pub use crate::transcription::{
    ProgressParser, ProgressUpdate, TranscriptionResult, TranscriptionSegment, WhisperTranscriber,
};
