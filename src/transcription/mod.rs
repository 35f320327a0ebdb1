pub mod progress;
pub mod whisper;

pub use progress::{ProgressParser, ProgressUpdate};
pub use whisper::{TranscriptionResult, TranscriptionSegment, WhisperTranscriber};
