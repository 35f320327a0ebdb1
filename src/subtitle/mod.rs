pub mod clean;
pub mod srt;

pub use clean::{CleanOutcome, CleanStatus, CleanSummary, SrtCleaner};
pub use srt::{SrtEntry, SrtGenerator, TimestampError};
