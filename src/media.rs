use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use walkdir::WalkDir;

/// Media file information extracted with ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub filename: String,
    pub duration: Duration,
    pub format: String,
    pub file_size: u64,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Finds and probes media files for transcription
#[derive(Debug, Clone)]
pub struct MediaScanner {
    supported_extensions: Vec<String>,
    recursive: bool,
}

impl MediaScanner {
    pub fn new(supported_extensions: Vec<String>, recursive: bool) -> Self {
        Self {
            supported_extensions,
            recursive,
        }
    }

    /// Resolve an input path to the list of media files to process.
    ///
    /// A file is returned as-is; a directory is scanned for the supported
    /// extensions (flat by default), sorted for deterministic batch order.
    pub fn discover(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        if !path.is_dir() {
            return Err(anyhow!("no such file or directory: {}", path.display()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| self.is_supported(p))
            .collect();
        files.sort();

        Ok(files)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.supported_extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Probe a media file with ffprobe.
    ///
    /// The duration comes from the container; sample rate and channel count
    /// from the first audio stream. A file without an audio stream cannot be
    /// transcribed and is rejected here.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("non-UTF-8 path: {}", path.display()))?;

        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "a:0",
                path_str,
            ])
            .output()
            .await
            .context("failed to run ffprobe (is FFmpeg installed?)")?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        let ffprobe_data: serde_json::Value = serde_json::from_str(&json_str)?;

        let format = &ffprobe_data["format"];
        let audio_stream = ffprobe_data["streams"]
            .as_array()
            .and_then(|streams| streams.first())
            .ok_or_else(|| anyhow!("no audio stream found in {}", path.display()))?;

        let duration_seconds: f64 = format["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        let file_size = tokio::fs::metadata(path).await?.len();

        let media_info = MediaInfo {
            path: path.to_path_buf(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            duration: Duration::from_secs_f64(duration_seconds),
            format: format["format_name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            file_size,
            sample_rate: audio_stream["sample_rate"]
                .as_str()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            channels: audio_stream["channels"].as_u64().unwrap_or(0) as u32,
        };

        info!(
            "Probed media: {} ({}, {:.1}s, {}Hz, {} ch)",
            media_info.filename,
            media_info.format,
            media_info.duration.as_secs_f64(),
            media_info.sample_rate,
            media_info.channels
        );

        Ok(media_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(recursive: bool) -> MediaScanner {
        MediaScanner::new(
            vec!["mp4".to_string(), "mp3".to_string(), "wav".to_string()],
            recursive,
        )
    }

    #[test]
    fn test_extension_matching() {
        let scanner = scanner(false);
        assert!(scanner.is_supported(Path::new("talk.mp4")));
        assert!(scanner.is_supported(Path::new("TALK.MP3")));
        assert!(!scanner.is_supported(Path::new("talk.srt")));
        assert!(!scanner.is_supported(Path::new("no_extension")));
    }

    #[test]
    fn test_discover_single_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        // even an unsupported extension: an explicitly named file is taken as-is
        let file = dir.path().join("lecture.ogg");
        std::fs::write(&file, b"x").unwrap();

        let found = scanner(false).discover(&file).unwrap();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn test_discover_directory_flat_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();
        let nested = dir.path().join("more");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("c.wav"), b"x").unwrap();

        let flat = scanner(false).discover(dir.path()).unwrap();
        assert_eq!(flat.len(), 2);
        // deterministic order
        assert!(flat[0].ends_with("a.mp3"));
        assert!(flat[1].ends_with("b.mp4"));

        let deep = scanner(true).discover(dir.path()).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_discover_missing_path_errors() {
        assert!(scanner(false).discover(Path::new("/no/such/path")).is_err());
    }
}
