use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::progress::{ProgressParser, PROGRESS_CAP};
use crate::config::{OutputFormat, TranscriptionConfig};
use crate::media::MediaInfo;
use crate::subtitle::srt::{self, SrtEntry, SrtGenerator};

/// One time-stamped segment produced by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    /// Segment ID
    pub id: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

/// Complete transcription result for one media file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Full transcription text
    pub text: String,
    /// Detected or requested language
    pub language: Option<String>,
    /// Individual segments with timestamps
    pub segments: Vec<TranscriptionSegment>,
    /// Path to the generated SRT file
    pub srt_path: Option<PathBuf>,
    /// Path to the plain-text transcript
    pub text_path: Option<PathBuf>,
    /// Processing duration
    pub processing_time: Duration,
    /// Model used for transcription
    pub model_used: String,
}

/// Whisper backends, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    WhisperCli,
    WhisperCpp,
    PythonWhisper,
}

impl Backend {
    const ALL: [Backend; 3] = [Backend::WhisperCli, Backend::WhisperCpp, Backend::PythonWhisper];

    fn command(&self) -> &'static str {
        match self {
            Backend::WhisperCli => "whisper-cli",
            Backend::WhisperCpp => "whisper-cpp",
            Backend::PythonWhisper => "whisper",
        }
    }

    fn is_cpp(&self) -> bool {
        !matches!(self, Backend::PythonWhisper)
    }
}

/// Drives an external Whisper command to turn media files into subtitles.
///
/// The model itself is an opaque black box; this type builds the command
/// line, scrapes progress out of its console output, and converts its JSON
/// output into SRT.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
    model: String,
    use_gpu: bool,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        let model = config.model.clone();
        let use_gpu = config.use_gpu || Self::detect_gpu_env();

        Self {
            config,
            model,
            use_gpu,
        }
    }

    /// Create transcriber with custom model
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Enable or disable GPU acceleration
    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Transcribe one media file, writing the configured output formats
    /// into `output_dir`.
    pub async fn transcribe(
        &self,
        media: &MediaInfo,
        output_dir: &Path,
    ) -> Result<TranscriptionResult> {
        let start_time = Instant::now();

        info!(
            "Starting transcription: {} ({:.1}s, model {})",
            media.filename,
            media.duration.as_secs_f64(),
            self.model
        );

        let estimated = self.estimate_processing_time(media.duration);
        info!(
            "Estimated processing time: {:.1} minutes",
            estimated.as_secs_f64() / 60.0
        );

        tokio::fs::create_dir_all(output_dir).await?;

        // The backend drops its JSON (and other intermediates) here; the
        // directory disappears with the guard.
        let scratch = tempfile::Builder::new()
            .prefix("subtext-whisper-")
            .tempdir()
            .context("failed to create scratch directory")?;

        let backend = Self::detect_backend().await?;
        info!("Using {} backend", backend.command());

        let cmd = self.build_command(backend, &media.path, scratch.path())?;
        let parser = ProgressParser::new(media.duration);
        let status = self.run_streaming(cmd, parser, backend).await?;

        if !status.success() {
            return Err(anyhow!(
                "{} exited with {} for {}",
                backend.command(),
                status,
                media.filename
            ));
        }

        let output = self.read_output_json(scratch.path()).await?;
        let (segments, full_text, language) = output.into_parts();

        let stem = media
            .path
            .file_stem()
            .ok_or_else(|| anyhow!("no file stem: {}", media.path.display()))?
            .to_string_lossy()
            .to_string();

        let mut srt_path = None;
        let mut text_path = None;
        for format in &self.config.output_formats {
            match format {
                OutputFormat::Srt => {
                    srt_path = Some(self.write_srt(&segments, &stem, output_dir).await?);
                }
                OutputFormat::Text => {
                    text_path = Some(self.write_text(&full_text, &stem, output_dir).await?);
                }
            }
        }

        let processing_time = start_time.elapsed();
        info!(
            "Transcription completed in {:.1}s: {} segments, {} characters",
            processing_time.as_secs_f64(),
            segments.len(),
            full_text.len()
        );

        Ok(TranscriptionResult {
            text: full_text,
            language,
            segments,
            srt_path,
            text_path,
            processing_time,
            model_used: self.model.clone(),
        })
    }

    /// Find the first installed backend
    async fn detect_backend() -> Result<Backend> {
        for backend in Backend::ALL {
            debug!("Checking for {} command...", backend.command());
            if Self::check_command_available(backend.command()).await {
                return Ok(backend);
            }
        }

        Err(anyhow!(
            "No Whisper backend found. Please install:\n\
            - whisper.cpp (recommended): https://github.com/ggerganov/whisper.cpp\n\
            - Or OpenAI Whisper: pip install openai-whisper"
        ))
    }

    fn build_command(&self, backend: Backend, input: &Path, scratch: &Path) -> Result<Command> {
        let input_str = input
            .to_str()
            .ok_or_else(|| anyhow!("non-UTF-8 path: {}", input.display()))?;
        let scratch_str = scratch
            .to_str()
            .ok_or_else(|| anyhow!("non-UTF-8 scratch path"))?;

        let mut cmd = Command::new(backend.command());

        if backend.is_cpp() {
            let stem = input
                .file_stem()
                .ok_or_else(|| anyhow!("no file stem: {}", input.display()))?;
            let output_base = scratch.join(stem);

            cmd.arg("-f")
                .arg(input_str)
                .arg("-oj")
                .arg("-of")
                .arg(&output_base)
                .arg("-t")
                .arg(num_cpus::get().min(8).to_string())
                .arg("-tp")
                .arg(self.config.temperature.to_string());

            let model_path = match &self.config.model_path {
                Some(path) => path.clone(),
                None => PathBuf::from(format!("models/ggml-{}.bin", self.model)),
            };
            cmd.arg("-m").arg(model_path);

            if let Some(language) = &self.config.language {
                cmd.arg("-l").arg(language);
            }
        } else {
            cmd.arg(input_str)
                .arg("--model")
                .arg(&self.model)
                .arg("--output_dir")
                .arg(scratch_str)
                .arg("--output_format")
                .arg("json")
                // verbose mode prints the segment lines progress is scraped from
                .arg("--verbose")
                .arg("True")
                .arg("--fp16")
                .arg("False")
                .arg("--temperature")
                .arg(self.config.temperature.to_string())
                .arg("--best_of")
                .arg(self.config.best_of.to_string())
                .arg("--beam_size")
                .arg(self.config.beam_size.to_string());

            if let Some(language) = &self.config.language {
                cmd.arg("--language").arg(language);
            }

            if !self.use_gpu {
                cmd.arg("--device").arg("cpu");
            }
        }

        debug!("Backend command: {:?}", cmd);
        Ok(cmd)
    }

    /// Run the backend, scraping progress off both console streams, with
    /// the configured timeout.
    async fn run_streaming(
        &self,
        mut cmd: Command,
        parser: ProgressParser,
        backend: Backend,
    ) -> Result<std::process::ExitStatus> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", backend.command()))?;

        // Python Whisper prints segment lines to stdout, whisper.cpp to
        // stderr; drain both and let the parser sort it out.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = stdout.map(|out| {
            let parser = parser.clone();
            tokio::spawn(stream_console_lines(BufReader::new(out), parser, "stdout"))
        });
        let stderr_task = stderr.map(|err| {
            let parser = parser.clone();
            tokio::spawn(stream_console_lines(BufReader::new(err), parser, "stderr"))
        });

        let timeout = Duration::from_secs(self.config.timeout);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                error!(
                    "{} timed out after {}s, killing it",
                    backend.command(),
                    self.config.timeout
                );
                let _ = child.kill().await;
                return Err(anyhow!(
                    "transcription timed out after {} seconds",
                    self.config.timeout
                ));
            }
        };

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        Ok(status)
    }

    /// Locate and parse the backend's JSON output in the scratch directory
    async fn read_output_json(&self, scratch: &Path) -> Result<WhisperOutput> {
        let mut json_file = None;
        let mut entries = tokio::fs::read_dir(scratch).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                json_file = Some(path);
                break;
            }
        }

        let json_file =
            json_file.ok_or_else(|| anyhow!("backend produced no JSON output"))?;
        let json_content = tokio::fs::read_to_string(&json_file).await?;

        serde_json::from_str(&json_content)
            .with_context(|| format!("failed to parse backend JSON: {}", json_file.display()))
    }

    /// Render segments to `<stem>.srt`
    async fn write_srt(
        &self,
        segments: &[TranscriptionSegment],
        stem: &str,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let mut generator = SrtGenerator::new();

        for segment in segments {
            if segment.text.trim().is_empty() {
                continue;
            }

            generator.add_entry(SrtEntry::new(
                segment.id + 1,
                Duration::from_secs_f64(segment.start),
                Duration::from_secs_f64(segment.end),
                srt::clean_text(&segment.text),
            ));
        }

        generator.sort_entries();
        let issues = generator.validate();
        if !issues.is_empty() {
            warn!("SRT validation issues: {:?}", issues);
        }

        let srt_path = output_dir.join(format!("{}.srt", stem));
        generator.save_to_file(&srt_path).await?;

        info!(
            "SRT file saved: {} ({} entries)",
            srt_path.display(),
            generator.len()
        );

        Ok(srt_path)
    }

    /// Save the plain transcript to `<stem>.txt`
    async fn write_text(&self, text: &str, stem: &str, output_dir: &Path) -> Result<PathBuf> {
        let text_path = output_dir.join(format!("{}.txt", stem));
        tokio::fs::write(&text_path, text).await?;

        info!(
            "Text file saved: {} ({} characters)",
            text_path.display(),
            text.len()
        );

        Ok(text_path)
    }

    async fn check_command_available(cmd_name: &str) -> bool {
        Command::new(cmd_name)
            .arg("--help")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn detect_gpu_env() -> bool {
        std::env::var("CUDA_VISIBLE_DEVICES").is_ok()
            || std::env::var("SUBTEXT_USE_GPU")
                .map_or(false, |v| v == "1" || v.to_lowercase() == "true")
    }

    /// Check if any Whisper backend is installed
    pub async fn check_availability() -> Result<String> {
        let backend = Self::detect_backend().await?;
        let kind = if backend.is_cpp() {
            "whisper.cpp"
        } else {
            "OpenAI Whisper (Python)"
        };
        Ok(format!("{} available as '{}'", kind, backend.command()))
    }

    /// Rough wall-clock estimate for a CPU run of the configured model
    pub fn estimate_processing_time(&self, media_duration: Duration) -> Duration {
        let multiplier = match self.model.as_str() {
            "tiny" => 2.0,
            "base" => 5.0,
            "small" => 10.0,
            "medium" => 20.0,
            "large" | "large-v1" | "large-v2" | "large-v3" => 40.0,
            "turbo" => 8.0,
            _ => 10.0,
        };

        let gpu_factor = if self.use_gpu { 0.3 } else { 1.0 };
        Duration::from_secs_f64(media_duration.as_secs_f64() * multiplier * gpu_factor)
    }
}

/// Drain one console stream, logging scraped progress at a throttled cadence
async fn stream_console_lines<R>(reader: BufReader<R>, parser: ProgressParser, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let mut last_reported = f64::NEG_INFINITY;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(update) = parser.parse_line(&line) {
                    // every segment line would flood the log; report in
                    // 5-point steps plus the final capped reading
                    if update.percent - last_reported >= 5.0
                        || (update.percent >= PROGRESS_CAP && last_reported < PROGRESS_CAP)
                    {
                        info!(
                            "Transcribing: {:>5.1}% ({})",
                            update.percent,
                            srt::format_timestamp(update.position)
                        );
                        last_reported = update.percent;
                    } else {
                        debug!("progress {:.1}%: {}", update.percent, line.trim());
                    }
                } else if !line.trim().is_empty() {
                    debug!("whisper {}: {}", stream, line.trim());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading whisper {}: {}", stream, e);
                break;
            }
        }
    }
}

/// Whisper JSON output, accepting both backend dialects
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    /// Python backend: full transcript
    #[serde(default)]
    text: Option<String>,
    /// Python backend: detected language
    #[serde(default)]
    language: Option<String>,
    /// Python backend: float-second segments
    #[serde(default)]
    segments: Vec<JsonSegment>,
    /// whisper.cpp: segments with SRT-style string timestamps
    #[serde(default)]
    transcription: Vec<CppSegment>,
    /// whisper.cpp: run metadata
    #[serde(default)]
    result: Option<CppResult>,
}

#[derive(Debug, Deserialize)]
struct CppResult {
    language: String,
}

#[derive(Debug, Deserialize)]
struct CppSegment {
    timestamps: CppTimestamps,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CppTimestamps {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct JsonSegment {
    start: f64,
    end: f64,
    text: String,
}

impl WhisperOutput {
    /// Normalize either dialect into segments + full text + language
    fn into_parts(self) -> (Vec<TranscriptionSegment>, String, Option<String>) {
        if !self.transcription.is_empty() {
            debug!(
                "whisper.cpp JSON format, {} segments",
                self.transcription.len()
            );

            let segments: Vec<TranscriptionSegment> = self
                .transcription
                .into_iter()
                .enumerate()
                .map(|(i, seg)| TranscriptionSegment {
                    id: i as u32,
                    // a malformed timestamp degrades one segment, not the run
                    start: srt::parse_timestamp(&seg.timestamps.from)
                        .map(|d| d.as_secs_f64())
                        .unwrap_or(0.0),
                    end: srt::parse_timestamp(&seg.timestamps.to)
                        .map(|d| d.as_secs_f64())
                        .unwrap_or(0.0),
                    text: seg.text.trim().to_string(),
                })
                .collect();

            let full_text = join_segments(&segments);
            let language = self.result.map(|r| r.language).or(self.language);

            (segments, full_text, language)
        } else {
            debug!("Python whisper JSON format, {} segments", self.segments.len());

            let segments: Vec<TranscriptionSegment> = self
                .segments
                .into_iter()
                .enumerate()
                .map(|(i, seg)| TranscriptionSegment {
                    id: i as u32,
                    start: seg.start,
                    end: seg.end,
                    text: seg.text.trim().to_string(),
                })
                .collect();

            let full_text = self
                .text
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| join_segments(&segments));

            (segments, full_text, self.language)
        }
    }
}

fn join_segments(segments: &[TranscriptionSegment]) -> String {
    segments
        .iter()
        .map(|seg| seg.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn transcriber() -> WhisperTranscriber {
        WhisperTranscriber::new(Config::default().transcription)
    }

    #[test]
    fn test_transcriber_creation() {
        let t = transcriber();
        assert_eq!(t.model(), "small");

        let t = t.with_model("turbo".to_string());
        assert_eq!(t.model(), "turbo");
    }

    #[test]
    fn test_processing_time_estimation() {
        let t = transcriber().with_gpu(false);
        let estimated = t.estimate_processing_time(Duration::from_secs(60));
        assert!(estimated > Duration::ZERO);
        assert!(estimated < Duration::from_secs(3600));

        let gpu = transcriber().with_gpu(true);
        assert!(gpu.estimate_processing_time(Duration::from_secs(60)) < estimated);
    }

    #[test]
    fn test_python_command_arguments() {
        let t = transcriber().with_gpu(false);
        let cmd = t
            .build_command(
                Backend::PythonWhisper,
                Path::new("/tmp/talk.mp4"),
                Path::new("/tmp/scratch"),
            )
            .unwrap();

        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert!(args.contains(&"--model".to_string()));
        assert!(args.contains(&"small".to_string()));
        assert!(args.contains(&"--verbose".to_string()));
        assert!(args.contains(&"True".to_string()));
        assert!(args.contains(&"--device".to_string()));
        // auto-detect: no --language flag
        assert!(!args.contains(&"--language".to_string()));
    }

    #[test]
    fn test_cpp_command_arguments() {
        let mut config = Config::default().transcription;
        config.language = Some("zh".to_string());
        let t = WhisperTranscriber::new(config);

        let cmd = t
            .build_command(
                Backend::WhisperCli,
                Path::new("/tmp/talk.mp4"),
                Path::new("/tmp/scratch"),
            )
            .unwrap();

        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert!(args.contains(&"-oj".to_string()));
        assert!(args.contains(&"-l".to_string()));
        assert!(args.contains(&"zh".to_string()));
        assert!(args.contains(&"models/ggml-small.bin".to_string()));
    }

    #[test]
    fn test_parse_python_json() {
        let json = r#"{
            "text": " Hello world. Second part.",
            "language": "en",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 2.5, "text": " Hello world."},
                {"id": 1, "seek": 0, "start": 2.5, "end": 5.0, "text": " Second part."}
            ]
        }"#;

        let output: WhisperOutput = serde_json::from_str(json).unwrap();
        let (segments, text, language) = output.into_parts();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world.");
        assert_eq!(segments[1].start, 2.5);
        assert_eq!(text, "Hello world. Second part.");
        assert_eq!(language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_cpp_json() {
        let json = r#"{
            "result": {"language": "en"},
            "transcription": [
                {
                    "timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                    "offsets": {"from": 0, "to": 2500},
                    "text": " Hello world."
                },
                {
                    "timestamps": {"from": "00:00:02,500", "to": "00:00:05,000"},
                    "offsets": {"from": 2500, "to": 5000},
                    "text": " Second part."
                }
            ]
        }"#;

        let output: WhisperOutput = serde_json::from_str(json).unwrap();
        let (segments, text, language) = output.into_parts();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.5);
        assert_eq!(segments[1].end, 5.0);
        assert_eq!(text, "Hello world. Second part.");
        assert_eq!(language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_cpp_json_malformed_timestamp_degrades() {
        let json = r#"{
            "transcription": [
                {"timestamps": {"from": "garbage", "to": "00:00:02,000"}, "text": "ok"}
            ]
        }"#;

        let output: WhisperOutput = serde_json::from_str(json).unwrap();
        let (segments, _, language) = output.into_parts();

        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.0);
        assert!(language.is_none());
    }

    #[tokio::test]
    async fn test_write_srt_skips_empty_segments() {
        let dir = tempfile::tempdir().unwrap();
        let t = transcriber();

        let segments = vec![
            TranscriptionSegment {
                id: 0,
                start: 0.0,
                end: 2.0,
                text: "First".to_string(),
            },
            TranscriptionSegment {
                id: 1,
                start: 2.0,
                end: 3.0,
                text: "   ".to_string(),
            },
            TranscriptionSegment {
                id: 2,
                start: 3.0,
                end: 4.0,
                text: "Third".to_string(),
            },
        ];

        let srt_path = t.write_srt(&segments, "talk", dir.path()).await.unwrap();
        let content = tokio::fs::read_to_string(&srt_path).await.unwrap();

        assert!(content.contains("First"));
        assert!(content.contains("Third"));
        // renumbered after the empty segment was dropped
        assert!(content.starts_with("1\n"));
        assert!(content.contains("\n2\n"));
        assert!(!content.contains("\n3\n"));
    }

    #[tokio::test]
    async fn test_whisper_availability_probe_does_not_panic() {
        // passes or fails depending on the environment; only the call path
        // is exercised here
        let _ = WhisperTranscriber::check_availability().await;
    }
}
