use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whisper model catalogue accepted by `transcription.model`
pub const KNOWN_MODELS: &[&str] = &[
    "tiny", "base", "small", "medium", "large", "large-v1", "large-v2", "large-v3", "turbo",
];

/// Configuration for the subtext toolkit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SRT cleanup settings
    pub cleaning: CleaningConfig,

    /// Media discovery settings
    pub media: MediaConfig,

    /// Transcription backend settings
    pub transcription: TranscriptionConfig,

    /// Output and logging settings
    pub output: OutputConfig,

    /// Concurrency settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Subtitle file extensions picked up when scanning a directory
    pub subtitle_extensions: Vec<String>,

    /// Recurse into subdirectories when scanning
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Media file extensions picked up when scanning a directory
    pub supported_extensions: Vec<String>,

    /// Recurse into subdirectories when scanning
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Model to use for transcription
    pub model: String,

    /// Path to a ggml model file for whisper.cpp backends
    pub model_path: Option<PathBuf>,

    /// Language hint; None means auto-detect
    pub language: Option<String>,

    /// Timeout for one transcription run (seconds)
    pub timeout: u64,

    /// Enable GPU acceleration when the backend supports it
    pub use_gpu: bool,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Candidate count for the Python backend's best-of search
    pub best_of: u32,

    /// Beam size for the Python backend's beam search
    pub beam_size: u32,

    /// Output formats to write per transcribed file
    pub output_formats: Vec<OutputFormat>,

    /// Skip files whose .srt output already exists
    pub skip_existing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Srt,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for generated files; None writes next to each input
    pub output_dir: Option<PathBuf>,

    /// Write a JSON batch report after transcription runs
    pub save_report: bool,

    /// Log level used when no -v flag or RUST_LOG override is given
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent transcription workers.
    /// The model saturates all cores on its own; values above 1 only pay
    /// off for batches of short clips.
    pub max_workers: usize,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "subtext.toml",
            "config/subtext.toml",
            "~/.config/subtext/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Apply SUBTEXT_* environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("SUBTEXT_MODEL") {
            self.transcription.model = model;
        }

        if let Ok(language) = std::env::var("SUBTEXT_LANGUAGE") {
            self.transcription.language = match language.to_lowercase().as_str() {
                "auto" | "" => None,
                _ => Some(language),
            };
        }

        if let Ok(workers) = std::env::var("SUBTEXT_WORKERS") {
            if let Ok(workers) = workers.parse() {
                self.performance.max_workers = workers;
            }
        }

        if let Ok(output_dir) = std::env::var("SUBTEXT_OUTPUT_DIR") {
            self.output.output_dir = Some(PathBuf::from(output_dir));
        }

        if let Ok(log_level) = std::env::var("SUBTEXT_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if !KNOWN_MODELS.contains(&self.transcription.model.as_str()) {
            return Err(anyhow!(
                "unknown model '{}' (expected one of: {})",
                self.transcription.model,
                KNOWN_MODELS.join(", ")
            ));
        }

        if self.transcription.timeout == 0 {
            return Err(anyhow!("transcription timeout must be greater than 0"));
        }

        if self.media.supported_extensions.is_empty() {
            return Err(anyhow!("supported_extensions must not be empty"));
        }

        if self.cleaning.subtitle_extensions.is_empty() {
            return Err(anyhow!("subtitle_extensions must not be empty"));
        }

        if self.transcription.output_formats.is_empty() {
            return Err(anyhow!("output_formats must not be empty"));
        }

        if self.performance.max_workers > num_cpus::get() * 2 {
            tracing::warn!(
                "max_workers ({}) far exceeds available cores ({})",
                self.performance.max_workers,
                num_cpus::get()
            );
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Subtext configuration:\n\
            - Model: {}\n\
            - Language: {}\n\
            - Workers: {}\n\
            - Output dir: {}\n\
            - Media extensions: {}\n\
            - Subtitle extensions: {}",
            self.transcription.model,
            self.transcription.language.as_deref().unwrap_or("auto"),
            self.performance.max_workers,
            self.output
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(next to input)".to_string()),
            self.media.supported_extensions.join(", "),
            self.cleaning.subtitle_extensions.join(", "),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleaning: CleaningConfig {
                subtitle_extensions: vec!["srt".to_string()],
                recursive: false,
            },
            media: MediaConfig {
                supported_extensions: vec![
                    "mp4".to_string(),
                    "mp3".to_string(),
                    "wav".to_string(),
                    "mkv".to_string(),
                    "mov".to_string(),
                    "flv".to_string(),
                    "m4a".to_string(),
                    "webm".to_string(),
                ],
                recursive: false,
            },
            transcription: TranscriptionConfig {
                model: "small".to_string(),
                model_path: None,
                language: None,
                timeout: 3600, // large files on CPU take a while
                use_gpu: false,
                temperature: 0.0,
                best_of: 3,
                beam_size: 5,
                output_formats: vec![OutputFormat::Srt],
                skip_existing: false,
            },
            output: OutputConfig {
                output_dir: None,
                save_report: false,
                log_level: "info".to_string(),
            },
            performance: PerformanceConfig { max_workers: 1 },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription.model = model.into();
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.config.transcription.language = language;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.output_dir = Some(dir);
        self
    }

    pub fn with_output_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.config.transcription.output_formats = formats;
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.config.transcription.skip_existing = skip;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
