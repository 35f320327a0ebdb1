use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use subtext::config::{Config, OutputFormat};
use subtext::processing::BatchProcessor;
use subtext::subtitle::clean::{discover_subtitles, SrtCleaner};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("subtext")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Subtitle toolkit: batch SRT cleanup and Whisper subtitle generation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("clean")
                .about("Strip SRT files down to plain dialogue text")
                .arg(
                    Arg::new("paths")
                        .value_name("PATH")
                        .num_args(1..)
                        .required(true)
                        .help("SRT files or directories to scan"),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Write .txt files here instead of next to each input"),
                )
                .arg(
                    Arg::new("recursive")
                        .short('r')
                        .long("recursive")
                        .help("Recurse into subdirectories")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("transcribe")
                .about("Generate SRT subtitles from media files with Whisper")
                .arg(
                    Arg::new("path")
                        .value_name("PATH")
                        .required(true)
                        .help("Media file or directory to transcribe"),
                )
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .value_name("MODEL")
                        .help("Model size (tiny, base, small, medium, large, turbo)"),
                )
                .arg(
                    Arg::new("language")
                        .short('l')
                        .long("language")
                        .value_name("LANG")
                        .help("Source language; omit or 'auto' to auto-detect"),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Write outputs here instead of next to each input"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("NUM")
                        .help("Number of parallel transcription workers"),
                )
                .arg(
                    Arg::new("txt")
                        .long("txt")
                        .help("Also write a plain-text transcript per file")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("skip-existing")
                        .long("skip-existing")
                        .help("Skip files whose .srt output already exists")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("recursive")
                        .short('r')
                        .long("recursive")
                        .help("Recurse into subdirectories")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .help("Write a JSON batch report next to the outputs")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");

    let mut config = Config::load().unwrap_or_else(|_| Config::default().with_env_overrides());

    let filter = if verbose {
        "subtext=debug,info".to_string()
    } else {
        format!("subtext={},warn", config.output.log_level)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match matches.subcommand() {
        Some(("clean", sub)) => {
            let paths: Vec<PathBuf> = sub
                .get_many::<String>("paths")
                .expect("paths are required")
                .map(PathBuf::from)
                .collect();

            if let Some(dir) = sub.get_one::<String>("output-dir") {
                config.output.output_dir = Some(PathBuf::from(dir));
            }
            if sub.get_flag("recursive") {
                config.cleaning.recursive = true;
            }

            config.validate()?;
            run_clean(&config, &paths)
        }
        Some(("transcribe", sub)) => {
            let input = PathBuf::from(sub.get_one::<String>("path").expect("path is required"));

            if let Some(model) = sub.get_one::<String>("model") {
                config.transcription.model = model.clone();
            }
            if let Some(language) = sub.get_one::<String>("language") {
                config.transcription.language = match language.to_lowercase().as_str() {
                    "auto" => None,
                    _ => Some(language.clone()),
                };
            }
            if let Some(dir) = sub.get_one::<String>("output-dir") {
                config.output.output_dir = Some(PathBuf::from(dir));
            }
            if let Some(workers) = sub.get_one::<String>("workers") {
                config.performance.max_workers = workers.parse()?;
            }
            if sub.get_flag("txt")
                && !config.transcription.output_formats.contains(&OutputFormat::Text)
            {
                config.transcription.output_formats.push(OutputFormat::Text);
            }
            if sub.get_flag("skip-existing") {
                config.transcription.skip_existing = true;
            }
            if sub.get_flag("recursive") {
                config.media.recursive = true;
            }
            if sub.get_flag("report") {
                config.output.save_report = true;
            }

            config.validate()?;
            run_transcribe(config, &input).await
        }
        _ => unreachable!("subcommand is required"),
    }
}

fn run_clean(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let files = discover_subtitles(
        paths,
        &config.cleaning.subtitle_extensions,
        config.cleaning.recursive,
    )?;

    if files.is_empty() {
        warn!("No subtitle files found");
        return Ok(());
    }

    info!("🧹 Found {} subtitle file(s) to clean", files.len());

    let cleaner = SrtCleaner::new();
    let summary = cleaner.clean_batch(&files, config.output.output_dir.as_deref());

    info!(
        "🎉 Cleanup completed in {:.2}s",
        summary.total_time.as_secs_f64()
    );
    info!("✅ Successful: {}", summary.successful);
    info!("❌ Failed: {}", summary.failed);
    info!(
        "📊 Success rate: {:.1}%",
        if summary.total > 0 {
            summary.successful as f64 / summary.total as f64 * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}

async fn run_transcribe(config: Config, input: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("input not found: {}", input.display());
    }

    info!("🚀 Subtext transcription starting...");
    info!("📁 Input: {}", input.display());
    debug!("{}", config.summary());

    if let Some(dir) = &config.output.output_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let processor = BatchProcessor::new(config)?;
    let result = processor.run(input).await?;

    info!(
        "🎉 Processing completed in {:.2}s",
        result.total_time.as_secs_f64()
    );
    info!("✅ Successful: {}", result.successful);
    if result.skipped > 0 {
        info!("⏭️  Skipped: {}", result.skipped);
    }
    info!("❌ Failed: {}", result.failed);
    info!(
        "📊 Success rate: {:.1}%",
        if result.total > 0 {
            result.successful as f64 / result.total as f64 * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}
