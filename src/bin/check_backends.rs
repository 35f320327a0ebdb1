use anyhow::Result;
use subtext::config::KNOWN_MODELS;
use subtext::{Config, WhisperTranscriber};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("check_backends=info,subtext=info")
        .init();

    info!("🔍 Checking Whisper backend availability...");
    match WhisperTranscriber::check_availability().await {
        Ok(backend_info) => {
            info!("✅ {}", backend_info);
        }
        Err(e) => {
            info!("❌ {}", e);
        }
    }

    for tool in ["ffmpeg", "ffprobe"] {
        let available = tokio::process::Command::new(tool)
            .arg("-version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);

        if available {
            info!("✅ {} is ready", tool);
        } else {
            info!("⚠️  {} not found in PATH (media probing needs it)", tool);
        }
    }

    let config = Config::default();
    let transcriber = WhisperTranscriber::new(config.transcription.clone());
    info!(
        "🎤 Transcriber initialized with model: {}",
        transcriber.model()
    );

    info!("📋 Known models:");
    for model in KNOWN_MODELS {
        info!("   - {}", model);
    }

    Ok(())
}
