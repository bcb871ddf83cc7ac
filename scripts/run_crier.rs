use std::sync::Arc;

use clap::Parser;
use crier_adaptor_discord::start_discord;
use crier_core::CrierConfig;
use crier_provider_tts::CoquiEngine;
use crier_storage_sql::SqliteProfileStore;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "CRIER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async move {
        let cli = Cli::parse();
        let _ = dotenv();
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
            )
            .init();

        let config = Arc::new(CrierConfig::from_env()?);
        info!(
            voices_dir = %config.voices_dir.display(),
            tts_endpoint = %config.tts_endpoint,
            "starting crier"
        );

        let store = SqliteProfileStore::connect(&config.database_url).await?;
        let engine = CoquiEngine::new(&config.tts_endpoint, config.synthesis_timeout)?;
        if !engine.health_check().await {
            warn!(endpoint = %config.tts_endpoint, "TTS server is not responding (yet?)");
        }

        let bot = start_discord(config, Arc::new(store), Arc::new(engine)).await?;
        info!("crier is running; press ctrl-c to stop");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
            _ = bot.quit.notified() => info!("quit command received, shutting down"),
        }
        bot.sessions.shutdown_all().await;
        Ok(())
    })
}
