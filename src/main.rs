use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livetv_tuners::{
    config::Config,
    tuners::{M3U_BACKEND_TYPE, TunerManager},
    utils::UrlUtils,
};

#[derive(Parser)]
#[command(name = "livetv-tuners")]
#[command(version)]
#[command(about = "Inspect live TV tuners: list channels, describe and probe streams")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the merged channel lineup of a backend
    Channels {
        #[arg(short, long, default_value = M3U_BACKEND_TYPE)]
        backend: String,
        /// Bypass the in-memory cache and refresh the cache files
        #[arg(long)]
        refresh: bool,
    },
    /// Describe a channel's media sources without opening a tuner
    Sources { channel_id: String },
    /// Open a channel's stream, read from it briefly and close it again
    Probe {
        channel_id: String,
        /// How long to read from a relayed stream
        #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
        duration: Duration,
    },
    /// Show the capacity of every configured tuner
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("livetv_tuners={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    info!(
        "Configuration loaded from {} ({} tuners)",
        cli.config,
        config.tuners.len()
    );

    let manager = TunerManager::from_config(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c_token.cancel();
        }
    });

    match cli.command {
        Command::Channels { backend, refresh } => {
            let channels = manager.list_channels(&backend, !refresh, &cancel).await?;
            for channel in &channels {
                println!(
                    "{}\t{}\t{}\t{}",
                    channel.id,
                    channel.number.as_deref().unwrap_or("-"),
                    channel.name,
                    channel.tuner_host_id
                );
            }
            info!("{} channels", channels.len());
        }
        Command::Sources { channel_id } => {
            let sources = manager.get_media_sources(&channel_id, &cancel).await?;
            if sources.is_empty() {
                warn!("No media sources for channel {}", channel_id);
            }
            for source in &sources {
                let mut printable = source.clone();
                printable.path = UrlUtils::obfuscate_credentials(&source.path);
                println!("{}", serde_json::to_string_pretty(&printable)?);
            }
        }
        Command::Probe {
            channel_id,
            duration,
        } => {
            let mut stream = manager
                .open_channel(&channel_id, None, &[], &cancel)
                .await?;
            println!(
                "opened {} on tuner {} ({})",
                stream.id(),
                stream.tuner_host_id(),
                stream.media_source().protocol
            );

            if let Some(mut receiver) = stream.subscribe() {
                let mut bytes = 0usize;
                let deadline = tokio::time::sleep(duration);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        _ = &mut deadline => break,
                        _ = cancel.cancelled() => break,
                        chunk = receiver.recv() => match chunk {
                            Ok(chunk) => bytes += chunk.len(),
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Probe lagged, {} chunks skipped", skipped);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
                println!("read {bytes} bytes in {}", humantime::format_duration(duration));
            }

            stream.close().await;
        }
        Command::Status => {
            for status in manager.tuner_statuses(&[]).await {
                println!(
                    "{}\t{}\t{}\t{}/{}",
                    status.tuner_id,
                    status.tuner_type,
                    status.name,
                    status.active_streams,
                    if status.tuner_count == 0 {
                        "unlimited".to_string()
                    } else {
                        status.tuner_count.to_string()
                    }
                );
            }
        }
    }

    Ok(())
}
