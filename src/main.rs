//! NFT transaction orchestrator demo runner
//!
//! Runs a launch followed by a mint batch against the in-memory simulated
//! backend and prints the resulting timelines.

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use nft_orchestrator::endpoints;
use nft_orchestrator::simulation::{SimulatedBackend, SimulationProfile};
use nft_orchestrator::timeline::{LineStatus, Timeline};
use nft_orchestrator::{ActionKey, ActionKind, ActionOrchestrator, Config, OrchestratorEvent, TxParams};
use nonempty::NonEmpty;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Operating mode (only simulation is supported)
    #[arg(short, long, default_value = "simulation")]
    mode: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Multiply every poll interval and budget by this factor
    #[arg(long, default_value = "0.01")]
    time_scale: f64,

    /// Number of NFTs minted in the second batch
    #[arg(long, default_value = "3")]
    mints: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    info!("🚀 Starting NFT transaction orchestrator");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    if args.mode != "simulation" {
        warn!("Unknown mode '{}', defaulting to simulation", args.mode);
    }
    if args.time_scale <= 0.0 {
        anyhow::bail!("--time-scale must be positive");
    }
    config.polling = config.polling.scaled(args.time_scale);
    config.timeline.tick_ms = ((config.timeline.tick_ms as f64) * args.time_scale).round().max(1.0) as u64;

    if config.monitoring.enable_metrics {
        let port = config.monitoring.metrics_port;
        info!("📊 Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let profile = SimulationProfile {
        chain_id: config.api.chain_id.clone(),
        ..SimulationProfile::default()
    };
    let sender = profile.address.clone();
    let backend = Arc::new(SimulatedBackend::new(profile));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let orchestrator = ActionOrchestrator::new(backend.clone(), backend.clone(), backend, config)
        .with_events(event_tx);

    let events = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                OrchestratorEvent::PipelineFailed { group_id, error, .. } => {
                    warn!(group_id = %group_id, "Pipeline failed: {}", error.user_message());
                }
                OrchestratorEvent::Celebrate { key } => info!("🎉 {} completed", key),
                other => tracing::debug!(?other, "Orchestrator event"),
            }
        }
    });

    let demo = async {
        let collection = "B62qdemocollection".to_string();
        let launch_key = ActionKey::new(collection.clone(), None, ActionKind::Launch);
        let report = orchestrator
            .submit(
                launch_key,
                TxParams::Launch {
                    sender: sender.clone(),
                    collection_name: "Demo Collection".to_string(),
                    symbol: "DEMO".to_string(),
                    collection_address: Some(collection.clone()),
                    metadata_url: None,
                },
            )
            .await?;
        print_timeline(&report.timeline);
        info!("Launch batch: {:?} ({})", report.outcome, report.statistics);

        let mint = |index: usize| TxParams::Mint {
            sender: sender.clone(),
            collection_address: collection.clone(),
            nft_name: format!("Demo #{}", index),
            nft_address: None,
            price: None,
        };
        let batch = NonEmpty::from((mint(1), (2..=args.mints.max(1)).map(mint).collect::<Vec<_>>()));

        let mint_key = ActionKey::new(collection, None, ActionKind::Mint);
        let report = orchestrator.submit_batch(mint_key, batch).await?;
        print_timeline(&report.timeline);
        info!("Mint batch: {:?} ({})", report.outcome, report.statistics);
        if !report.is_success() {
            let failures = report
                .errors()
                .map(|(group_id, err)| format!("{}: {}", group_id, err))
                .join("; ");
            warn!(failures = %failures, "Some transactions failed");
        }
        Ok::<_, nft_orchestrator::OrchestratorError>(())
    };

    tokio::select! {
        result = demo => {
            result.context("Demo batch failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    // Pipelines interrupted by ctrl-c may still hold event senders
    events.abort();
    info!("👋 Shutting down gracefully...");
    Ok(())
}

fn print_timeline(timeline: &Timeline) {
    for group in timeline.groups() {
        let title = match group.status {
            LineStatus::Success => &group.success_title,
            LineStatus::Error => &group.error_title,
            LineStatus::Waiting => &group.title,
        };
        println!("{} {}", group.status.icon(), title);
        for line in &group.lines {
            println!("   {} {:<18} {}", line.status.icon(), line.line_id, line.content);
        }
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "nft_orchestrator=debug,info"
    } else {
        "nft_orchestrator=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
