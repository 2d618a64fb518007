use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use rs_block_enricher::{
    chains::evm::{client::EvmClient, metadata::MetadataClient},
    cli::{Cli, Commands},
    config::AppConfig,
    pipeline::{
        emitter::TracingSink,
        enricher::BlockEnricher,
        run_pipeline,
        tracker::{ChainHeadTracker, TrackerConfig},
    },
    utils::{
        logger::init_logger,
        metrics::{NoopPipelineMetrics, PipelineMetrics, PrometheusPipelineMetrics},
    },
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

fn init_metrics(cfg: &AppConfig) -> Arc<dyn PipelineMetrics> {
    if !cfg.metrics.enable {
        return Arc::new(NoopPipelineMetrics::new());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.metrics.prometheus_exporter_port));
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            info!(%addr, "📈 Prometheus exporter listening");
            Arc::new(PrometheusPipelineMetrics::new(cfg.pipeline.chain_name.clone()))
        }
        Err(e) => {
            warn!("⚠️ Failed to start metrics exporter: {}. Continuing without metrics.", e);
            Arc::new(NoopPipelineMetrics::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let cfg = AppConfig::load(&args.config)?;

    // Initialize logger system
    init_logger(&cfg.logging);

    info!("✅ Configuration load successful");
    info!(chain_name = %cfg.pipeline.chain_name, "Chain name");
    info!(start_height = ?cfg.pipeline.start_height, "Start height");
    info!(rpc_url = %cfg.rpc.url, "RPC node");
    info!(metadata_url = %cfg.metadata.url, "Block metadata service");
    info!(
        queue_capacity = cfg.pipeline.queue_capacity,
        poll_interval_secs = cfg.pipeline.poll_interval_secs,
        not_ready_retry_secs = cfg.pipeline.not_ready_retry_secs,
        max_not_ready_retries = ?cfg.pipeline.max_not_ready_retries,
        "Pipeline settings"
    );

    if args.command == Some(Commands::CheckConfig) {
        info!("✨ Configuration is valid");
        return Ok(());
    }

    let metrics = init_metrics(&cfg);

    let client = Arc::new(EvmClient::new(&cfg.rpc.url, cfg.rpc.timeout())?);
    let metadata = Arc::new(MetadataClient::new(&cfg.metadata.url, cfg.metadata.timeout())?);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    // Spawn signal handler task for Ctrl+C
    let shutdown_tx_sigint = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        info!("📡 Received shutdown signal (Ctrl+C)");
        // Send shutdown signal (ignore error if receiver is dropped)
        let _ = shutdown_tx_sigint.send(());
    });

    // SIGTERM handler (Unix only)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_tx_sigterm = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                info!("📡 Received SIGTERM signal");
                let _ = shutdown_tx_sigterm.send(());
            }
        });
    }

    let tracker = ChainHeadTracker::new(
        Arc::clone(&client),
        TrackerConfig {
            start_height: cfg.pipeline.start_height,
            poll_interval: cfg.pipeline.poll_interval(),
            error_delay: cfg.pipeline.poll_error_delay(),
        },
        Arc::clone(&metrics),
    );
    let enricher = BlockEnricher::new(
        client,
        metadata,
        TracingSink,
        cfg.pipeline.retry_policy(),
        metrics,
    );

    info!("🚀 Starting block enricher...");
    info!("💡 Press Ctrl+C to stop gracefully");

    run_pipeline(tracker, enricher, cfg.pipeline.queue_capacity, shutdown_rx).await?;

    info!("✨ Enricher exited successfully");
    Ok(())
}
