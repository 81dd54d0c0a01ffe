use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use feedmill::app::{self, RunOptions};
use feedmill::config::Config;
use feedmill::metrics::{server, Metrics};

pub async fn run(config: Config, once: bool) -> Result<()> {
    let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);
    let storage = app::open_storage(&config.storage)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_server = match &config.metrics.listen {
        Some(listen) => {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("Invalid metrics listen address: {listen}"))?;
            let metrics = Arc::clone(&metrics);
            let shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server::serve(addr, metrics, shutdown).await {
                    tracing::error!(error = %e, "Metrics server failed");
                }
            }))
        }
        None => None,
    };

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                let _ = signal_tx.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to wait for Ctrl+C: {}", e);
            }
        }
    });

    let report = app::run(
        &config,
        storage,
        Arc::clone(&metrics),
        RunOptions { once },
        shutdown_rx,
    )
    .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = metrics_server {
        let _ = handle.await;
    }

    println!();
    println!("Run Summary");
    println!("===========");
    for walk in &report.walks {
        println!(
            "  {:<28} pages: {:>5}  entries: {:>6}  failures: {:>4}  stop: {}",
            walk.source,
            walk.pages,
            walk.entries,
            walk.failures,
            walk.stop.as_str()
        );
    }
    println!();
    println!("  Created:   {}", report.stats.created);
    println!("  Updated:   {}", report.stats.updated);
    println!("  Unchanged: {}", report.stats.unchanged);
    println!("  Failed:    {}", report.stats.failed);

    Ok(())
}
