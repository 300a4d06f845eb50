//! CLI commands

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokenguard_alerts::MemoryTransport;
use tokenguard_core::{Action, ActionRequest};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::gateway::{Gateway, WsTransport};
use crate::ingest::{self, JsonlEventSource};

/// A request file holds either a full envelope or a bare action
#[derive(Deserialize)]
#[serde(untagged)]
enum RequestFile {
    Envelope(ActionRequest),
    Bare(Action),
}

/// Evaluate one request file and print the outcome
pub async fn evaluate(config: AppConfig, request_path: &Path) -> Result<(), anyhow::Error> {
    let ctx = AppContext::new(config, Arc::new(MemoryTransport::new()))?;

    let content = tokio::fs::read_to_string(request_path).await?;
    let request = match serde_json::from_str(&content)? {
        RequestFile::Envelope(request) => request,
        RequestFile::Bare(action) => ActionRequest::new(action),
    };

    let outcome = ctx.pipeline.process(&request).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Replay a JSONL file of transaction events through the pipeline
pub async fn replay(config: AppConfig, events_path: &Path) -> Result<(), anyhow::Error> {
    let ctx = AppContext::new(config, Arc::new(MemoryTransport::new()))?;

    let mut source = JsonlEventSource::open(events_path).await?;
    let stats = ingest::run(&mut source, ctx.pipeline.as_ref()).await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &AppConfig) -> Result<(), anyhow::Error> {
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

/// Run the alert gateway until Ctrl-C, optionally replaying events alongside
pub async fn serve(config: AppConfig, events_path: Option<&Path>) -> Result<(), anyhow::Error> {
    let transport = Arc::new(WsTransport::new());
    let bind = config.server.bind.clone();
    let ctx = AppContext::new(config, transport.clone())?;
    let hub = ctx.hub().clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = hub.spawn_sweeper(shutdown_rx.clone());
    let purger = ctx.pipeline.spawn_purger(ctx.config.server.purge_interval(), shutdown_rx.clone());

    let listener = TcpListener::bind(&bind).await?;
    let gateway = Arc::new(Gateway::new(hub.clone(), transport));
    let server = tokio::spawn(gateway.serve(listener, shutdown_rx));

    if let Some(path) = events_path {
        let mut source = JsonlEventSource::open(path).await?;
        let pipeline = ctx.pipeline.clone();
        tokio::spawn(async move {
            match ingest::run(&mut source, pipeline.as_ref()).await {
                Ok(stats) => info!(?stats, "Event replay finished"),
                Err(e) => error!(error = %e, "Event replay failed"),
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    let closed = hub.shutdown();
    server.await??;
    sweeper.await?;
    purger.await?;

    let stats = hub.stats();
    info!(closed, published = stats.published, delivered = stats.delivered, "Shutdown complete");
    Ok(())
}
