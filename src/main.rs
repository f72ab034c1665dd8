//! Event demux service.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                   EVENT DEMUX                     │
//!   Webhook relay        │  ┌─────────┐    ┌──────────┐    ┌────────────┐    │
//!   ─────────────────────┼─▶│ ingress │───▶│ envelope │───▶│  dispatch  │────┼──▶ Destinations
//!                        │  │ server  │    │ validate │    │            │    │
//!                        │  └─────────┘    └──────────┘    └─────┬──────┘    │
//!                        │                                       │ resolve   │
//!                        │                                       ▼           │
//!   demux.toml           │  ┌─────────┐    ┌──────────┐    ┌────────────┐    │
//!   ─────────────────────┼─▶│ watcher │───▶│ snapshot │◀───│  routing   │    │
//!                        │  │ (notify)│    │ (source) │poll│   agent    │    │
//!                        │  └─────────┘    └──────────┘    └────────────┘    │
//!                        └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use event_demux::config::FileConfigSource;
use event_demux::dispatch::Dispatcher;
use event_demux::ingress::IngressServer;
use event_demux::lifecycle::{wait_for_signal, Shutdown};
use event_demux::observability::{logging, metrics};
use event_demux::routing::RoutingAgent;

#[derive(Parser)]
#[command(name = "event-demux")]
#[command(about = "Routes inbound webhook events to destinations from hot-reloadable rules")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "demux.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (source, loaded) = FileConfigSource::open(&args.config)?;
    let config = loaded.config;

    logging::init_logging(&config.observability)?;
    tracing::info!(
        path = ?args.config,
        version = %loaded.version,
        rules = config.demux.rules.len(),
        "event-demux starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let watcher = source.watch()?;

    let agent = Arc::new(RoutingAgent::new(
        Arc::new(source),
        Duration::from_secs(config.demux.reload_interval_secs),
    ));
    agent.start();

    let dispatcher = Dispatcher::new(agent, &config.dispatch)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new(
        dispatcher.clone(),
        Duration::from_secs(config.dispatch.drain_timeout_secs),
    )
    .with_watcher(watcher);
    let server = IngressServer::new(config.listener.clone(), dispatcher);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let server_exited = tokio::select! {
        _ = wait_for_signal() => false,
        res = &mut server_task => {
            match res {
                Ok(Ok(())) => tracing::warn!("Webhook ingress exited unexpectedly"),
                Ok(Err(e)) => tracing::error!(error = %e, "Webhook ingress failed"),
                Err(e) => tracing::error!(error = %e, "Webhook ingress task panicked"),
            }
            true
        }
    };

    let ingress = (!server_exited).then_some(server_task);
    let report = shutdown.run(ingress).await;
    tracing::info!(drained = report.drained, "Shutdown complete");
    Ok(())
}
