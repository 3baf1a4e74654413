//! Serves a metric store filled with synthetic traffic, for trying out
//! check configurations against a live endpoint.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tally_metrics::{http, MetricContext};
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tally-demo", about = "Serve synthetic metrics over HTTP")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:12345")]
    listen: SocketAddr,

    /// Milliseconds between synthetic updates
    #[arg(long, default_value_t = 500)]
    step_ms: u64,
}

/// One tick of fake traffic. Latency follows a slow wave so checks flip
/// between their branches every minute or so.
fn simulate(context: &MetricContext, tick: u64) -> tally_metrics::error::Result<()> {
    let phase = (tick as f64 / 60.0).sin();
    let latency = 150.0 + 100.0 * phase;

    context.increment_counter("demo.requests", 10 + tick % 7)?;
    context.set_gauge("demo.latency_ms", latency)?;
    context.observe("demo.request_ms", latency + (tick % 13) as f64)?;
    if tick % 10 == 0 {
        context.increment_basic("demo.restarts", 1)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tally=info".parse()?))
        .init();

    let args = Args::parse();
    let context = Arc::new(MetricContext::new("demo"));

    let producer = context.clone();
    let step = Duration::from_millis(args.step_ms.max(1));
    tokio::spawn(async move {
        let mut tick = interval(step);
        for n in 0u64.. {
            tick.tick().await;
            if let Err(e) = simulate(&producer, n) {
                tracing::error!(error = %e, "Synthetic update failed");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(listen = %args.listen, path = http::METRICS_PATH, "tally-demo serving");
    axum::serve(listener, http::router(context))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully");
        })
        .await?;
    Ok(())
}
