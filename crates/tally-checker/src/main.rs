mod cli;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::Args;
use std::future::Future;
use std::io::Write;
use tally_check::{
    format, CheckConfig, CheckEngine, CheckResult, HttpSource, OutputFormat, SnapshotSource,
};
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

fn print_results(output: OutputFormat, results: &[CheckResult]) -> Result<()> {
    let rendered = format::render(output, results, Utc::now())?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

async fn run_once(
    engine: &CheckEngine,
    source: &dyn SnapshotSource,
    output: OutputFormat,
) -> Result<()> {
    let results = engine
        .run_cycle(source)
        .await
        .with_context(|| format!("check cycle against {} failed", source.describe()))?;
    print_results(output, &results)
}

/// Runs a cycle every `period` until `shutdown` resolves. The first failed
/// cycle ends the loop with its error.
async fn run_every(
    engine: &CheckEngine,
    source: &dyn SnapshotSource,
    output: OutputFormat,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => run_once(engine, source, output).await?,
            () = &mut shutdown => {
                tracing::info!("Shutting down gracefully");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("tally=info".parse()?))
        .init();

    let args = Args::parse();
    let config = CheckConfig::load(&args.cnf)?;
    let transport = args.transport(&config.transport);

    let engine = CheckEngine::new(&config);
    let source = HttpSource::new(&transport.address, transport.timeout, transport.allow_nan)?;
    tracing::info!(
        checks = engine.len(),
        invalid = engine.invalid_sections().count(),
        endpoint = %source.url(),
        step_secs = args.step,
        "tally-checker starting"
    );

    if args.step == 0 {
        return run_once(&engine, &source, args.format).await;
    }

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    run_every(
        &engine,
        &source,
        args.format,
        Duration::from_secs(args.step),
        shutdown,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_check::{CheckError, Origin};
    use tally_metrics::Snapshot;

    /// Serves `healthy` good snapshots, then times out.
    struct Flaky {
        healthy: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for Flaky {
        async fn acquire(&self) -> tally_check::error::Result<Snapshot> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.healthy {
                Ok(Snapshot::new(Vec::new()))
            } else {
                Err(CheckError::Timeout(Duration::from_secs(1)))
            }
        }

        fn origin(&self) -> Origin {
            Origin::Remote
        }

        fn describe(&self) -> String {
            "flaky peer".to_string()
        }
    }

    fn engine() -> CheckEngine {
        CheckEngine::new(&CheckConfig::default())
    }

    #[tokio::test]
    async fn failed_cycle_ends_the_interval_loop() {
        let source = Flaky {
            healthy: 2,
            calls: AtomicUsize::new(0),
        };
        let err = run_every(
            &engine(),
            &source,
            OutputFormat::Text,
            Duration::from_millis(5),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err.downcast_ref::<CheckError>(),
            Some(CheckError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_a_healthy_loop() {
        let source = Flaky {
            healthy: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        let result = run_every(
            &engine(),
            &source,
            OutputFormat::Text,
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

        assert!(result.is_ok());
        assert!(source.calls.load(Ordering::SeqCst) >= 1);
    }
}
