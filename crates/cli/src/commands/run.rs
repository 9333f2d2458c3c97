//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::ReaderBlueprint;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Reader, ReaderConfig};

/// Execute the `run` command
pub async fn run_reader(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())?;

    apply_overrides(&mut blueprint, args);

    // Overrides bypass the file-level validation
    config_loader::ConfigLoader::validate(&blueprint)
        .map_err(|e| CliError::config_validation(e.to_string()))?;

    info!(
        broker = %blueprint.broker.address,
        prefix = %blueprint.topics.prefix,
        subscription = %blueprint.topics.subscription_filter(),
        capacity = blueprint.store.capacity,
        mock = args.mock,
        "Configuration loaded"
    );

    let reader_config = ReaderConfig {
        blueprint,
        mock: args.mock,
        max_polls: (args.max_polls > 0).then_some(args.max_polls),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        json: args.json,
    };

    let summary = Reader::new(reader_config)
        .run(shutdown_signal())
        .await
        .context("Reader execution failed")?;

    if args.json {
        info!(
            messages_received = summary.messages_received,
            readings_stored = summary.readings_stored,
            decode_errors = summary.decode_errors,
            unknown_topics = summary.unknown_topics,
            queue_dropped = summary.queue_dropped,
            "Run summary"
        );
    } else {
        println!("\n{summary}");
    }

    info!("Sense Reader finished");
    Ok(())
}

/// Apply CLI overrides on top of the loaded blueprint
fn apply_overrides(blueprint: &mut ReaderBlueprint, args: &RunArgs) {
    if let Some(ref broker) = args.broker {
        info!(broker = %broker, "Overriding broker address from CLI");
        blueprint.broker.address = broker.clone();
    }
    if let Some(capacity) = args.capacity {
        info!(capacity, "Overriding history length from CLI");
        blueprint.store.capacity = capacity;
        blueprint.store.capacities.clear();
    }
    if let Some(poll_ms) = args.poll_interval_ms {
        blueprint.dashboard.poll_interval_ms = poll_ms;
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
