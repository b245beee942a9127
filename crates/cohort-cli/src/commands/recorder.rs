use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;

use cohort_config::CohortConfig;
use cohort_core::events::ALL_TOPICS;
use cohort_recorder::{
    Mapper, MemoryTabularLog, RunStats, SheetsClient, Subscriber, TabularLog, bootstrap,
};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RecorderArgs;
use crate::context::connect_broker;
use crate::output::output;

fn open_log(args: &RecorderArgs, config: &CohortConfig) -> anyhow::Result<Arc<dyn TabularLog>> {
    if args.dry_run {
        tracing::info!("dry run: recording into memory");
        return Ok(Arc::new(MemoryTabularLog::new()));
    }
    let client = SheetsClient::new(&config.sheets).context("failed to create sheets client")?;
    Ok(Arc::new(client))
}

/// Run the recorder until `shutdown` flips to `true`.
pub async fn run(
    args: &RecorderArgs,
    config: &CohortConfig,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<RunStats> {
    let log = open_log(args, config)?;
    if bootstrap(log.as_ref()).await.context("failed to bootstrap spreadsheet")? {
        tracing::info!("spreadsheet bootstrapped");
    }

    let broker = connect_broker(&config.broker).await?;
    let subscription = broker
        .subscribe(ALL_TOPICS)
        .await
        .context("failed to subscribe to event topics")?;

    let subscriber = Subscriber::new(Mapper::standard(log))
        .with_handler_timeout(Duration::from_secs(args.handler_timeout_secs));
    Ok(subscriber.run(subscription, shutdown).await)
}

pub async fn handle(
    args: &RecorderArgs,
    config: &CohortConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received Ctrl+C, stopping recorder"),
            Err(error) => tracing::error!(%error, "failed to listen for Ctrl+C; stopping recorder"),
        }
        let _ = shutdown_tx.send(true);
    });

    let stats = run(args, config, shutdown_rx).await?;
    output(&stats, flags.format)
}
