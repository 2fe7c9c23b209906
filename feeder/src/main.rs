//! Batcher feeder.
//!
//! Drives a [`BatchQueue`] with a stream of synthetic events, logging every batch the handler
//! receives, then closes the queue and waits for the drain. Useful to watch capacity and idle
//! flushes interleave with live traffic.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use batcher::metrics::register_metrics;
use batcher::{BatchHandler, BatchQueue};
use batcher_config::shared::BatchConfig;
use batcher_telemetry::metrics::init_metrics_handle;
use batcher_telemetry::tracing::init_tracing;
use clap::Parser;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{FeederConfig, load_feeder_config};

mod config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maximum number of events per batch.
    #[arg(long, default_value = "5")]
    capacity: usize,

    /// Idle time in milliseconds after which a partial batch is flushed.
    #[arg(long, default_value = "2000")]
    interval_ms: u64,

    /// Number of events to submit.
    #[arg(long, default_value = "12")]
    events: usize,

    /// Pause in milliseconds between two events.
    #[arg(long, default_value = "300")]
    event_interval_ms: u64,

    /// Simulated processing time of a batch in milliseconds.
    #[arg(long, default_value = "500")]
    handler_delay_ms: u64,

    /// Load settings from `./configuration` instead of the flags above.
    #[arg(long)]
    from_config: bool,

    /// Load settings from this directory instead of the flags above.
    #[arg(long, conflicts_with = "from_config")]
    config_dir: Option<PathBuf>,

    /// Print the Prometheus metrics of the run before exiting.
    #[arg(long)]
    print_metrics: bool,
}

impl Args {
    fn feeder_config(&self) -> anyhow::Result<FeederConfig> {
        if self.from_config || self.config_dir.is_some() {
            return load_feeder_config(self.config_dir.as_deref());
        }

        let config = FeederConfig {
            batch: BatchConfig::new(self.capacity, Duration::from_millis(self.interval_ms)),
            events: self.events,
            event_interval_ms: self.event_interval_ms,
            handler_delay_ms: self.handler_delay_ms,
        };
        config.batch.validate()?;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    let args = Args::parse();
    let config = args.feeder_config()?;

    let metrics_handle = init_metrics_handle()?;
    register_metrics();

    run(config).await?;

    if args.print_metrics {
        println!("{}", metrics_handle.render());
    }

    Ok(())
}

async fn run(config: FeederConfig) -> anyhow::Result<()> {
    let handler_delay = config.handler_delay();
    let queue = BatchQueue::try_from_config(&config.batch, move |batch: Vec<String>| async move {
        info!(size = batch.len(), events = ?batch, "processing batch");
        sleep(handler_delay).await;
    })?;

    info!(
        capacity = queue.capacity(),
        interval_ms = config.batch.max_fill_ms,
        events = config.events,
        "feeding events"
    );

    tokio::select! {
        _ = feed(&queue, &config) => {
            info!("all events submitted");
        }
        _ = interrupted(tokio::signal::ctrl_c()) => {
            warn!("interrupted, closing the queue early");
        }
    }

    info!(pending = queue.pending(), "closing queue");
    queue.close().await;
    info!("shut down gracefully");

    Ok(())
}

/// Resolves once `signal` fires. Never resolves when the signal cannot be listened for.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(err) = signal.await {
        warn!(error = %err, "failed to listen for ctrl-c, feeding until done");
        std::future::pending::<()>().await;
    }
}

async fn feed<H>(queue: &BatchQueue<String, H>, config: &FeederConfig)
where
    H: BatchHandler<String>,
{
    for sequence in 1..=config.events {
        let event = format!("event-{sequence}");
        info!(%event, "submitting event");
        queue.push(event);

        sleep(config.event_interval()).await;
    }
}
