//! dirwatch - print filesystem changes as they happen

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use watcher::{NotifyCategory, OpenRetry, WatchConfig, WatchSession};

mod config;
mod output;

use config::FileConfig;

/// dirwatch - Watch directory trees and print typed change records
#[derive(Parser)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a single directory
    Watch {
        /// Directory to watch (created if missing)
        path: PathBuf,
        /// Only report names matching this glob (e.g. "*.xml")
        #[arg(short, long)]
        filter: Option<String>,
        /// Notification categories, comma separated (e.g. directory_name,last_write)
        #[arg(long, value_delimiter = ',')]
        notify: Vec<NotifyCategory>,
        /// Sleep between polls of an empty queue, in milliseconds
        #[arg(long, default_value = "100")]
        poll_ms: u64,
        /// Give up waiting on a locked new file after this many attempts
        #[arg(long, conflicts_with = "unbounded_open_retry")]
        open_retry_limit: Option<u32>,
        /// Wait on locked new files for as long as it takes
        #[arg(long)]
        unbounded_open_retry: bool,
        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Run every watch listed in a config file
    Run {
        /// TOML config file
        config: PathBuf,
        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print an example config file
    ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Watch {
            path,
            filter,
            notify,
            poll_ms,
            open_retry_limit,
            unbounded_open_retry,
            json,
        } => {
            let mut config = WatchConfig::new(path);
            config.filter = filter;
            if !notify.is_empty() {
                config = config.with_notify(notify);
            }
            if unbounded_open_retry {
                config = config.with_open_retry(OpenRetry::unbounded());
            } else if let Some(limit) = open_retry_limit {
                config.open_retry.max_attempts = Some(limit);
            }
            run_watches(vec![config], Duration::from_millis(poll_ms), json).await
        }
        Commands::Run { config, json } => {
            let file_config = FileConfig::load(&config)?;
            let poll_interval = file_config.consumer.poll_interval();
            run_watches(file_config.watches, poll_interval, json).await
        }
        Commands::ExampleConfig => {
            print!("{}", config::example_config());
            Ok(())
        }
    }
}

/// Run one consumer per watch until Ctrl-C
async fn run_watches(configs: Vec<WatchConfig>, poll_interval: Duration, json: bool) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumers = Vec::with_capacity(configs.len());

    for config in configs {
        let session = Arc::new(WatchSession::new(config));
        let handler = move |record: watcher::ChangeRecord| {
            if json {
                output::print_json(&record);
            } else {
                output::print_record(&record);
            }
        };
        consumers.push(tokio::spawn(watcher::drain(
            session,
            poll_interval,
            shutdown_rx.clone(),
            handler,
        )));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down {} watch(es)", consumers.len());
    shutdown_tx.send(true).ok();

    for consumer in consumers {
        let stats = consumer.await.context("Consumer task failed")?;
        info!(
            "Consumer finished: {} records, {} reopens",
            stats.processed, stats.reopened
        );
    }

    Ok(())
}

/// Install the tracing subscriber (stderr, plus an optional log file)
///
/// The returned guard must live as long as logging is needed.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "dirwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}
