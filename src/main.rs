//! Diagnostics CLI for the plugin's resilience core.
//!
//! ```text
//! plugin-diag hash <PATH>...          fingerprint files
//! plugin-diag log <MESSAGE>           append one record to the daily log
//! plugin-diag fetch <URL>             GET a URL through the retry executor
//! plugin-diag check-config <PATH>     load and validate a config file
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use plugin_resilience::config::{load_config, CoreConfig};
use plugin_resilience::fingerprint::compute_hash_async;
use plugin_resilience::observability::{correlation, init_tracing, FileLogger, Level};
use plugin_resilience::{CorrelationToken, RetryExecutor};

#[derive(Parser)]
#[command(name = "plugin-diag")]
#[command(about = "Diagnostics for the plugin resilience core", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint one or more files (SHA-256)
    Hash {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print a JSON array instead of `digest  path` lines
        #[arg(long)]
        json: bool,
    },
    /// Append a record to the daily log file
    Log {
        /// Log directory (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Correlation token to tag the record with
        #[arg(long)]
        run: Option<String>,

        /// Write at ERROR instead of INFO
        #[arg(long)]
        error: bool,

        message: Option<String>,
    },
    /// GET a URL through the retry executor, logging the outcome
    Fetch {
        url: String,

        #[arg(long)]
        attempts: Option<u32>,

        #[arg(long)]
        delay_ms: Option<u64>,

        /// Log directory (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Load and validate a configuration file
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };
    init_tracing(&config.observability)?;

    match cli.command {
        Commands::Hash { paths, json } => {
            let mut results = Vec::with_capacity(paths.len());
            for path in paths {
                let digest = compute_hash_async(path.clone()).await?;
                results.push((path, digest));
            }

            if json {
                let entries: Vec<_> = results
                    .iter()
                    .map(|(path, digest)| json!({ "path": path.display().to_string(), "sha256": digest }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for (path, digest) in &results {
                    println!("{}  {}", digest, path.display());
                }
            }
        }
        Commands::Log {
            dir,
            run,
            error,
            message,
        } => {
            let logger = FileLogger::new(dir.unwrap_or(config.logging.directory))?;
            let level = if error { Level::Error } else { Level::Info };
            correlation::sync_scope(run.map(CorrelationToken::from), || {
                logger.log(level, message.unwrap_or_default())
            })?;
        }
        Commands::Fetch {
            url,
            attempts,
            delay_ms,
            dir,
        } => {
            let mut retries = config.retries.clone();
            if let Some(attempts) = attempts {
                retries.max_attempts = attempts;
            }
            if let Some(delay_ms) = delay_ms {
                retries.delay_ms = delay_ms;
            }

            let executor = RetryExecutor::from_config(&retries)?;
            let logger = FileLogger::new(dir.unwrap_or(config.logging.directory))?;

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl+C received, cancelling fetch");
                    on_ctrl_c.cancel();
                }
            });

            let run = CorrelationToken::generate();
            tracing::info!(run = %run, url = %url, "Fetch starting");
            correlation::scope(Some(run), fetch(&executor, &logger, &url, &cancel)).await?;
        }
        Commands::CheckConfig { path } => {
            let checked = load_config(&path)?;
            println!("{}", serde_json::to_string_pretty(&checked)?);
        }
    }

    Ok(())
}

async fn fetch(
    executor: &RetryExecutor,
    logger: &FileLogger,
    url: &str,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    logger.info(format!("fetch {} started", url))?;

    let mut attempts = 0u32;
    let result = executor
        .execute(
            |_attempt_token| {
                attempts += 1;
                let request = client.get(url);
                async move { request.send().await?.error_for_status()?.text().await }
            },
            cancel,
        )
        .await;

    match result {
        Ok(body) => {
            logger.info(format!(
                "fetch {} succeeded after {} attempt(s), {} bytes",
                url,
                attempts,
                body.len()
            ))?;
            println!("{} OK ({} bytes, {} attempt(s))", url, body.len(), attempts);
            Ok(())
        }
        Err(e) => {
            logger.error(format!("fetch {} failed after {} attempt(s): {}", url, attempts, e))?;
            Err(e.into())
        }
    }
}
