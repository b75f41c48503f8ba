// src/config.rs
use crate::constants::{RETRY_DELAY_MILLIS, TAIL_INTERVAL_MILLIS};
use crate::error::{AppError, Result};
use crate::types::{ApiKey, Chain, Dataset};
use clap::Parser;
use std::time::Duration;

/// Parsed and validated command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// Chain whose feed deployment to harvest
    #[arg(long, value_enum, default_value_t = Chain::Mainnet)]
    pub chain: Chain,

    /// Dataset to ingest
    #[arg(long, value_enum, default_value_t = Dataset::Sales)]
    pub dataset: Dataset,

    /// Restrict harvesting to a single contract
    #[arg(long)]
    pub contract: Option<String>,

    /// Number of concurrent backfill workers (default: auto, max 32)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override the chain's feed base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Resolved harvester configuration — validated and ready to drive a run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_key: ApiKey,
    pub chain: Chain,
    pub dataset: Dataset,
    pub contract: Option<String>,
    pub workers: usize,
    pub base_url: String,
    /// Pause before retrying an application-level failure.
    pub retry_delay: Duration,
    /// Pause between tail-loop iterations.
    pub tail_interval: Duration,
    pub verbose: bool,
}

impl SyncConfig {
    /// Resolves a complete configuration from CLI input and environment.
    pub fn resolve(cli: CommandLineInput) -> Result<Self> {
        let api_key_str = std::env::var("SYNC_API_KEY").map_err(|_| {
            AppError::MissingConfiguration("SYNC_API_KEY environment variable not set".to_string())
        })?;
        let api_key = ApiKey::new(api_key_str)?;

        // Workers are async tasks waiting on network I/O, not CPU-bound;
        // running more than the core count is safe and beneficial.
        let workers = cli
            .workers
            .unwrap_or_else(|| num_cpus::get().clamp(4, 24))
            .clamp(1, 32);

        let base_url = cli
            .base_url
            .unwrap_or_else(|| cli.chain.base_url().to_string());

        Ok(SyncConfig {
            api_key,
            chain: cli.chain,
            dataset: cli.dataset,
            contract: cli.contract,
            workers,
            base_url,
            retry_delay: Duration::from_millis(RETRY_DELAY_MILLIS),
            tail_interval: Duration::from_millis(TAIL_INTERVAL_MILLIS),
            verbose: cli.verbose,
        })
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::new("demo-key-for-testing-only")
                .expect("Default API key should be valid"),
            chain: Chain::Mainnet,
            dataset: Dataset::Sales,
            contract: None,
            workers: 4,
            base_url: Chain::Mainnet.base_url().to_string(),
            retry_delay: Duration::from_millis(RETRY_DELAY_MILLIS),
            tail_interval: Duration::from_millis(TAIL_INTERVAL_MILLIS),
            verbose: false,
        }
    }
}
