// src/main.rs

// Modules defined in the crate
mod config;
mod constants;
mod error;
mod feed;
mod scheduler;
mod sink;
mod types;

// Specific imports
use crate::config::{CommandLineInput, SyncConfig};
use crate::feed::FeedHttpClient;
use crate::scheduler::Controller;
use crate::sink::MemoryStore;
use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::fs;
use std::sync::Arc;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file_path = std::env::temp_dir().join("syncnode.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose)?;

    let config = SyncConfig::resolve(cli)?;
    log::info!(
        "Harvesting {} on {} via {} ({} workers, retry {:?}, tail tick {:?})",
        config.dataset,
        config.chain,
        config.base_url,
        config.workers,
        config.retry_delay,
        config.tail_interval,
    );
    if let Some(contract) = &config.contract {
        log::info!("Scoped to contract {}", contract);
    }

    let feed = Arc::new(FeedHttpClient::new(config.base_url.clone(), &config.api_key)?);
    let sink = Arc::new(MemoryStore::new());

    let controller = Controller::new(config, feed, sink);
    controller.run().await?;

    Ok(())
}
