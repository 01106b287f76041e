#![doc = include_str!("../README.md")]

mod runner;

use clap::Parser;
use runner::{
    config::CliArgs,
    signal::shutdown_signal,
    store::MeteredStore,
    telemetry::{self, init_telemetry, shutdown_telemetry},
};
use sluice::{Pipeline, PipelineConfig, StdoutStore};
use std::{process::ExitCode, time::Instant};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = PipelineConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let upstream = CancellationToken::new();
    let watcher = tokio::spawn({
        let upstream = upstream.clone();
        async move {
            if let Err(_e) = shutdown_signal(upstream).await {
                #[cfg(feature = "tracing")]
                tracing::error!("Signal watcher failed: {_e:#}");
            }
        }
    });

    let pipeline = Pipeline::from_config(config, MeteredStore::new(StdoutStore), &upstream)?;

    let started = Instant::now();
    let outcome = pipeline.run().await;
    telemetry::record_pipeline_run(&outcome, started.elapsed().as_secs_f64() * 1000.0);

    watcher.abort();
    println!("{outcome}");

    shutdown_telemetry(providers);

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn log_startup_info(_config: &PipelineConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting pipeline with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting pipeline over {} items", _config.items.len());
    }
}
