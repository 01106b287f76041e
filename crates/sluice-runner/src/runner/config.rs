use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use sluice::{Item, PipelineConfig, SentinelRule};

/// Runtime configuration for the `sluice-runner` binary.
///
/// Every value can be given as a CLI argument or an environment variable
/// (a `.env` file is loaded first). The defaults reproduce the reference run:
/// items `0..=9`, sentinel `6`, doubling.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sluice-runner",
    version,
    about = "Runs a source → transform → sink pipeline until it completes, fails or is interrupted"
)]
pub struct CliArgs {
    /// Items emitted by the source, in order, separated by commas.
    ///
    /// Environment variable: `ITEMS`
    #[arg(
        long,
        env = "ITEMS",
        value_delimiter = ',',
        allow_negative_numbers = true,
        default_values_t = PipelineConfig::default().items
    )]
    pub items: Vec<Item>,

    /// Value the transform stage rejects. Ignored with `--no-sentinel`.
    ///
    /// Environment variable: `SENTINEL`
    #[arg(
        long,
        env = "SENTINEL",
        allow_negative_numbers = true,
        default_value_t = SentinelRule::DEFAULT_SENTINEL
    )]
    pub sentinel: Item,

    /// Accept every item instead of rejecting the sentinel.
    ///
    /// Environment variable: `NO_SENTINEL`
    #[arg(long, env = "NO_SENTINEL", default_value_t = false)]
    pub no_sentinel: bool,

    /// Factor applied to every accepted item.
    ///
    /// Environment variable: `MULTIPLIER`
    #[arg(
        long,
        env = "MULTIPLIER",
        allow_negative_numbers = true,
        default_value_t = SentinelRule::DEFAULT_MULTIPLIER
    )]
    pub multiplier: Item,

    /// How long to wait for each stage to exit after cancellation, in
    /// milliseconds. Stages still running afterwards are aborted.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_MS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_MS", default_value_t = 3_000)]
    pub shutdown_timeout_ms: u64,
}

impl TryFrom<CliArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.shutdown_timeout_ms == 0 {
            bail!("SHUTDOWN_TIMEOUT_MS must be greater than 0");
        }

        let sentinel = (!args.no_sentinel).then_some(args.sentinel);
        let config = Self {
            items: args.items,
            rule: SentinelRule::new(sentinel, args.multiplier),
            shutdown_timeout: Duration::from_millis(args.shutdown_timeout_ms),
        };
        config.validate().context("invalid pipeline config")?;

        Ok(config)
    }
}
