mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chanprobe_bitcoin::BitcoinLedger;
use chanprobe_core::{AveragingPolicy, Estimator};
use chanprobe_registry::HttpRegistry;
use clap::{Parser, ValueEnum};
use config::Settings;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "chanprobe",
    version,
    about = "Estimate the number of unannounced Lightning channels from on-chain closes"
)]
struct Cli {
    /// Path to a TOML settings file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides the Bitcoin Core RPC URL.
    #[arg(long, value_name = "URL")]
    rpc_url: Option<String>,

    /// Overrides the RPC user.
    #[arg(long, env = "CHANPROBE_RPC_USER", value_name = "USER")]
    rpc_user: Option<String>,

    /// Overrides the RPC password.
    #[arg(long, env = "CHANPROBE_RPC_PASSWORD", hide_env_values = true, value_name = "PASSWORD")]
    rpc_password: Option<String>,

    /// Overrides the registry search endpoint.
    #[arg(long, value_name = "URL")]
    registry_url: Option<String>,

    /// Overrides the number of trials.
    #[arg(long, value_name = "N")]
    trials: Option<usize>,

    /// Overrides the blocks walked per trial.
    #[arg(long, value_name = "BLOCKS")]
    window_size: Option<u64>,

    /// Overrides the earliest window start height.
    #[arg(long, value_name = "HEIGHT")]
    start_height: Option<u64>,

    /// Overrides the known public channel count.
    #[arg(long, value_name = "N")]
    known_public_channels: Option<u64>,

    /// Overrides the trials walked at the same time.
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Seed for the height sampler.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Overrides how ratio samples are averaged.
    #[arg(long, value_enum, value_name = "POLICY")]
    averaging: Option<Averaging>,

    /// Log filter, e.g. `debug` or `chanprobe_core=trace` (defaults to RUST_LOG, then `info`).
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Averaging {
    /// Divide by the trials that produced a sample.
    Sampled,
    /// Divide by the configured trial count.
    Fixed,
}

impl From<Averaging> for AveragingPolicy {
    fn from(value: Averaging) -> Self {
        match value {
            Averaging::Sampled => AveragingPolicy::SampledTrials,
            Averaging::Fixed => AveragingPolicy::FixedTrialCount,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let mut settings = Settings::load(cli.config.as_deref())?;
    apply_overrides(&mut settings, &cli);

    let seed = match settings.estimator.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random();
            info!(seed, "No seed configured, drew one");
            seed
        }
    };

    let ledger = BitcoinLedger::connect(settings.bitcoin.clone())
        .await
        .with_context(|| format!("cannot use Bitcoin node at {}", settings.bitcoin.rpc_url))?;
    let registry = HttpRegistry::new(settings.registry.clone())?;
    let estimator = Estimator::new(
        settings.estimator.clone(),
        Arc::new(ledger),
        Arc::new(registry),
    )?;

    let mut rng = StdRng::seed_from_u64(seed);
    let estimate = tokio::select! {
        result = estimator.run(&mut rng) => result.context("estimation aborted")?,
        result = signal::ctrl_c() => {
            result.context("failed to wait for shutdown signal")?;
            bail!("interrupted before the estimate completed");
        }
    };

    if let Some(capacity) = estimate.mean_public_capacity {
        info!(%capacity, "Mean public channel capacity");
    }

    match estimate.private_channels {
        Some(count) => {
            println!("{}", count);
            Ok(())
        }
        None => {
            warn!(
                trials = estimate.trials,
                "No trial saw a registry-confirmed close"
            );
            bail!(
                "no ratio samples in {} trials; the private channel estimate is undefined",
                estimate.trials
            )
        }
    }
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(url) = &cli.rpc_url {
        settings.bitcoin.rpc_url = url.clone();
    }

    if let Some(user) = &cli.rpc_user {
        settings.bitcoin.rpc_user = Some(user.clone());
    }

    if let Some(password) = &cli.rpc_password {
        settings.bitcoin.rpc_password = Some(password.clone());
    }

    if let Some(url) = &cli.registry_url {
        settings.registry.endpoint = url.clone();
    }

    let estimator = &mut settings.estimator;

    if let Some(trials) = cli.trials {
        estimator.trials = trials;
    }

    if let Some(blocks) = cli.window_size {
        estimator.window_size = blocks;
    }

    if let Some(height) = cli.start_height {
        estimator.start_height = height;
    }

    if let Some(count) = cli.known_public_channels {
        estimator.known_public_channels = count;
    }

    if let Some(n) = cli.concurrency {
        estimator.max_concurrent_trials = n;
    }

    if cli.seed.is_some() {
        estimator.seed = cli.seed;
    }

    if let Some(policy) = cli.averaging {
        estimator.averaging = policy.into();
    }
}

fn init_tracing(filter: Option<&str>) {
    let env_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "chanprobe",
            "--rpc-url",
            "http://node:8332",
            "--rpc-user",
            "alice",
            "--rpc-password",
            "secret",
            "--trials",
            "3",
            "--seed",
            "7",
            "--averaging",
            "fixed",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);

        assert_eq!(settings.bitcoin.rpc_url, "http://node:8332");
        assert_eq!(settings.bitcoin.rpc_password.as_deref(), Some("secret"));
        assert_eq!(settings.estimator.trials, 3);
        assert_eq!(settings.estimator.seed, Some(7));
        assert_eq!(settings.estimator.averaging, AveragingPolicy::FixedTrialCount);
        assert_eq!(settings.estimator.window_size, chanprobe_core::DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let cli = Cli::parse_from(["chanprobe"]);
        let mut settings = Settings::parse("[estimator]\ntrials = 5\nseed = 9").unwrap();
        apply_overrides(&mut settings, &cli);

        assert_eq!(settings.estimator.trials, 5);
        assert_eq!(settings.estimator.seed, Some(9));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
