//! Seqline workload driver
//!
//! Pushes a synthetic command stream through a server-side or client-side
//! dispatcher and checks that every connection observed its commands in
//! submission order.

mod workload;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use seqline_runtime::{init_logging, SeqlineConfig};
use tracing::{error, info};

use crate::workload::{Side, Workload};

#[derive(Debug, Parser)]
#[command(name = "seqline", version, about = "Per-connection ordered dispatch workload driver")]
struct Cli {
    /// Configuration file (defaults to ./seqline.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulated connections
    #[arg(long, default_value_t = 8)]
    connections: usize,

    /// Commands submitted per connection
    #[arg(long, default_value_t = 250)]
    commands: u32,

    /// Make every Nth command fail (0 disables failures)
    #[arg(long, default_value_t = 0)]
    fail_every: u32,

    /// Simulated work per command in microseconds
    #[arg(long, default_value_t = 50)]
    work_us: u64,

    /// Use a client-side dispatcher that publishes async error events
    #[arg(long)]
    client: bool,

    /// Seconds to wait for the workload to drain
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_configuration(&cli)?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging).context("failed to initialise logging")?;

    if cli.print_config {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let workload = Workload {
        connections: cli.connections,
        commands: cli.commands,
        fail_every: cli.fail_every,
        work: Duration::from_micros(cli.work_us),
        side: if cli.client { Side::Client } else { Side::Server },
    };
    info!(?workload, "starting workload");

    let report = workload
        .run(config, Duration::from_secs(cli.timeout_secs))
        .await?;

    println!("connections:       {}", report.connections);
    println!("commands executed: {}", report.executed);
    println!("commands faulted:  {}", report.faulted);
    println!("async errors:      {}", report.async_errors);
    println!("elapsed:           {:?}", report.elapsed);

    if !report.out_of_order.is_empty() {
        for connection in &report.out_of_order {
            error!(%connection, "commands executed out of submission order");
        }
        bail!(
            "{} connection(s) observed out-of-order execution",
            report.out_of_order.len()
        );
    }

    info!("all connections executed in submission order");
    Ok(())
}

/// Load configuration from the given file or the standard locations
fn load_configuration(cli: &Cli) -> Result<SeqlineConfig> {
    let config = match &cli.config {
        Some(path) => {
            SeqlineConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => SeqlineConfig::load()?,
    };
    Ok(config)
}
