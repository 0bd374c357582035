use crate::unit::UnitOptions;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "unit_pipeline")]
#[command(about = "Demo programs for the concurrent processing unit")]
#[command(version)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single unit that builds a random inventory for each user
    Single(RunArgs),

    /// Run two cascaded units: uppercase a string, then take its length
    Chain(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of workers per unit (defaults to the number of CPUs)
    #[arg(short, long, env = "UNIT_WORKERS")]
    pub workers: Option<usize>,

    /// Maximum time to wait for the units to drain on shutdown
    #[arg(long, default_value = "10")]
    pub stop_timeout_secs: u64,

    /// Stop feeding after this many items instead of waiting for Ctrl-C
    #[arg(short = 'n', long)]
    pub max_items: Option<u64>,

    /// Upper bound of the simulated processing delay per item
    #[arg(long, default_value = "500")]
    pub max_delay_ms: u64,
}

impl RunArgs {
    /// Build unit options named `name`, applying the worker override
    pub fn unit_options(&self, name: &str) -> UnitOptions {
        let options = UnitOptions::new().with_name(name);
        match self.workers {
            Some(workers) => options.with_workers(workers),
            None => options,
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
