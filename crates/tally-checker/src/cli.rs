use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tally_check::{OutputFormat, TransportConfig};

#[derive(Debug, Parser)]
#[command(name = "tally-checker", version, about = "Evaluate threshold checks against a metrics endpoint")]
pub struct Args {
    /// Metrics endpoint as host:port or a base URL [default: localhost:12345]
    #[arg(long)]
    pub address: Option<String>,

    /// Check configuration file
    #[arg(long)]
    pub cnf: PathBuf,

    /// Seconds between cycles; 0 runs a single cycle
    #[arg(long, default_value_t = 0)]
    pub step: u64,

    /// Snapshot fetch timeout in seconds [default: 5]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Whether the endpoint may return NaN values
    #[arg(long)]
    pub allow_nan: Option<bool>,
}

/// Transport settings after applying command-line overrides to `[transport]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    pub address: String,
    pub timeout: Duration,
    pub allow_nan: bool,
}

impl Args {
    pub fn transport(&self, config: &TransportConfig) -> Transport {
        Transport {
            address: self
                .address
                .clone()
                .unwrap_or_else(|| config.address.clone()),
            timeout: self
                .timeout
                .map_or_else(|| config.timeout(), Duration::from_secs),
            allow_nan: self.allow_nan.unwrap_or(config.allow_nan),
        }
    }
}
