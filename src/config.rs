use std::env;
use std::path::PathBuf;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

use crate::exporters::influx;

#[derive(Debug, Parser)]
#[command(version, about)]
pub(crate) struct Args {
    /// Path to an optional key-value environment file
    #[arg(short, long, value_name = "FILE", default_value = ".env")]
    pub(crate) env_file: PathBuf,

    /// Append log output to this file (interactive runs only)
    #[arg(short, long, value_name = "FILE")]
    pub(crate) log_file: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) log: LogConfig,
    pub(crate) influx: influx::Config,
    env_file: PathBuf,
}

#[derive(Debug)]
pub(crate) struct LogConfig {
    pub(crate) level: LevelFilter,
    pub(crate) file: Option<PathBuf>,
}

impl Config {
    /// Assemble the configuration from the environment, optionally seeded
    /// from a local key-value file. Variables already present in the process
    /// environment win over the file's values.
    ///
    /// `INFLUXDB_URL` is always derived from `SERVER_IP` and `INFLUXDB_PORT`
    /// (with their defaults), never read directly. The token, organization
    /// and bucket have no defaults; their absence is detected by the writer.
    pub(crate) fn load(args: &Args) -> Self {
        let _ = dotenvy::from_path(&args.env_file);

        let server_ip = env_or("SERVER_IP", "localhost");
        let port = env_or("INFLUXDB_PORT", "8086");
        let influx = influx::Config {
            url: format!("http://{}:{}", server_ip, port),
            token: env::var("INFLUXDB_ADMIN_TOKEN").ok(),
            org: env::var("INFLUXDB_ORG").ok(),
            bucket: env::var("INFLUXDB_BUCKET").ok(),
        };

        let log = LogConfig {
            level: parse_level(&env_or("LOGLEVEL", "INFO")),
            file: args.log_file.clone(),
        };

        Self {
            log,
            influx,
            env_file: args.env_file.clone(),
        }
    }

    /// Debug-log the resolved configuration, with the token redacted.
    pub(crate) fn trace_resolved(&self) {
        debug!("Loaded environment variables from {}", self.env_file.display());
        debug!("INFLUXDB_URL={}", self.influx.url);
        debug!(
            "INFLUXDB_ADMIN_TOKEN={}",
            if self.influx.token.is_some() { "<hidden>" } else { "<unset>" }
        );
        debug!("INFLUXDB_ORG={}", self.influx.org.as_deref().unwrap_or("<unset>"));
        debug!("INFLUXDB_BUCKET={}", self.influx.bucket.as_deref().unwrap_or("<unset>"));
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Map the enumerated LOGLEVEL values onto tracing's level filters.
/// Unrecognized values fall back to INFO.
fn parse_level(value: &str) -> LevelFilter {
    match value.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::DEBUG,
        "INFO" => LevelFilter::INFO,
        "WARNING" | "WARN" => LevelFilter::WARN,
        "ERROR" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}
