use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};

use super::Exporter;
use crate::measure::Measurement;

const MEASUREMENT_NAME: &str = "network_speed";

/// Connection parameters for the InfluxDB 2.x write API.
///
/// The URL is always present (derived from `SERVER_IP`/`INFLUXDB_PORT`, with
/// `http://localhost:8086` as the fallback). The token, organization and
/// bucket have no defaults; the write is skipped when any of them is unset.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) url: String,
    pub(crate) token: Option<String>,
    pub(crate) org: Option<String>,
    pub(crate) bucket: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum WriteError {
    #[error("missing InfluxDB configuration: {0} is unset")]
    NotConfigured(&'static str),
    #[error("failed to parse measurement timestamp: {0}")]
    BadTimestamp(#[from] chrono::ParseError),
    #[error("failed to reach InfluxDB: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("InfluxDB rejected the write: {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl WriteError {
    /// True for the "writer not configured" category, which callers treat as
    /// a skipped write rather than a delivery failure.
    pub(crate) fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}

/// Writes one line-protocol point per run to the InfluxDB v2 write endpoint,
/// authenticated by token.
#[derive(Debug)]
pub(crate) struct Influx {
    config: Config,
}

impl Influx {
    pub(crate) fn new(config: Config) -> Self {
        Self { config }
    }

    /// Check the connection parameters, naming the first unset one. No
    /// network I/O happens before this check passes.
    fn credentials(&self) -> Result<(&str, &str, &str), WriteError> {
        let token = self
            .config
            .token
            .as_deref()
            .ok_or(WriteError::NotConfigured("INFLUXDB_ADMIN_TOKEN"))?;
        let org = self
            .config
            .org
            .as_deref()
            .ok_or(WriteError::NotConfigured("INFLUXDB_ORG"))?;
        let bucket = self
            .config
            .bucket
            .as_deref()
            .ok_or(WriteError::NotConfigured("INFLUXDB_BUCKET"))?;
        Ok((token, org, bucket))
    }
}

#[async_trait]
impl Exporter for Influx {
    async fn export(&self, measurement: &Measurement) -> Result<(), WriteError> {
        let (token, org, bucket) = self.credentials()?;

        let point = line_protocol(measurement)?;
        debug!("Writing point to InfluxDB: {}", point);

        let response = Client::new()
            .post(format!("{}/api/v2/write", self.config.url))
            .query(&[("org", org), ("bucket", bucket), ("precision", "ns")])
            .header("Authorization", format!("Token {}", token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(point)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Api { status, body });
        }

        info!("Data written to InfluxDB");
        Ok(())
    }
}

/// Render one point in line protocol, tagged by host and ISP, timestamped at
/// nanosecond precision from the record's ISO-8601 string.
fn line_protocol(m: &Measurement) -> Result<String, WriteError> {
    let timestamp = DateTime::parse_from_rfc3339(&m.timestamp)?
        .timestamp_nanos_opt()
        .unwrap_or_default();
    Ok(format!(
        "{},host={},isp={} ping_latency={},ping_jitter={},download_bandwidth={},upload_bandwidth={},packet_loss={} {}",
        MEASUREMENT_NAME,
        escape_tag(&m.internal_ip),
        escape_tag(&m.isp),
        m.ping_latency,
        m.ping_jitter,
        m.download_bandwidth,
        m.upload_bandwidth,
        m.packet_loss,
        timestamp,
    ))
}

/// Tag values must escape backslashes, commas, spaces and equals signs.
fn escape_tag(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('=', "\\=")
}
