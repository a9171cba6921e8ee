pub(crate) mod speedtest_cli;

use std::fmt::Debug;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Produces one raw speed test report per call.
///
/// `None` means "no data": the tool could not be run or reported failure.
/// The caller is expected to abort the run without parsing or exporting
/// anything.
#[async_trait]
pub(crate) trait Measurer: Debug {
    async fn measure(&mut self) -> Option<String>;
}

/// One flattened speed test measurement, as extracted from the tool's JSON
/// report. Constructed once per run and handed straight to the exporter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Measurement {
    /// Server-supplied ISO-8601 timestamp, kept as a string until the writer
    /// needs nanosecond precision.
    pub(crate) timestamp: String,
    pub(crate) ping_jitter: f64,
    pub(crate) ping_latency: f64,
    /// Bytes per second, as reported by the tool.
    pub(crate) download_bandwidth: f64,
    pub(crate) upload_bandwidth: f64,
    pub(crate) packet_loss: f64,
    pub(crate) isp: String,
    pub(crate) internal_ip: String,
    pub(crate) interface_name: String,
    pub(crate) mac_addr: String,
    pub(crate) is_vpn: bool,
    pub(crate) external_ip: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    timestamp: String,
    ping: Ping,
    download: Transfer,
    upload: Transfer,
    #[serde(default)]
    packet_loss: f64,
    #[serde(default = "unknown_isp")]
    isp: String,
    interface: Interface,
}

#[derive(Debug, Deserialize)]
struct Ping {
    jitter: f64,
    latency: f64,
}

#[derive(Debug, Deserialize)]
struct Transfer {
    bandwidth: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Interface {
    internal_ip: String,
    name: String,
    mac_addr: String,
    is_vpn: bool,
    external_ip: String,
}

fn unknown_isp() -> String {
    "unknown".to_string()
}

impl Measurement {
    /// Deserialize the tool's JSON report into a flat record.
    ///
    /// Any missing required key fails the whole run; only `packetLoss` and
    /// `isp` have defaults (0.0 and "unknown" respectively).
    pub(crate) fn from_json(raw: &str) -> Result<Self> {
        let report: Report = serde_json::from_str(raw)
            .context("failed to deserialize the speed test report")?;
        let parsed = Self {
            timestamp: report.timestamp,
            ping_jitter: report.ping.jitter,
            ping_latency: report.ping.latency,
            download_bandwidth: report.download.bandwidth,
            upload_bandwidth: report.upload.bandwidth,
            packet_loss: report.packet_loss,
            isp: report.isp,
            internal_ip: report.interface.internal_ip,
            interface_name: report.interface.name,
            mac_addr: report.interface.mac_addr,
            is_vpn: report.interface.is_vpn,
            external_ip: report.interface.external_ip,
        };
        debug!("Parsed speedtest data: {:?}", parsed);
        Ok(parsed)
    }
}
