use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::Measurer;

/// Runs the Ookla `speedtest` binary, located on the executable search path.
///
/// # Assumptions about the binary
///
/// It is invoked with flags accepting the license and GDPR terms and forcing
/// JSON output, and is expected to emit its report on stdout. stderr is never
/// parsed: on failure it is logged as the error diagnostic, and on success a
/// non-empty stderr is logged as a warning.
#[derive(Debug, Default)]
pub(crate) struct SpeedTestCli;

#[async_trait]
impl Measurer for SpeedTestCli {
    async fn measure(&mut self) -> Option<String> {
        let out = match Command::new("speedtest")
            .args(["--accept-license", "--accept-gdpr", "-f", "json"])
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(out) => out,
            Err(io_err) => {
                error!(
                    "Failed to run the 'speedtest' binary (is it installed and on PATH?): {}",
                    io_err
                );
                return None;
            }
        };

        if !out.status.success() {
            error!("Speedtest failed: {}", String::from_utf8_lossy(&out.stderr));
            debug!("Speedtest exit status: {}", out.status);
            return None;
        }

        if !out.stderr.is_empty() {
            warn!(
                "The 'speedtest' binary finished with a non-empty stderr: '{}'",
                String::from_utf8_lossy(&out.stderr)
            );
        }

        info!("Speedtest completed");
        let raw = String::from_utf8_lossy(&out.stdout).trim().to_string();
        debug!("Raw speedtest JSON: {}", raw);
        Some(raw)
    }
}
