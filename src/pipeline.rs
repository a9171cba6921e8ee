use std::process::ExitCode;

use tracing::{error, info};

use crate::{
    exporters::Exporter,
    measure::{Measurement, Measurer},
};

/// How a single run ended. Each category maps to its own process exit code,
/// so an external scheduler can tell a failed measurement apart from a
/// failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    /// The speedtest binary was missing or exited reporting failure.
    MeasureFailed,
    /// The tool's report did not match the expected schema.
    ParseFailed,
    /// The writer was missing one of its connection parameters.
    WriteSkipped,
    /// The point could not be delivered to the database.
    WriteFailed,
}

impl Outcome {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::MeasureFailed => 1,
            Self::ParseFailed => 2,
            Self::WriteSkipped => 3,
            Self::WriteFailed => 4,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

/// Runs the measure, parse and export stages in order, handing each stage's
/// value directly to the next and stopping at the first one that fails.
#[derive(Debug)]
pub(crate) struct Pipeline {
    measurer: Box<dyn Measurer>,
    exporter: Box<dyn Exporter>,
}

impl Pipeline {
    pub(crate) fn new(measurer: Box<dyn Measurer>, exporter: Box<dyn Exporter>) -> Self {
        Self { measurer, exporter }
    }

    pub(crate) async fn run(mut self) -> Outcome {
        info!("Starting network speed test...");
        let raw = match self.measurer.measure().await {
            Some(raw) => raw,
            None => return Outcome::MeasureFailed,
        };

        let measurement = match Measurement::from_json(&raw) {
            Ok(measurement) => measurement,
            Err(e) => {
                error!("Failed to parse the speed test report: {:#}", e);
                return Outcome::ParseFailed;
            }
        };

        match self.exporter.export(&measurement).await {
            Ok(()) => Outcome::Success,
            Err(e) if e.is_configuration() => {
                error!("{}", e);
                Outcome::WriteSkipped
            }
            Err(e) => {
                error!("Failed to write to InfluxDB: {}", e);
                Outcome::WriteFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::exporters::influx::WriteError;

    const VALID_REPORT: &str = r#"{"timestamp":"2024-01-01T00:00:00Z","ping":{"jitter":1.2,"latency":15.5},"download":{"bandwidth":12500000},"upload":{"bandwidth":1250000},"interface":{"internalIp":"10.0.0.5","name":"eth0","macAddr":"aa:bb:cc:dd:ee:ff","isVpn":false,"externalIp":"1.2.3.4"}}"#;

    #[derive(Debug)]
    struct StaticMeasurer(Option<String>);

    #[async_trait]
    impl Measurer for StaticMeasurer {
        async fn measure(&mut self) -> Option<String> {
            self.0.clone()
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Response {
        Success,
        NotConfigured,
        ServerError,
    }

    #[derive(Debug)]
    struct RecordingExporter {
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Option<Measurement>>>,
        response: Response,
    }

    impl RecordingExporter {
        fn new(response: Response) -> (Self, Arc<AtomicUsize>, Arc<Mutex<Option<Measurement>>>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let seen = Arc::new(Mutex::new(None));
            let exporter = Self {
                calls: Arc::clone(&calls),
                seen: Arc::clone(&seen),
                response,
            };
            (exporter, calls, seen)
        }
    }

    #[async_trait]
    impl Exporter for RecordingExporter {
        async fn export(&self, measurement: &Measurement) -> Result<(), WriteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(measurement.clone());
            match self.response {
                Response::Success => Ok(()),
                Response::NotConfigured => Err(WriteError::NotConfigured("INFLUXDB_ADMIN_TOKEN")),
                Response::ServerError => Err(WriteError::Api {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "boom".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn no_data_aborts_before_parse_and_export() {
        let (exporter, calls, _) = RecordingExporter::new(Response::Success);
        let pipeline = Pipeline::new(Box::new(StaticMeasurer(None)), Box::new(exporter));
        assert_eq!(pipeline.run().await, Outcome::MeasureFailed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_report_aborts_before_export() {
        let (exporter, calls, _) = RecordingExporter::new(Response::Success);
        let pipeline = Pipeline::new(
            Box::new(StaticMeasurer(Some("{\"nope\":true}".to_string()))),
            Box::new(exporter),
        );
        assert_eq!(pipeline.run().await, Outcome::ParseFailed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_report_is_parsed_and_exported_once() {
        let (exporter, calls, seen) = RecordingExporter::new(Response::Success);
        let pipeline = Pipeline::new(
            Box::new(StaticMeasurer(Some(VALID_REPORT.to_string()))),
            Box::new(exporter),
        );
        assert_eq!(pipeline.run().await, Outcome::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let measurement = seen.lock().unwrap().clone().unwrap();
        assert_eq!(measurement.packet_loss, 0.0);
        assert_eq!(measurement.isp, "unknown");
        assert_eq!(measurement.download_bandwidth, 12_500_000.0);
        assert_eq!(measurement.internal_ip, "10.0.0.5");
    }

    #[tokio::test]
    async fn missing_writer_configuration_is_a_skip() {
        let (exporter, calls, _) = RecordingExporter::new(Response::NotConfigured);
        let pipeline = Pipeline::new(
            Box::new(StaticMeasurer(Some(VALID_REPORT.to_string()))),
            Box::new(exporter),
        );
        assert_eq!(pipeline.run().await, Outcome::WriteSkipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delivery_failure_is_a_write_failure() {
        let (exporter, _, _) = RecordingExporter::new(Response::ServerError);
        let pipeline = Pipeline::new(
            Box::new(StaticMeasurer(Some(VALID_REPORT.to_string()))),
            Box::new(exporter),
        );
        assert_eq!(pipeline.run().await, Outcome::WriteFailed);
    }

    #[test]
    fn outcome_exit_codes_are_distinct_per_category() {
        assert_eq!(Outcome::Success.code(), 0);
        assert_eq!(Outcome::MeasureFailed.code(), 1);
        assert_eq!(Outcome::ParseFailed.code(), 2);
        assert_eq!(Outcome::WriteSkipped.code(), 3);
        assert_eq!(Outcome::WriteFailed.code(), 4);
    }
}
