pub(crate) mod influx;

use std::fmt::Debug;

use async_trait::async_trait;

use self::influx::WriteError;
use crate::measure::Measurement;

/// Delivers one measurement to a metrics backend.
///
/// Delivery is at-most-once: implementations neither retry nor buffer, and a
/// failed export surfaces only through the returned error.
#[async_trait]
pub(crate) trait Exporter: Debug {
    async fn export(&self, measurement: &Measurement) -> Result<(), WriteError>;
}
