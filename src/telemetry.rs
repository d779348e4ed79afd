//! Telemetry sink interface
//!
//! Consumers receive values through [`TelemetrySink`]: one callback per
//! emitted throttled average (unit already applied) and one callback per
//! identification string, invoked at most once per field per inverter.

use crate::measurement::{Identity, Measurement};

/// Receiver for decoded inverter values.
pub trait TelemetrySink: Send + Sync {
    /// A field's averaging cache closed a window and published a new value.
    fn publish_measurement(&self, address: u8, kind: Measurement, value: f64, unit: &'static str);

    /// An identification string was decoded for the first time.
    fn publish_identity(&self, address: u8, identity: Identity, value: &str);
}

/// Default sink that reports values through the structured log.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish_measurement(&self, address: u8, kind: Measurement, value: f64, unit: &'static str) {
        tracing::info!(address, field = %kind, value, unit, "measurement");
    }

    fn publish_identity(&self, address: u8, identity: Identity, value: &str) {
        tracing::info!(address, field = %identity, value, "identity");
    }
}
