//! Gateway responder for dual-mode setups
//!
//! When an external gateway device polls this controller (every 500 ms), its
//! queries must be answered from cached state: triggering a bus transaction
//! per query would overwhelm the inverters and starve other addresses. The
//! responder therefore only ever reads the fleet's averaging caches and
//! never blocks on the bus.

use crate::inverter::Fleet;
use crate::logging::get_logger;
use crate::measurement::Measurement;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Reply to a gateway query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GatewayReply {
    /// The field's most recent throttled average
    Value(f64),
    /// No window has closed yet for this field (startup transient), the
    /// field is disabled, or the address is not configured
    NotAvailable,
}

/// Read-only view over cached inverter values for the external gateway.
#[derive(Clone)]
pub struct GatewayResponder {
    fleet: Arc<RwLock<Fleet>>,
    logger: crate::logging::StructuredLogger,
}

impl GatewayResponder {
    pub fn new(fleet: Arc<RwLock<Fleet>>) -> Self {
        Self {
            fleet,
            logger: get_logger("gateway"),
        }
    }

    /// Answer a query for one inverter field.
    ///
    /// Never forces a fresh poll: a field that has not produced a value yet
    /// gets an explicit [`GatewayReply::NotAvailable`] instead of a default
    /// number or a wait.
    pub async fn query(&self, address: u8, kind: Measurement) -> GatewayReply {
        let fleet = self.fleet.read().await;
        let Some(record) = fleet.by_address(address) else {
            self.logger
                .debug(&format!("Query for unknown inverter {}", address));
            return GatewayReply::NotAvailable;
        };
        match record.cached_value(kind) {
            Some(value) => GatewayReply::Value(value),
            None => GatewayReply::NotAvailable,
        }
    }

    /// Answer an identification string query.
    pub async fn query_identity(
        &self,
        address: u8,
        identity: crate::measurement::Identity,
    ) -> Option<String> {
        let fleet = self.fleet.read().await;
        let record = fleet.by_address(address)?;
        let value = match identity {
            crate::measurement::Identity::PartNumber => record.part_number(),
            crate::measurement::Identity::SerialNumber => record.serial_number(),
        };
        value.map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{build_variant15, parse_variant15};
    use crate::inverter::InverterRecord;
    use crate::measurement::Identity;
    use std::time::{Duration, Instant};

    fn fleet_with_one_record() -> Arc<RwLock<Fleet>> {
        let record = InverterRecord::new(1, Duration::from_secs(0), &Measurement::ALL);
        Arc::new(RwLock::new(Fleet::new(vec![record])))
    }

    #[tokio::test]
    async fn query_before_any_sample_is_not_available() {
        let responder = GatewayResponder::new(fleet_with_one_record());
        assert_eq!(
            responder.query(1, Measurement::AcPower).await,
            GatewayReply::NotAvailable
        );
    }

    #[tokio::test]
    async fn query_returns_cached_average() {
        let fleet = fleet_with_one_record();
        {
            let payload = build_variant15("P", "S", &[(Measurement::AcPower, 1500)]);
            let data = parse_variant15(&payload).unwrap();
            let mut guard = fleet.write().await;
            guard
                .get_mut(0)
                .unwrap()
                .apply_variant15(&data, Instant::now());
        }

        let responder = GatewayResponder::new(fleet);
        assert_eq!(
            responder.query(1, Measurement::AcPower).await,
            GatewayReply::Value(1500.0)
        );
        assert_eq!(
            responder.query_identity(1, Identity::SerialNumber).await,
            Some("S".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_address_is_not_available() {
        let responder = GatewayResponder::new(fleet_with_one_record());
        assert_eq!(
            responder.query(9, Measurement::AcPower).await,
            GatewayReply::NotAvailable
        );
        assert_eq!(responder.query_identity(9, Identity::PartNumber).await, None);
    }
}
