//! Per-inverter state
//!
//! An [`InverterRecord`] holds everything the driver knows about one bus
//! address: the last raw reading per measurement field, the per-field
//! averaging caches, poll bookkeeping, and the write-once identification
//! strings. Records are created once from configuration and live for the
//! process lifetime.

use crate::cache::ThrottledAverage;
use crate::frame::Variant15;
use crate::measurement::{Identity, Measurement};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A cell that accepts exactly one write for its lifetime.
///
/// Part and serial numbers are physically immutable per device; the first
/// successful decode wins and later values are ignored.
#[derive(Debug, Clone, Default)]
pub struct WriteOnce<T> {
    value: Option<T>,
}

impl<T> WriteOnce<T> {
    /// Store `value` if the cell is still empty. Returns `true` when the
    /// value was stored.
    pub fn set(&mut self, value: T) -> bool {
        if self.value.is_some() {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// The last raw (already scaled) value decoded for a field.
#[derive(Debug, Clone, Copy)]
pub struct FieldReading {
    pub value: f64,
    pub updated_at: Instant,
}

/// What a successful poll commit produced: throttled averages that closed
/// their window, and identification strings seen for the first time.
#[derive(Debug, Default)]
pub struct CommitResult {
    pub emitted: Vec<(Measurement, f64)>,
    pub identities: Vec<(Identity, String)>,
}

/// State for a single inverter on the bus.
#[derive(Debug)]
pub struct InverterRecord {
    address: u8,
    throttle: Duration,
    last_poll_at: Option<Instant>,
    fields: HashMap<Measurement, FieldReading>,
    caches: HashMap<Measurement, ThrottledAverage>,
    part_number: WriteOnce<String>,
    serial_number: WriteOnce<String>,
}

impl InverterRecord {
    /// Create a record for `address` with averaging caches for exactly the
    /// enabled measurement kinds. Disabled fields are neither cached nor
    /// reported.
    pub fn new(address: u8, throttle: Duration, enabled: &[Measurement]) -> Self {
        let caches = enabled
            .iter()
            .map(|&kind| (kind, ThrottledAverage::new(throttle)))
            .collect();
        Self {
            address,
            throttle,
            last_poll_at: None,
            fields: HashMap::new(),
            caches,
            part_number: WriteOnce::default(),
            serial_number: WriteOnce::default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Whether this inverter may be polled again.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_poll_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.throttle,
        }
    }

    /// Record a poll attempt, successful or not. Failed polls also count so
    /// an unresponsive inverter is retried at its normal cadence instead of
    /// monopolizing the bus.
    pub fn mark_polled(&mut self, now: Instant) {
        self.last_poll_at = Some(now);
    }

    pub fn last_poll_at(&self) -> Option<Instant> {
        self.last_poll_at
    }

    pub fn is_enabled(&self, kind: Measurement) -> bool {
        self.caches.contains_key(&kind)
    }

    /// Fold a decoded measurement payload into the record.
    ///
    /// This is the single commit point for inverter state: raw readings are
    /// stored, enabled fields feed their averaging caches, and identity
    /// strings are written at most once.
    pub fn apply_variant15(&mut self, data: &Variant15, now: Instant) -> CommitResult {
        let mut result = CommitResult::default();

        for &(kind, value) in &data.readings {
            let Some(cache) = self.caches.get_mut(&kind) else {
                continue;
            };
            self.fields.insert(
                kind,
                FieldReading {
                    value,
                    updated_at: now,
                },
            );
            if let Some(mean) = cache.record_sample(value, now) {
                result.emitted.push((kind, mean));
            }
        }

        if !data.part_number.is_empty() && self.part_number.set(data.part_number.clone()) {
            result
                .identities
                .push((Identity::PartNumber, data.part_number.clone()));
        }
        if !data.serial_number.is_empty() && self.serial_number.set(data.serial_number.clone()) {
            result
                .identities
                .push((Identity::SerialNumber, data.serial_number.clone()));
        }

        result
    }

    /// Most recent raw reading for a field, if the field is enabled and has
    /// been decoded at least once.
    pub fn last_reading(&self, kind: Measurement) -> Option<FieldReading> {
        self.fields.get(&kind).copied()
    }

    /// Throttled average for a field; `None` until the first cache window
    /// has closed.
    pub fn cached_value(&self, kind: Measurement) -> Option<f64> {
        self.caches.get(&kind).and_then(ThrottledAverage::current_value)
    }

    pub fn part_number(&self) -> Option<&str> {
        self.part_number.get().map(String::as_str)
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.get().map(String::as_str)
    }

    /// Enabled measurement kinds, in payload order.
    pub fn enabled_fields(&self) -> impl Iterator<Item = Measurement> + '_ {
        Measurement::ALL
            .into_iter()
            .filter(|kind| self.caches.contains_key(kind))
    }
}

/// All configured inverter records, in configuration (= poll) order.
#[derive(Debug, Default)]
pub struct Fleet {
    records: Vec<InverterRecord>,
}

impl Fleet {
    pub fn new(records: Vec<InverterRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InverterRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut InverterRecord> {
        self.records.get_mut(index)
    }

    pub fn by_address(&self, address: u8) -> Option<&InverterRecord> {
        self.records.iter().find(|r| r.address() == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InverterRecord> {
        self.records.iter()
    }
}
