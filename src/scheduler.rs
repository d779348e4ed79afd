//! Poll scheduler
//!
//! The scheduler owns the bus transport and runs one request/response
//! transaction per tick: pick the next due inverter round-robin, send the
//! measurement enquiry, reassemble and validate the response within a
//! bounded time budget, and commit decoded fields into the shared fleet.
//!
//! Per-cycle state machine:
//! IDLE -> REQUEST_SENT -> AWAITING_RESPONSE -> {PARSED, TIMEOUT, ERROR} -> IDLE.
//! Timeouts and protocol errors leave the record's last-known values in
//! place and still advance the cursor; there is no intra-tick retry.

use crate::bus::BusTransport;
use crate::error::{Result, SoliviaError};
use crate::frame::{FrameAssembler, decode_response, encode_measurement_request, parse_variant15};
use crate::inverter::{CommitResult, Fleet};
use crate::logging::get_logger;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Fixed tick interval when an external gateway polls this controller.
pub const GATEWAY_TICK: Duration = Duration::from_millis(500);

/// Operating mode of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// The controller polls at the configured update interval
    Standalone,
    /// An external gateway queries this controller every 500 ms; the bus
    /// tick is pinned to the same cadence
    GatewayBacked,
}

impl PollMode {
    /// The tick interval actually used for a configured interval.
    ///
    /// In gateway-backed mode any configured value is overridden: the
    /// gateway dictates the cadence.
    pub fn effective_tick_interval(self, configured: Duration) -> Duration {
        match self {
            PollMode::Standalone => configured,
            PollMode::GatewayBacked => {
                if configured != GATEWAY_TICK {
                    tracing::warn!(
                        configured_ms = configured.as_millis() as u64,
                        "gateway present, forcing tick interval to 500 ms"
                    );
                }
                GATEWAY_TICK
            }
        }
    }
}

/// Result of one scheduler tick.
#[derive(Debug)]
pub enum PollOutcome {
    /// No inverter was due; the bus stayed idle
    Idle,
    /// A validated response was committed
    Parsed { address: u8, commit: CommitResult },
    /// No valid response arrived within the time budget
    Timeout { address: u8 },
    /// The transaction failed with a protocol or bus error
    Error { address: u8, error: SoliviaError },
}

/// Round-robin poll scheduler. Sole owner of the bus transport and sole
/// writer of fleet state.
pub struct PollScheduler {
    bus: Box<dyn BusTransport>,
    fleet: Arc<RwLock<Fleet>>,
    cursor: usize,
    response_timeout: Duration,
    assembler: FrameAssembler,
    logger: crate::logging::StructuredLogger,
}

impl PollScheduler {
    pub fn new(
        bus: Box<dyn BusTransport>,
        fleet: Arc<RwLock<Fleet>>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            fleet,
            cursor: 0,
            response_timeout,
            assembler: FrameAssembler::new(),
            logger: get_logger("scheduler"),
        }
    }

    /// Shared fleet handle for read-only consumers (gateway responder,
    /// status snapshot).
    pub fn fleet(&self) -> Arc<RwLock<Fleet>> {
        Arc::clone(&self.fleet)
    }

    /// Run one poll cycle.
    ///
    /// At most one inverter is polled; if none is due within its throttle
    /// interval, the tick is a no-op. A committed cycle updates the record
    /// and its averaging caches; a failed cycle only updates the poll
    /// bookkeeping so the inverter is due again at its next throttle
    /// boundary.
    pub async fn tick(&mut self, now: Instant) -> PollOutcome {
        let Some((index, address)) = self.select_due(now).await else {
            return PollOutcome::Idle;
        };

        self.logger.debug(&format!(
            "Polling inverter {} (slot {})",
            address, index
        ));

        // Stale bytes from a previous cycle must not alias into this one
        self.assembler.clear();

        match self.transact(address).await {
            Ok(Some(commit)) => {
                let mut fleet = self.fleet.write().await;
                if let Some(record) = fleet.get_mut(index) {
                    record.mark_polled(now);
                }
                PollOutcome::Parsed { address, commit }
            }
            Ok(None) => {
                self.logger.warn(&format!(
                    "Inverter {} did not answer within {} ms",
                    address,
                    self.response_timeout.as_millis()
                ));
                self.mark_attempt(index, now).await;
                PollOutcome::Timeout { address }
            }
            Err(error) => {
                self.logger
                    .warn(&format!("Poll of inverter {} failed: {}", address, error));
                self.mark_attempt(index, now).await;
                PollOutcome::Error { address, error }
            }
        }
    }

    /// Pick the next due inverter round-robin from the cursor, wrapping.
    /// Advances the cursor past the selected slot.
    async fn select_due(&mut self, now: Instant) -> Option<(usize, u8)> {
        let fleet = self.fleet.read().await;
        let n = fleet.len();
        for offset in 0..n {
            let index = (self.cursor + offset) % n;
            let record = fleet.get(index)?;
            if record.is_due(now) {
                self.cursor = (index + 1) % n;
                return Some((index, record.address()));
            }
        }
        None
    }

    async fn mark_attempt(&self, index: usize, now: Instant) {
        let mut fleet = self.fleet.write().await;
        if let Some(record) = fleet.get_mut(index) {
            record.mark_polled(now);
        }
    }

    /// One request/response exchange. `Ok(None)` means timeout; frame errors
    /// propagate as `Err` and are handled by the caller like a timeout.
    async fn transact(&mut self, address: u8) -> Result<Option<CommitResult>> {
        let request = encode_measurement_request(address);

        self.bus.set_transmit(true)?;
        let write_result = self.bus.write(&request).await;
        // Release the line before evaluating the write so a failed write
        // cannot leave the driver enabled
        self.bus.set_transmit(false)?;
        write_result?;

        let deadline = Instant::now() + self.response_timeout;
        let mut last_frame_error: Option<SoliviaError> = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                // Surface a decode failure over a plain timeout when one
                // occurred; both advance the scheduler the same way
                return match last_frame_error {
                    Some(error) => Err(error),
                    None => Ok(None),
                };
            }

            let chunk = self.bus.read(remaining).await?;
            if chunk.is_empty() {
                continue;
            }
            self.assembler.push(&chunk);

            while let Some(raw) = self.assembler.next_frame() {
                match decode_response(&raw, address) {
                    Ok(frame) => {
                        let data = parse_variant15(&frame.payload)?;
                        let commit_time = Instant::now();
                        let mut fleet = self.fleet.write().await;
                        let index = fleet.iter().position(|r| r.address() == address);
                        let Some(record) = index.and_then(|i| fleet.get_mut(i)) else {
                            return Ok(None);
                        };
                        let commit = record.apply_variant15(&data, commit_time);
                        return Ok(Some(commit));
                    }
                    Err(err) => {
                        // Keep scanning: noise or a foreign transaction may
                        // precede the real answer on a multidrop bus
                        self.logger.debug(&format!(
                            "Discarding frame from bus: {}",
                            err
                        ));
                        last_frame_error = Some(err.into());
                    }
                }
            }
        }
    }
}
