//! Core driver logic for the Solivia controller
//!
//! This module contains the main driver orchestration: it loads and
//! validates configuration, builds the fleet and the poll scheduler, runs
//! the tick loop, and fans decoded values out to the telemetry sink. The
//! gateway responder and status snapshot share the fleet read-only.

use crate::bus::{BusTransport, SerialBus};
use crate::config::Config;
use crate::error::Result;
use crate::gateway::GatewayResponder;
use crate::inverter::{Fleet, InverterRecord};
use crate::logging::get_logger;
use crate::scheduler::{PollMode, PollOutcome, PollScheduler};
use crate::telemetry::{LogSink, TelemetrySink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;

/// Main driver for a Solivia inverter bus.
pub struct SoliviaDriver {
    /// Configuration
    config: Config,

    /// Operating mode, derived from the gateway flag
    mode: PollMode,

    /// Poll scheduler; sole owner of the bus transport
    scheduler: PollScheduler,

    /// Consumer of emitted values
    sink: Arc<dyn TelemetrySink>,

    /// Logger with context
    logger: crate::logging::StructuredLogger,

    /// Shutdown signal
    shutdown_tx: mpsc::UnboundedSender<()>,

    /// Shutdown receiver
    shutdown_rx: mpsc::UnboundedReceiver<()>,
}

impl SoliviaDriver {
    /// Create a driver from the default configuration locations, opening
    /// the configured serial port.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        config.validate()?;

        // Initialize logging before anything can fail loudly
        crate::logging::init_logging(&config.logging)?;

        let bus = SerialBus::open(&config.serial)?;
        Self::with_transport(config, Box::new(bus), Arc::new(LogSink))
    }

    /// Create a driver over an explicit transport and sink.
    ///
    /// The configuration must already be validated; this is also the entry
    /// point tests use with a scripted transport.
    pub fn with_transport(
        config: Config,
        bus: Box<dyn BusTransport>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        config.validate()?;

        let logger = get_logger("driver");
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        let mode = if config.has_gateway {
            PollMode::GatewayBacked
        } else {
            PollMode::Standalone
        };

        let fleet = Self::build_fleet(&config);
        let scheduler = PollScheduler::new(
            bus,
            Arc::new(tokio::sync::RwLock::new(fleet)),
            Duration::from_millis(config.serial.response_timeout_ms),
        );

        logger.info(&format!(
            "Initialized driver for {} inverter(s), mode {:?}",
            config.inverters.len(),
            mode
        ));

        Ok(Self {
            config,
            mode,
            scheduler,
            sink,
            logger,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Records are created once from configuration and live for the process
    /// lifetime; poll order is configuration order.
    fn build_fleet(config: &Config) -> Fleet {
        let records = config
            .inverters
            .iter()
            .map(|inv| {
                InverterRecord::new(
                    inv.address,
                    Duration::from_millis(inv.throttle_ms),
                    &inv.enabled_fields(),
                )
            })
            .collect();
        Fleet::new(records)
    }

    /// Handle for requesting a driver shutdown.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// Read-only responder for external gateway queries.
    pub fn gateway_responder(&self) -> GatewayResponder {
        GatewayResponder::new(self.scheduler.fleet())
    }

    /// Effective scheduler tick interval for the current mode.
    pub fn tick_interval(&self) -> Duration {
        self.mode
            .effective_tick_interval(Duration::from_millis(self.config.update_interval_ms))
    }

    /// Run the driver main loop.
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting Solivia driver main loop");

        let mut poll_interval = interval(self.tick_interval());

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    self.poll_cycle().await;
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One scheduler tick plus telemetry fan-out.
    ///
    /// Poll failures are never fatal: the record keeps its last-known
    /// values and the inverter is due again at its next throttle boundary.
    pub async fn poll_cycle(&mut self) {
        match self.scheduler.tick(Instant::now()).await {
            PollOutcome::Idle => {}
            PollOutcome::Parsed { address, commit } => {
                for (kind, value) in commit.emitted {
                    self.sink
                        .publish_measurement(address, kind, value, kind.unit());
                }
                for (identity, value) in commit.identities {
                    self.sink.publish_identity(address, identity, &value);
                }
            }
            // Already logged as warnings by the scheduler; nothing else to
            // do without backoff or retry
            PollOutcome::Timeout { .. } | PollOutcome::Error { .. } => {}
        }
    }

    /// JSON status snapshot for observability: per-inverter identity,
    /// cached averages and reading ages.
    pub async fn snapshot(&self) -> serde_json::Value {
        let fleet_handle = self.scheduler.fleet();
        let fleet = fleet_handle.read().await;
        let now = Instant::now();

        let inverters: Vec<serde_json::Value> = fleet
            .iter()
            .map(|record| {
                let fields: serde_json::Map<String, serde_json::Value> = record
                    .enabled_fields()
                    .filter_map(|kind| {
                        let cached = record.cached_value(kind)?;
                        let age_ms = record
                            .last_reading(kind)
                            .map(|r| now.duration_since(r.updated_at).as_millis() as u64);
                        Some((
                            kind.name().to_string(),
                            serde_json::json!({
                                "value": cached,
                                "unit": kind.unit(),
                                "age_ms": age_ms,
                            }),
                        ))
                    })
                    .collect();

                serde_json::json!({
                    "address": record.address(),
                    "part_number": record.part_number(),
                    "serial_number": record.serial_number(),
                    "throttle_ms": record.throttle().as_millis() as u64,
                    "fields": fields,
                })
            })
            .collect();

        serde_json::json!({
            "version": env!("APP_VERSION"),
            "mode": format!("{:?}", self.mode),
            "tick_interval_ms": self.tick_interval().as_millis() as u64,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "inverters": inverters,
        })
    }
}
