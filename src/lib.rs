//! # Solivia - Delta Solivia inverter driver for shared RS-485 buses
//!
//! A Rust driver that polls one or more Delta Solivia solar inverters over a
//! half-duplex multidrop serial bus, decodes their telemetry and serves the
//! cached values to a local telemetry sink and, optionally, to an external
//! gateway device that queries the controller on a fast fixed cadence.
//!
//! ## Features
//!
//! - **Async-first**: single-transaction bus discipline on the Tokio runtime
//! - **Protocol codec**: Solivia frame encoding/decoding with CRC-16 and
//!   responder-address validation
//! - **Per-field averaging**: raw bus samples are folded into throttled
//!   averages so consumers see at most one update per interval
//! - **Dual mode**: a gateway-backed controller answers sub-second external
//!   queries from cache while polling the bus at a safe rate
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `frame`: Wire protocol codec and payload parsing
//! - `measurement`: Measurement field kinds and units
//! - `cache`: Per-field throttled averaging
//! - `inverter`: Per-address state and write-once identity cells
//! - `bus`: Serial transport abstraction
//! - `scheduler`: Round-robin poll scheduling and bus transactions
//! - `gateway`: Cache-backed responder for external gateway queries
//! - `driver`: Orchestration and telemetry fan-out
//! - `telemetry`: Consumer-facing sink interface

pub mod bus;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod inverter;
pub mod logging;
pub mod measurement;
pub mod scheduler;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use driver::SoliviaDriver;
pub use error::{FrameError, Result, SoliviaError};
pub use gateway::{GatewayReply, GatewayResponder};
pub use measurement::{Identity, Measurement};
