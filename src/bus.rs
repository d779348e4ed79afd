//! Serial bus transport
//!
//! The bus is half-duplex and multidrop: one controller, several inverters,
//! one wire. [`BusTransport`] is the seam the scheduler talks through, kept
//! as a trait so tests can script bus behavior without hardware. The real
//! implementation, [`SerialBus`], drives a serial port via tokio-serial with
//! optional RTS-based line direction control for RS-485 adapters that need
//! explicit driver-enable switching.

use crate::config::SerialConfig;
use crate::error::{Result, SoliviaError};
use crate::logging::get_logger;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// Abstraction over the shared serial line.
///
/// Exactly one component (the poll scheduler) owns a transport handle; no
/// interleaved transactions are possible through a single instance.
#[async_trait::async_trait]
pub trait BusTransport: Send {
    /// Write a complete frame to the bus.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read whatever bytes arrive within `max_wait`.
    ///
    /// Returns an empty buffer when nothing arrived in time; short reads are
    /// normal and reassembled by the caller.
    async fn read(&mut self, max_wait: Duration) -> Result<Vec<u8>>;

    /// Half-duplex flow-control hook: raised immediately before writing,
    /// dropped once the write has flushed so the line can turn around.
    /// Default: no-op (transports with automatic direction control).
    fn set_transmit(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

/// Serial port transport for the RS-485 bus.
pub struct SerialBus {
    stream: SerialStream,
    rts_flow_control: bool,
    logger: crate::logging::StructuredLogger,
}

impl SerialBus {
    /// Open the configured serial port.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let logger = get_logger("bus");
        logger.info(&format!(
            "Opening serial port {} at {} baud",
            config.port, config.baud_rate
        ));

        let stream = tokio_serial::new(&config.port, config.baud_rate)
            .open_native_async()
            .map_err(|e| {
                SoliviaError::serial(format!("Failed to open {}: {}", config.port, e))
            })?;

        Ok(Self {
            stream,
            rts_flow_control: config.rts_flow_control,
            logger,
        })
    }
}

#[async_trait::async_trait]
impl BusTransport for SerialBus {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| SoliviaError::serial(format!("Write failed: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| SoliviaError::serial(format!("Flush failed: {}", e)))?;
        self.logger.trace(&format!("Wrote {} bytes", bytes.len()));
        Ok(())
    }

    async fn read(&mut self, max_wait: Duration) -> Result<Vec<u8>> {
        let mut buf = [0u8; 256];
        match timeout(max_wait, self.stream.read(&mut buf)).await {
            Ok(Ok(n)) => {
                self.logger.trace(&format!("Read {} bytes", n));
                Ok(buf[..n].to_vec())
            }
            Ok(Err(e)) => Err(SoliviaError::serial(format!("Read failed: {}", e))),
            // Timeout: nothing arrived, which is a normal outcome on a
            // multidrop bus; the scheduler decides what it means.
            Err(_) => Ok(Vec::new()),
        }
    }

    fn set_transmit(&mut self, enabled: bool) -> Result<()> {
        if !self.rts_flow_control {
            return Ok(());
        }
        self.stream
            .write_request_to_send(enabled)
            .map_err(|e| SoliviaError::serial(format!("RTS toggle failed: {}", e)))
    }
}
