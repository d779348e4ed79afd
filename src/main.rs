use anyhow::Result;
use solivia::driver::SoliviaDriver;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the driver (loads config, sets up logging, opens the bus)
    let mut driver =
        SoliviaDriver::new().map_err(|e| anyhow::anyhow!("Failed to create driver: {}", e))?;

    info!("Solivia inverter driver {} starting up", env!("APP_VERSION"));

    // Translate Ctrl-C into a driver shutdown
    let shutdown = driver.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    match driver.run().await {
        Ok(()) => {
            info!("Driver shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Driver failed with error: {}", e);
            Err(anyhow::anyhow!("Driver error: {}", e))
        }
    }
}
