use anyhow::Result;
use auriga::driver::{DriverCommand, TariffDriver};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Command channel for external control (force refresh, setting
    // changes); the sender side is kept for future control surfaces
    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel::<DriverCommand>();

    // Initialize the driver with command receiver
    let mut driver = TariffDriver::new(cmd_rx)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create driver: {}", e))?;

    info!("Auriga agile tariff driver starting up");

    match driver.run().await {
        Ok(_) => {
            info!("Driver shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Driver failed with error: {}", e);
            Err(anyhow::anyhow!("Driver error: {}", e))
        }
    }
}
