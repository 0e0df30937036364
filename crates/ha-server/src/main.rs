//! Home Assistant Rust Server
//!
//! Loads `configuration.yaml`, imports every configured BlueConnect lock
//! as a config entry and keeps the locks set up until interrupted.

mod hass;
mod import;
mod radio;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::hass::HomeAssistant;

/// How often the emulated radio re-advertises every lock
const ADVERTISEMENT_INTERVAL: Duration = Duration::from_secs(10);

/// Directory holding `configuration.yaml`: first argument, then
/// `HA_CONFIG_DIR`, then `./config`
fn config_dir() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HA_CONFIG_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_dir = config_dir();
    info!(config_dir = %config_dir.display(), "Starting Home Assistant (Rust)");

    let config = ha_config::IntegrationsConfig::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;

    let hass = HomeAssistant::new(&config);
    let imported = hass.import_locks(&config.blueconnect)?;
    info!(locks = imported.len(), "Imported lock config entries");

    let radio = radio::spawn(
        hass.bluetooth.clone(),
        hass.connector.clone(),
        config.blueconnect.clone(),
        ADVERTISEMENT_INTERVAL,
    );

    for (entry_id, result) in hass.entries.setup_all().await {
        if let Err(err) = result {
            warn!(%entry_id, error = %err, "Config entry did not set up");
        }
    }
    info!(entities = hass.states.entity_count(), "Home Assistant is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    radio.call();
    hass.stop().await;
    Ok(())
}
