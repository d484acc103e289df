//! Energy billing service
//!
//! Runs the monthly billing scheduler until SIGTERM/SIGINT.
//! Reads configuration from TOML (~/.config/energy-billing/config.toml,
//! or the path in `BILLING_CONFIG`).

use tracing::{error, info, warn};

use energy_billing::config::{config_path_from_env, AppConfig};
use energy_billing::server::{init_tracing, ServerHandle, ServerOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path_from_env();
    let (config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => warn!(
            "Failed to load config from {}: {}. Using defaults.",
            config_path.display(),
            e
        ),
    }

    let handle = match ServerHandle::start(ServerOptions {
        config,
        ..Default::default()
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start billing service: {}", e);
            return Err(e);
        }
    };

    handle.install_signal_handler();
    handle.wait().await;
    Ok(())
}
