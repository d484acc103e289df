//! Application configuration
//!
//! Loaded from TOML (`~/.config/energy-billing/config.toml` by default,
//! overridden by `BILLING_CONFIG`). Every section has defaults, so a partial
//! file only needs the values it changes:
//!
//! ```toml
//! [database]
//! url = "sqlite://./billing.db?mode=rwc"
//!
//! [billing]
//! page_size = 200
//! worker_pool_size = 8
//! reference_timezone = "Australia/Sydney"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::application::billing::BillingJobConfig;
use crate::infrastructure::DatabaseConfig;
use crate::shared::errors::InfraError;
use crate::shared::utills::RetryConfig;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "BILLING_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
    pub billing: BillingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Seconds to wait for an in-flight billing run on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { shutdown_timeout: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            url: defaults.url,
            max_connections: defaults.max_connections,
        }
    }
}

impl From<&DatabaseSettings> for DatabaseConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        DatabaseConfig {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// EnvFilter directive, e.g. "info" or "energy_billing=debug"
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// Prometheus scrape endpoint
    pub listen_addr: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "0.0.0.0:9100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Customers fetched per page
    pub page_size: u64,
    /// Concurrent invoice tasks
    pub worker_pool_size: usize,
    /// IANA zone whose calendar months define billing periods
    pub reference_timezone: String,
    /// Day of month (1-28) the scheduled run fires
    pub run_day: u32,
    /// Local hour (0-23) the scheduled run fires
    pub run_hour: u32,
    /// Due date offset from period end
    pub payment_terms_days: u32,
    /// Attempts for each customer page fetch
    pub page_fetch_retries: u32,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            worker_pool_size: 4,
            reference_timezone: "Asia/Singapore".to_string(),
            run_day: 1,
            run_hour: 2,
            payment_terms_days: 14,
            page_fetch_retries: 3,
        }
    }
}

impl BillingSettings {
    pub fn timezone(&self) -> Result<Tz, InfraError> {
        self.reference_timezone.parse::<Tz>().map_err(|e| {
            InfraError::Invalid(format!(
                "billing.reference_timezone '{}': {}",
                self.reference_timezone, e
            ))
        })
    }

    pub fn job_config(&self) -> Result<BillingJobConfig, InfraError> {
        Ok(BillingJobConfig {
            page_size: self.page_size,
            reference_timezone: self.timezone()?,
            page_fetch_retry: RetryConfig::default()
                .with_max_attempts(self.page_fetch_retries)
                .with_initial_delay(Duration::from_millis(500)),
        })
    }
}

impl AppConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), InfraError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| InfraError::Invalid(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        let billing = &self.billing;
        if billing.page_size == 0 {
            return Err(InfraError::Invalid("billing.page_size must be positive".into()));
        }
        if billing.worker_pool_size == 0 {
            return Err(InfraError::Invalid(
                "billing.worker_pool_size must be positive".into(),
            ));
        }
        if !(1..=28).contains(&billing.run_day) {
            return Err(InfraError::Invalid("billing.run_day must be within 1..=28".into()));
        }
        if billing.run_hour > 23 {
            return Err(InfraError::Invalid("billing.run_hour must be within 0..=23".into()));
        }
        if billing.page_fetch_retries == 0 {
            return Err(InfraError::Invalid(
                "billing.page_fetch_retries must be at least 1".into(),
            ));
        }
        billing.timezone()?;
        Ok(())
    }
}

/// `~/.config/energy-billing/config.toml` (platform config dir)
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("energy-billing")
        .join("config.toml")
}

/// `BILLING_CONFIG` if set, else [`default_config_path`]
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path())
}
