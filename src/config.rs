//! Application configuration
//!
//! Loaded from a TOML file, by default
//! `~/.config/texnouz-billing/config.toml`. Every section and field is
//! optional; missing values take the defaults below.
//!
//! ```toml
//! [server]
//! api_port = 8080
//! ws_port = 9000
//!
//! [billing]
//! floor_threshold = "30"
//! poll_interval_secs = 60
//!
//! [[providers.wallets]]
//! id_tag = "TAG-001"
//! balance = "250"
//! unit_rate = "8"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::{DEFAULT_FLAT_TAX_PERCENT, DEFAULT_FLOOR_THRESHOLD};
use crate::domain::{ChargingSchedule, TariffClock, TariffWindow, WalletSnapshot};

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "BILLING_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `$BILLING_CONFIG`, else `~/.config/texnouz-billing/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texnouz-billing")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseSettings,
    pub billing: BillingConfig,
    pub commands: CommandsConfig,
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.billing.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "billing.poll_interval_secs must be positive".into(),
            ));
        }
        if self.billing.floor_threshold < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "billing.floor_threshold must not be negative".into(),
            ));
        }
        if self.billing.tariff_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(format!(
                "billing.tariff_utc_offset_minutes out of range: {}",
                self.billing.tariff_utc_offset_minutes
            )));
        }
        if self.commands.response_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "commands.response_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── Sections ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    pub ws_host: String,
    pub ws_port: u16,
    /// Heartbeat interval handed to chargers on boot
    pub heartbeat_interval: u32,
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9000,
            heartbeat_interval: 300,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn ws_address(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG` takes precedence when set
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Keep everything in process memory instead of SQLite
    pub in_memory: bool,
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            in_memory: false,
            url: "sqlite://./billing.db?mode=rwc".to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> &str {
        if self.in_memory {
            "memory"
        } else {
            &self.url
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Remaining balance at or below which every open session is stopped
    pub floor_threshold: Decimal,
    pub poll_interval_secs: u64,
    /// Tax applied by the streaming guard on the flat rate
    pub flat_tax_percent: Decimal,
    /// Offset of the local time tariffs and schedules are written in
    pub tariff_utc_offset_minutes: i32,
    pub stop_cooldown_secs: u64,
    /// How long a last-energy baseline lives without being touched
    pub energy_cache_ttl_secs: u64,
    /// How long an unconsumed stop reason is kept
    pub stop_reason_ttl_secs: u64,
    pub schedule_interval_secs: u64,
    pub schedule_tolerance_secs: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            floor_threshold: DEFAULT_FLOOR_THRESHOLD,
            poll_interval_secs: 60,
            flat_tax_percent: DEFAULT_FLAT_TAX_PERCENT,
            tariff_utc_offset_minutes: 330,
            stop_cooldown_secs: 60,
            energy_cache_ttl_secs: 24 * 3600,
            stop_reason_ttl_secs: 24 * 3600,
            schedule_interval_secs: 30,
            schedule_tolerance_secs: 60,
        }
    }
}

impl BillingConfig {
    pub fn clock(&self) -> TariffClock {
        TariffClock::from_offset_minutes(self.tariff_utc_offset_minutes)
    }

    pub fn stop_cooldown(&self) -> Duration {
        Duration::from_secs(self.stop_cooldown_secs)
    }

    pub fn energy_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.energy_cache_ttl_secs)
    }

    pub fn stop_reason_ttl(&self) -> Duration {
        Duration::from_secs(self.stop_reason_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// How long to wait for a charger to answer a remote command
    pub response_timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 30,
        }
    }
}

impl CommandsConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

/// Static provider tables for standalone runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub wallets: Vec<WalletEntry>,
    /// Tariff windows per charge box id
    pub tariffs: HashMap<String, Vec<TariffWindow>>,
    /// Windows for chargers without their own table
    pub default_tariff: Vec<TariffWindow>,
    pub schedules: Vec<ChargingSchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id_tag: String,
    pub balance: Decimal,
    #[serde(default = "default_unit_rate")]
    pub unit_rate: Decimal,
}

fn default_unit_rate() -> Decimal {
    dec!(0)
}

impl ProvidersConfig {
    pub fn wallet_snapshots(&self) -> Vec<(String, WalletSnapshot)> {
        self.wallets
            .iter()
            .map(|w| (w.id_tag.clone(), WalletSnapshot::new(w.balance, w.unit_rate)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.billing.floor_threshold, dec!(30));
        assert_eq!(config.billing.flat_tax_percent, dec!(18));
        assert_eq!(config.billing.tariff_utc_offset_minutes, 330);
        assert_eq!(config.server.ws_address(), "0.0.0.0:9000");
        assert!(!config.database.in_memory);
    }

    #[test]
    fn provider_tables_are_parsed() {
        let config = AppConfig::from_toml_str(
            r#"
            [billing]
            floor_threshold = "50"
            poll_interval_secs = 15

            [[providers.wallets]]
            id_tag = "TAG-001"
            balance = "250.5"
            unit_rate = "8"

            [[providers.tariffs.CP001]]
            start_time = "06:00:00"
            end_time = "22:00:00"
            unit_rate = "10"
            tax_rate_percent = "18"

            [[providers.schedules]]
            charger_id = "CP001"
            connector_id = 1
            id_tag = "TAG-001"
            start = "2024-05-01T22:00:00"
            end = "2024-05-02T06:00:00"
            "#,
        )
        .unwrap();

        assert_eq!(config.billing.floor_threshold, dec!(50));
        assert_eq!(config.billing.poll_interval_secs, 15);
        assert_eq!(
            config.providers.wallet_snapshots(),
            vec![("TAG-001".to_string(), WalletSnapshot::new(dec!(250.5), dec!(8)))]
        );
        assert_eq!(config.providers.tariffs["CP001"][0].unit_rate, dec!(10));
        assert_eq!(config.providers.schedules.len(), 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_toml_str("[billing]\npoll_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_toml_str("[server\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
