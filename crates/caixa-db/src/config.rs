//! # Caixa Configuration
//!
//! Settings for the operational clock, the reconciliation rules and the
//! database location.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAIXA_TENANT_ID=...                                                │
//! │     CAIXA_CUTOFF_HOUR=6                                                │
//! │     CAIXA_TZ_OFFSET_MINUTES=-180                                       │
//! │     CAIXA_BREAK_THRESHOLD_CENTS=500                                    │
//! │     CAIXA_DB_PATH=/var/lib/caixa/caixa.db                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/caixa/caixa.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.caixa.caixa/caixa.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     cutoff 06:00, UTC-03:00, threshold 5.00, canonical denominations   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [tenant]
//! id = "00000000-0000-0000-0000-000000000001"
//!
//! [clock]
//! cutoff_hour = 6
//! tz_offset_minutes = -180
//!
//! [reconciliation]
//! break_threshold_cents = 500
//! denominations_cents = [20000, 10000, 5000, 2000, 1000, 500, 200, 100, 50, 25, 10, 5]
//!
//! [database]
//! path = "caixa.db"
//! max_connections = 5
//! ```

use caixa_core::denomination::CANONICAL_DENOMINATIONS_CENTS;
use caixa_core::validation::validate_tenant_id;
use caixa_core::{
    DenominationTable, Money, OperationalClock, DEFAULT_BREAK_THRESHOLD, DEFAULT_CUTOFF_HOUR,
    DEFAULT_TENANT_ID, DEFAULT_TZ_OFFSET_MINUTES,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// Which tenant this deployment reconciles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default = "default_tenant_id")]
    pub id: String,
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

impl Default for TenantSettings {
    fn default() -> Self {
        TenantSettings {
            id: default_tenant_id(),
        }
    }
}

/// Operational-day boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Local hour (0-23) at which a new operational day starts.
    #[serde(default = "default_cutoff_hour")]
    pub cutoff_hour: u32,

    /// Local offset from UTC in minutes. Brazil mainland is -180.
    #[serde(default = "default_tz_offset")]
    pub tz_offset_minutes: i32,
}

fn default_cutoff_hour() -> u32 {
    DEFAULT_CUTOFF_HOUR
}

fn default_tz_offset() -> i32 {
    DEFAULT_TZ_OFFSET_MINUTES
}

impl Default for ClockSettings {
    fn default() -> Self {
        ClockSettings {
            cutoff_hour: default_cutoff_hour(),
            tz_offset_minutes: default_tz_offset(),
        }
    }
}

/// Rules used when comparing expected and counted cash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    /// Largest absolute discrepancy still considered OK.
    #[serde(default = "default_break_threshold")]
    pub break_threshold_cents: i64,

    /// Accepted notes and coins, in cents.
    #[serde(default = "default_denominations")]
    pub denominations_cents: Vec<i64>,
}

fn default_break_threshold() -> i64 {
    DEFAULT_BREAK_THRESHOLD.cents()
}

fn default_denominations() -> Vec<i64> {
    CANONICAL_DENOMINATIONS_CENTS.to_vec()
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        ReconciliationSettings {
            break_threshold_cents: default_break_threshold(),
            denominations_cents: default_denominations(),
        }
    }
}

/// Where the SQLite file lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to `caixa.db` in the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaixaConfig {
    #[serde(default)]
    pub tenant: TenantSettings,

    #[serde(default)]
    pub clock: ClockSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl CaixaConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (caixa.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading caixa config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Caixa config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_tenant_id(&self.tenant.id).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.clock()?;
        self.denomination_table()?;

        if self.reconciliation.break_threshold_cents < 0 {
            return Err(ConfigError::Invalid(
                "break_threshold_cents cannot be negative".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies overrides from a key lookup, usually the process environment.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("CAIXA_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant from environment");
            self.tenant.id = id;
        }

        if let Some(raw) = lookup("CAIXA_CUTOFF_HOUR") {
            match raw.parse() {
                Ok(hour) => self.clock.cutoff_hour = hour,
                Err(_) => warn!(value = %raw, "Ignoring invalid CAIXA_CUTOFF_HOUR"),
            }
        }

        if let Some(raw) = lookup("CAIXA_TZ_OFFSET_MINUTES") {
            match raw.parse() {
                Ok(minutes) => self.clock.tz_offset_minutes = minutes,
                Err(_) => warn!(value = %raw, "Ignoring invalid CAIXA_TZ_OFFSET_MINUTES"),
            }
        }

        if let Some(raw) = lookup("CAIXA_BREAK_THRESHOLD_CENTS") {
            match raw.parse() {
                Ok(cents) => self.reconciliation.break_threshold_cents = cents,
                Err(_) => warn!(value = %raw, "Ignoring invalid CAIXA_BREAK_THRESHOLD_CENTS"),
            }
        }

        if let Some(path) = lookup("CAIXA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "caixa", "caixa")
            .map(|dirs| dirs.config_dir().join("caixa.toml"))
    }

    fn default_database_path() -> PathBuf {
        directories::ProjectDirs::from("com", "caixa", "caixa")
            .map(|dirs| dirs.data_dir().join("caixa.db"))
            .unwrap_or_else(|| PathBuf::from("caixa.db"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the tenant ID.
    pub fn tenant_id(&self) -> &str {
        &self.tenant.id
    }

    /// Builds the operational clock.
    pub fn clock(&self) -> ConfigResult<OperationalClock> {
        OperationalClock::new(self.clock.cutoff_hour, self.clock.tz_offset_minutes)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Builds the denomination table.
    pub fn denomination_table(&self) -> ConfigResult<DenominationTable> {
        DenominationTable::from_cents(&self.reconciliation.denominations_cents)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Returns the break threshold.
    pub fn break_threshold(&self) -> Money {
        Money::from_cents(self.reconciliation.break_threshold_cents)
    }

    /// Builds the database configuration.
    pub fn db_config(&self) -> DbConfig {
        self.db_config_with_path(None)
    }

    /// Builds the database configuration, preferring `path` (a command-line
    /// flag, say) over the configured location.
    pub fn db_config_with_path(&self, path: Option<PathBuf>) -> DbConfig {
        let path = path
            .or_else(|| self.database.path.clone())
            .unwrap_or_else(Self::default_database_path);
        DbConfig::new(path).max_connections(self.database.max_connections)
    }
}
