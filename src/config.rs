//! Configuration management for Auriga
//!
//! This module handles loading, validation, and management of the
//! application configuration from YAML files. Every managed entity kind
//! has a typed configuration struct; malformed values are rejected here,
//! before they can reach the decision logic.

mod defaults;

use crate::charge::PreferredBand;
use crate::consumption::MeterKind;
use crate::error::{AurigaError, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream API connection parameters
    pub octopus: OctopusConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Daily CSV export configuration
    pub export: ExportConfig,

    /// Tariff tracking entities
    pub tariffs: Vec<TariffEntityConfig>,

    /// Charge steering entities
    pub charge_sensors: Vec<ChargeSensorEntityConfig>,

    /// Consumption metering entities
    pub meters: Vec<MeterEntityConfig>,

    /// Polling interval in milliseconds; bounds how late a period
    /// transition can be observed
    pub poll_interval_ms: u64,

    /// IANA timezone the tariff's local dates are interpreted in
    pub timezone: String,

    /// Path of the persistent state file
    pub state_file: String,
}

/// Octopus API connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OctopusConfig {
    /// Base URL of the v1 REST API
    pub base_url: String,

    /// Agile product code the tariff codes are derived from
    pub product_code: String,

    /// API key for authenticated (consumption) endpoints
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: f64,

    /// Tariff price cap; an upper bound for the daily minimum search
    pub capped_rate: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (or its directory)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Daily CSV export configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    /// Whether the 18:00Z daily export runs
    pub enabled: bool,

    /// Directory the CSV files are written into
    pub directory: String,
}

/// One tariff tracking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffEntityConfig {
    /// Entity id, unique across all entity kinds
    pub id: String,

    /// Grid-supply-point letter; resolved from `postcode` when absent
    pub gsp: Option<String>,

    /// Postcode used to resolve the region when `gsp` is not given
    pub postcode: Option<String>,
}

/// One charge steering entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSensorEntityConfig {
    /// Entity id, unique across all entity kinds
    pub id: String,

    /// Id of the tariff entity whose cache this sensor follows
    pub tariff: String,

    /// Clock-time band cheap slots are selected from
    pub band: PreferredBand,

    /// Hours of charge to deliver per band cycle (1..=10)
    pub charge_hours: u32,

    /// Inclusive price ceiling in pence per kWh
    pub max_rate: f64,
}

/// One consumption metering entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterEntityConfig {
    /// Entity id, unique across all entity kinds
    pub id: String,

    /// Supply kind
    pub kind: MeterKind,

    /// Electricity MPAN or gas MPRN
    pub meter_point: String,

    /// Meter serial number
    pub meter_serial: String,

    /// Second-generation smart meter: outside DST the publication window
    /// shifts back to GMT alignment
    #[serde(default)]
    pub smets2: bool,

    /// Convert readings to cost against yesterday's cached rates
    /// (electricity only, requires `tariff`)
    #[serde(default)]
    pub calculate_costs: bool,

    /// Tariff entity supplying historical rates for cost calculation
    pub tariff: Option<String>,

    /// Also write a daily history CSV for this meter
    #[serde(default)]
    pub export: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "auriga_config.yaml",
            "/data/auriga_config.yaml",
            "/etc/auriga/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// The configured timezone, parsed.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| AurigaError::validation("timezone".to_string(), self.timezone.clone()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(AurigaError::validation(
                "poll_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.octopus.request_timeout_secs <= 0.0 {
            return Err(AurigaError::validation(
                "octopus.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if !self.octopus.capped_rate.is_finite() {
            return Err(AurigaError::validation(
                "octopus.capped_rate",
                "Must be a number",
            ));
        }

        self.tz()?;

        let mut ids = HashSet::new();
        let tariff_ids: HashSet<&str> = self.tariffs.iter().map(|t| t.id.as_str()).collect();

        for tariff in &self.tariffs {
            if !ids.insert(tariff.id.as_str()) {
                return Err(AurigaError::validation(
                    "tariffs.id".to_string(),
                    format!("Duplicate entity id {}", tariff.id),
                ));
            }
            if tariff.gsp.as_deref().unwrap_or("").is_empty()
                && tariff.postcode.as_deref().unwrap_or("").is_empty()
            {
                return Err(AurigaError::validation(
                    "tariffs.postcode".to_string(),
                    format!("Tariff {} needs a gsp letter or a postcode", tariff.id),
                ));
            }
        }

        for sensor in &self.charge_sensors {
            if !ids.insert(sensor.id.as_str()) {
                return Err(AurigaError::validation(
                    "charge_sensors.id".to_string(),
                    format!("Duplicate entity id {}", sensor.id),
                ));
            }
            if sensor.charge_hours < 1 || sensor.charge_hours > 10 {
                return Err(AurigaError::validation(
                    "charge_sensors.charge_hours".to_string(),
                    format!(
                        "Must be between 1 and 10 for {} (got {})",
                        sensor.id, sensor.charge_hours
                    ),
                ));
            }
            if !sensor.max_rate.is_finite() {
                return Err(AurigaError::validation(
                    "charge_sensors.max_rate".to_string(),
                    format!("Must be a number for {}", sensor.id),
                ));
            }
            if !tariff_ids.contains(sensor.tariff.as_str()) {
                return Err(AurigaError::validation(
                    "charge_sensors.tariff".to_string(),
                    format!("Sensor {} references unknown tariff {}", sensor.id, sensor.tariff),
                ));
            }
        }

        for meter in &self.meters {
            if !ids.insert(meter.id.as_str()) {
                return Err(AurigaError::validation(
                    "meters.id".to_string(),
                    format!("Duplicate entity id {}", meter.id),
                ));
            }
            if meter.meter_point.is_empty() || meter.meter_serial.is_empty() {
                return Err(AurigaError::validation(
                    "meters.meter_point".to_string(),
                    format!("Meter {} needs a meter point and serial", meter.id),
                ));
            }
            if meter.calculate_costs {
                if meter.kind != MeterKind::Electricity {
                    return Err(AurigaError::validation(
                        "meters.calculate_costs".to_string(),
                        format!("Cost calculation is electricity-only for {}", meter.id),
                    ));
                }
                if meter.tariff.is_none() {
                    return Err(AurigaError::validation(
                        "meters.tariff".to_string(),
                        format!("Meter {} needs a linked tariff for cost calculation", meter.id),
                    ));
                }
            }
            if let Some(tariff) = meter.tariff.as_deref()
                && !tariff_ids.contains(tariff)
            {
                return Err(AurigaError::validation(
                    "meters.tariff".to_string(),
                    format!("Meter {} references unknown tariff {}", meter.id, tariff),
                ));
            }
            if (meter.calculate_costs || meter.export) && self.octopus.api_key.is_none() {
                return Err(AurigaError::validation(
                    "octopus.api_key".to_string(),
                    format!("Meter {} requires an API key", meter.id),
                ));
            }
        }

        if self.export.enabled && self.export.directory.is_empty() {
            return Err(AurigaError::validation(
                "export.directory",
                "Must be set when export is enabled",
            ));
        }

        Ok(())
    }
}
