//! # Auriga - Agile Tariff Tracker and Charge Steering Daemon
//!
//! A Rust daemon that tracks the half-hourly Octopus Energy agile tariff,
//! maintains a rolling cache of today's and yesterday's rates, derives
//! daily statistics and lowest-cost windows, steers deferrable loads
//! through a price-aware charging signal, and reconciles day-old metered
//! consumption into per-period costs.
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `period`: Half-hour period identity and boundary detection
//! - `tariff`: Rate tables and the per-entity tariff cache
//! - `stats`: Daily statistics and lowest-cost window search
//! - `charge`: Preferred-period charge steering
//! - `consumption`: Metered consumption reconciliation
//! - `octopus`: Octopus Energy REST API client
//! - `driver`: Tick driver and per-entity orchestration
//! - `persistence`: State persistence and recovery
//! - `export`: Daily CSV export

pub mod charge;
pub mod config;
pub mod consumption;
pub mod driver;
pub mod error;
pub mod export;
pub mod logging;
pub mod octopus;
pub mod period;
pub mod persistence;
pub mod stats;
pub mod tariff;

// Re-export commonly used types
pub use config::Config;
pub use driver::{DriverCommand, TariffDriver};
pub use error::{AurigaError, Result};
