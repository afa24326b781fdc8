//! Core driver logic for Auriga
//!
//! This module contains the tick driver and the per-entity update logic
//! that coordinates the tariff cache, charge steering and consumption
//! reconciliation components. One periodic tick updates every managed
//! entity sequentially; entities never run concurrently, so each owns its
//! state outright and no internal locking is needed.

pub mod commands;
pub mod entities;
pub mod runtime;

pub use entities::{ChargeSensorEntity, MeterEntity, Registry, TariffEntity};

use crate::config::Config;
use crate::persistence::JsonStateStore;
use chrono_tz::Tz;
use tokio::sync::{mpsc, watch};

/// Main driver state
#[derive(Debug, Clone)]
pub enum DriverState {
    /// Driver is initializing
    Initializing,
    /// Driver is running normally
    Running,
    /// Driver is in error state
    Error(String),
    /// Driver is shutting down
    ShuttingDown,
}

/// Commands accepted by the driver from external components
#[derive(Debug, Clone)]
pub enum DriverCommand {
    /// Force an API refresh for all entities on the next cycle
    ForceRefresh,

    /// Update a charge sensor's price ceiling
    SetMaxRate { sensor_id: String, max_rate: f64 },

    /// Update a charge sensor's charge-hours target
    SetChargeHours { sensor_id: String, charge_hours: u32 },

    /// Write a tariff entity's cached day table to CSV now
    ExportRates { tariff_id: String, yesterday: bool },
}

/// Tick driver owning the entity registry.
pub struct TariffDriver {
    /// Configuration
    config: Config,

    /// Timezone the tariff's local dates are interpreted in
    tz: Tz,

    /// Current driver state
    state: watch::Sender<DriverState>,

    /// Logger with context
    logger: crate::logging::StructuredLogger,

    /// Persistent per-entity state
    store: JsonStateStore,

    /// Managed entities
    registry: Registry,

    /// Shutdown signal
    shutdown_tx: mpsc::UnboundedSender<()>,

    /// Shutdown receiver
    shutdown_rx: mpsc::UnboundedReceiver<()>,

    /// Command receiver for external control
    commands_rx: mpsc::UnboundedReceiver<DriverCommand>,

    /// Tick accounting
    total_ticks: u64,
    overrun_count: u64,
}

impl TariffDriver {
    /// Handle used to request a graceful shutdown between entity updates.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// Subscribe to driver state changes.
    pub fn state_receiver(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }
}
