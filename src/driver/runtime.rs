use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, interval};

use crate::error::{AurigaError, Result};
use crate::octopus::{OctopusClient, RateSource};

use super::entities::{ChargeSensorEntity, MeterEntity, Registry, TariffEntity};
use super::{DriverCommand, DriverState, TariffDriver};

impl TariffDriver {
    /// Create a new driver instance
    pub async fn new(commands_rx: mpsc::UnboundedReceiver<DriverCommand>) -> Result<Self> {
        let config = crate::config::Config::load().map_err(|e| {
            eprintln!("Failed to load configuration: {}", e);
            e
        })?;

        // Initialize logging
        crate::logging::init_logging(&config.logging)?;

        config.validate()?;
        let tz = config.tz()?;

        let logger = crate::logging::get_logger("driver");
        logger.info("Initializing agile tariff driver");

        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(DriverState::Initializing);

        // Load persisted entity state (best-effort)
        let mut store = crate::persistence::JsonStateStore::new(&config.state_file);
        let _ = store.load();

        // Build the registry: tariffs first so sensors and meters can
        // share their API clients
        let mut registry = Registry::default();
        for tariff_config in &config.tariffs {
            let gsp = match tariff_config.gsp.as_deref() {
                Some(gsp) if !gsp.is_empty() => gsp.to_string(),
                _ => {
                    let postcode = tariff_config.postcode.as_deref().unwrap_or("");
                    let gsp =
                        OctopusClient::resolve_region_for(&config.octopus, postcode).await?;
                    logger.info(&format!(
                        "Resolved postcode {} to grid supply point {}",
                        postcode, gsp
                    ));
                    gsp
                }
            };
            let source: Arc<dyn RateSource> =
                Arc::new(OctopusClient::new(&config.octopus, &gsp)?);
            registry.tariffs.insert(
                tariff_config.id.clone(),
                TariffEntity::new(
                    tariff_config,
                    source,
                    config.octopus.capped_rate,
                    &store,
                ),
            );
        }

        for sensor_config in &config.charge_sensors {
            registry.sensors.insert(
                sensor_config.id.clone(),
                ChargeSensorEntity::new(sensor_config, &store),
            );
        }

        for meter_config in &config.meters {
            // Consumption endpoints are region-independent; reuse the
            // linked tariff's client where there is one
            let source: Arc<dyn RateSource> = match meter_config
                .tariff
                .as_deref()
                .and_then(|id| registry.tariffs.get(id))
            {
                Some(tariff) => Arc::clone(&tariff.source),
                None => Arc::new(OctopusClient::new(&config.octopus, "A")?),
            };
            registry.meters.insert(
                meter_config.id.clone(),
                MeterEntity::new(meter_config, source, &store),
            );
        }

        Ok(Self {
            config,
            tz,
            state: state_tx,
            logger,
            store,
            registry,
            shutdown_tx,
            shutdown_rx,
            commands_rx,
            total_ticks: 0,
            overrun_count: 0,
        })
    }

    /// Run the driver main loop
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting agile tariff driver main loop");

        self.state.send(DriverState::Running).ok();

        let mut poll_interval = interval(Duration::from_millis(self.config.poll_interval_ms));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    let tick_started = std::time::Instant::now();
                    self.tick_cycle().await;
                    let dur_ms = tick_started.elapsed().as_millis() as u64;
                    self.total_ticks = self.total_ticks.saturating_add(1);
                    if dur_ms > self.config.poll_interval_ms {
                        self.overrun_count = self.overrun_count.saturating_add(1);
                    }
                }
                Some(cmd) = self.commands_rx.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    self.logger.info("Interrupt received");
                    break;
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        // Shutdown sequence
        self.state.send(DriverState::ShuttingDown).ok();
        self.shutdown()?;

        Ok(())
    }

    /// Single tick cycle: update every entity sequentially. Each entity
    /// yields its own result; one failing entity never stops the others.
    pub(crate) async fn tick_cycle(&mut self) {
        let now = chrono::Utc::now();
        self.logger.debug("Starting tick cycle");

        let Registry {
            tariffs,
            sensors,
            meters,
        } = &mut self.registry;

        for tariff in tariffs.values_mut() {
            if let Err(e) = tariff
                .update(now, self.tz, &mut self.store, &self.config.export)
                .await
            {
                self.logger
                    .error(&format!("Tariff {} update failed: {}", tariff.id, e));
            }
        }

        for sensor in sensors.values_mut() {
            let tariff = tariffs.get(&sensor.tariff_id);
            if let Err(e) = sensor.update(now, self.tz, tariff, &mut self.store) {
                self.logger
                    .error(&format!("Charge sensor {} update failed: {}", sensor.id, e));
            }
        }

        for meter in meters.values_mut() {
            let tariff = meter_tariff(tariffs, meter);
            if let Err(e) = meter
                .update(now, self.tz, tariff, &mut self.store, &self.config.export)
                .await
            {
                self.logger
                    .error(&format!("Meter {} update failed: {}", meter.id, e));
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.store
            .save()
            .map_err(|e| AurigaError::io(format!("Failed to persist state on shutdown: {}", e)))?;
        self.logger.info(&format!(
            "Driver shutdown complete ({} ticks, {} overruns)",
            self.total_ticks, self.overrun_count
        ));
        Ok(())
    }
}

fn meter_tariff<'a>(
    tariffs: &'a std::collections::HashMap<String, TariffEntity>,
    meter: &MeterEntity,
) -> Option<&'a TariffEntity> {
    meter.tariff_id().and_then(|id| tariffs.get(id))
}
