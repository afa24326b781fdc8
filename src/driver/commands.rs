use super::{DriverCommand, TariffDriver};

impl TariffDriver {
    pub(crate) async fn handle_command(&mut self, cmd: DriverCommand) {
        match cmd {
            DriverCommand::ForceRefresh => self.force_refresh(),
            DriverCommand::SetMaxRate {
                sensor_id,
                max_rate,
            } => self.set_max_rate(&sensor_id, max_rate),
            DriverCommand::SetChargeHours {
                sensor_id,
                charge_hours,
            } => self.set_charge_hours(&sensor_id, charge_hours),
            DriverCommand::ExportRates {
                tariff_id,
                yesterday,
            } => self.export_rates(&tariff_id, yesterday),
        }
    }

    /// Force an API refresh on all entities at the next cycle
    fn force_refresh(&mut self) {
        for tariff in self.registry.tariffs.values_mut() {
            tariff.request_refresh();
        }
        for meter in self.registry.meters.values_mut() {
            meter.request_refresh();
        }
    }

    fn set_max_rate(&mut self, sensor_id: &str, max_rate: f64) {
        if !max_rate.is_finite() {
            self.logger
                .error("Invalid entry for max rate - must be a whole or decimal number");
            return;
        }
        match self.registry.sensors.get_mut(sensor_id) {
            Some(sensor) => {
                if let Err(e) = sensor.set_max_rate(max_rate, &mut self.store) {
                    self.logger
                        .error(&format!("Failed to update max rate: {}", e));
                }
            }
            None => self
                .logger
                .error(&format!("No charge sensor with id {}", sensor_id)),
        }
    }

    fn set_charge_hours(&mut self, sensor_id: &str, charge_hours: u32) {
        if !(1..=10).contains(&charge_hours) {
            self.logger
                .error("Invalid entry for charging hours - must be between 1 and 10");
            return;
        }
        match self.registry.sensors.get_mut(sensor_id) {
            Some(sensor) => {
                if let Err(e) = sensor.set_charge_hours(charge_hours, &mut self.store) {
                    self.logger
                        .error(&format!("Failed to update charge hours: {}", e));
                }
            }
            None => self
                .logger
                .error(&format!("No charge sensor with id {}", sensor_id)),
        }
    }

    fn export_rates(&mut self, tariff_id: &str, yesterday: bool) {
        match self.registry.tariffs.get(tariff_id) {
            Some(tariff) => {
                if let Err(e) = tariff.export_rates(&self.config.export, yesterday) {
                    self.logger.error(&format!("Export failed: {}", e));
                }
            }
            None => self
                .logger
                .error(&format!("No tariff entity with id {}", tariff_id)),
        }
    }
}
