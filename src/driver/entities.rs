//! Managed entities and the registry
//!
//! Every unit the driver manages is an entry in an explicit [`Registry`]:
//! tariff trackers own a rate cache, charge sensors follow one tariff's
//! cache read-only, and meters reconcile day-old consumption. Entities
//! publish their derived state through the state store once per cycle and
//! restore from it at startup, so no history replay is needed.

use crate::charge::{ChargeControllerState, ChargeDecisionEngine, ChargeParameters};
use crate::config::{ChargeSensorEntityConfig, ExportConfig, MeterEntityConfig, TariffEntityConfig};
use crate::consumption::{self, MeterKind};
use crate::error::{AurigaError, Result};
use crate::export;
use crate::logging::get_entity_logger;
use crate::octopus::{MeterPoint, RateSource, consumption_window};
use crate::period::{PeriodId, current_period, has_crossed_boundary};
use crate::persistence::{StateStore, decode};
use crate::stats::{StatWindow, daily_stats, lowest_cost_windows};
use crate::tariff::{DayRateTable, TariffCacheEntry};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// All managed entities, keyed by entity id. Lifecycle is explicit:
/// entries are added at driver startup and removed when a unit stops
/// being managed.
#[derive(Default)]
pub struct Registry {
    pub tariffs: HashMap<String, TariffEntity>,
    pub sensors: HashMap<String, ChargeSensorEntity>,
    pub meters: HashMap<String, MeterEntity>,
}

/// Marker stored in `api_today` while the upstream refresh is failing.
const API_REFRESH_FAILED: &str = "API Refresh Failed";

/// Marker stored in `api_today` while meter data is not yet published.
const METER_DATA_UNAVAILABLE: &str = "Meter Data Not Available";

/// State-store labels for the lowest-cost windows, by slot count.
fn window_label(length_slots: usize) -> Option<&'static str> {
    match length_slots {
        1 => Some("30m"),
        2 => Some("1h"),
        4 => Some("2h"),
        6 => Some("3h"),
        8 => Some("4h"),
        _ => None,
    }
}

/// One tariff tracking unit. Owns its cache exclusively; sensors read it
/// through the registry but never write.
pub struct TariffEntity {
    pub id: String,
    pub source: Arc<dyn RateSource>,
    pub cache: TariffCacheEntry,
    last_period: Option<PeriodId>,
    capped_rate: f64,
    logger: crate::logging::StructuredLogger,
}

impl TariffEntity {
    /// Create the entity, restoring cached tables and scalars from the
    /// state store where present.
    pub fn new(
        config: &TariffEntityConfig,
        source: Arc<dyn RateSource>,
        capped_rate: f64,
        store: &dyn StateStore,
    ) -> Self {
        let cache = TariffCacheEntry {
            today: restore_table(store, &config.id, "today_rates"),
            yesterday: restore_table(store, &config.id, "yesterday_rates"),
            last_refreshed: decode::<String>(store.get(&config.id, "api_today"))
                .and_then(|s| s.parse().ok()),
            afternoon_refresh_done: decode::<bool>(store.get(&config.id, "api_afternoon_refresh"))
                .unwrap_or(false),
            standing_charge: decode(store.get(&config.id, "daily_standing_charge")),
            yesterday_standing_charge: decode(store.get(&config.id, "yesterday_standing_charge")),
        };

        let last_period = decode::<String>(store.get(&config.id, "current_from_period"))
            .and_then(|s| PeriodId::parse(&s).ok());

        Self {
            id: config.id.clone(),
            source,
            cache,
            last_period,
            capped_rate,
            logger: get_entity_logger("tariff", &config.id),
        }
    }

    /// Mark the cache stale so the next cycle refreshes from the API.
    pub fn request_refresh(&mut self) {
        self.cache.last_refreshed = None;
        self.logger.info("Set for refresh on next cycle");
    }

    /// Update the entity for this tick. No-op until a period boundary is
    /// crossed; then the cache is refreshed if stale and all derived state
    /// is recomputed and published.
    pub async fn update(
        &mut self,
        now: DateTime<Utc>,
        tz: Tz,
        store: &mut dyn StateStore,
        export_config: &ExportConfig,
    ) -> Result<()> {
        if !has_crossed_boundary(self.last_period.as_ref(), now) {
            return Ok(());
        }
        let period = current_period(now);
        let local_today = now.with_timezone(&tz).date_naive();

        let refresh_result = self.cache.refresh_if_needed(&*self.source, now, tz).await;

        let mut updates = Map::new();
        match &refresh_result {
            Ok(_) => {
                if let Some(date) = self.cache.last_refreshed {
                    updates.insert("api_today".to_string(), json!(date.to_string()));
                }
            }
            Err(e) => {
                self.logger
                    .error(&format!("Octopus API refresh failure: {}", e));
                updates.insert("api_today".to_string(), json!(API_REFRESH_FAILED));
            }
        }
        updates.insert(
            "api_afternoon_refresh".to_string(),
            json!(self.cache.afternoon_refresh_done),
        );

        if let Some(today) = self.cache.today.clone() {
            self.publish_day_stats(&mut updates, &today, "daily");
            self.publish_windows(&mut updates, &today);
            updates.insert("today_rates".to_string(), serde_json::to_value(&today)?);

            match today.rate_at(period) {
                Some(rate) => {
                    self.logger
                        .info(&format!("Current rate inc vat is {}p", rate));
                    updates.insert("current_rate".to_string(), json!(rate));
                    updates.insert("current_from_period".to_string(), json!(period.label()));
                }
                None => {
                    // Will correct once the API publishes the period
                    self.logger
                        .error("Rate information not available - possible API error");
                }
            }

            if export_config.enabled && period.is_export_slot(local_today) {
                match export::export_rates_csv(
                    Path::new(&export_config.directory),
                    local_today,
                    &self.id,
                    &today,
                ) {
                    Ok(path) => self
                        .logger
                        .info(&format!("Created CSV file {}", path.display())),
                    Err(e) => self.logger.error(&format!("CSV export failed: {}", e)),
                }
            }
        }

        if let Some(yesterday) = self.cache.yesterday.clone() {
            self.publish_day_stats(&mut updates, &yesterday, "yesterday");
            updates.insert(
                "yesterday_rates".to_string(),
                serde_json::to_value(&yesterday)?,
            );
        }

        if let Some(charge) = self.cache.standing_charge {
            updates.insert("daily_standing_charge".to_string(), json!(charge));
        }
        if let Some(charge) = self.cache.yesterday_standing_charge {
            updates.insert("yesterday_standing_charge".to_string(), json!(charge));
        }

        store.set_all(&self.id, updates)?;
        self.last_period = Some(period);

        refresh_result.map(|_| ())
    }

    fn publish_day_stats(&self, updates: &mut Map<String, Value>, table: &DayRateTable, prefix: &str) {
        if let Some(stats) = daily_stats(table) {
            // The published minimum is bounded by the tariff price cap
            updates.insert(
                format!("{}_min_rate", prefix),
                json!(stats.min.min(self.capped_rate)),
            );
            updates.insert(format!("{}_max_rate", prefix), json!(stats.max));
            updates.insert(format!("{}_average_rate", prefix), json!(stats.average));
        }
    }

    fn publish_windows(&self, updates: &mut Map<String, Value>, table: &DayRateTable) {
        for window in lowest_cost_windows(table) {
            let StatWindow {
                length_slots,
                start,
                average_rate,
            } = window;
            if let Some(label) = window_label(length_slots) {
                updates.insert(format!("lowest_{}_cost", label), json!(average_rate));
                updates.insert(
                    format!("lowest_{}_time", label),
                    json!(start.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                );
            }
        }
    }

    /// Export a cached day table on operator demand.
    pub fn export_rates(&self, export_config: &ExportConfig, yesterday: bool) -> Result<()> {
        let (table, date_hint) = if yesterday {
            (&self.cache.yesterday, "yesterday")
        } else {
            (&self.cache.today, "today")
        };
        let Some(table) = table else {
            return Err(AurigaError::generic(format!(
                "No cached {} rates to export for {}",
                date_hint, self.id
            )));
        };
        let path = export::export_rates_csv(
            Path::new(&export_config.directory),
            table.date,
            &self.id,
            table,
        )?;
        self.logger
            .info(&format!("Created CSV file {}", path.display()));
        Ok(())
    }
}

/// One charge steering unit following a tariff entity's cache.
pub struct ChargeSensorEntity {
    pub id: String,
    pub tariff_id: String,
    engine: ChargeDecisionEngine,
    logger: crate::logging::StructuredLogger,
}

impl ChargeSensorEntity {
    /// Create the entity, restoring delivered-hours accounting from the
    /// state store.
    pub fn new(config: &ChargeSensorEntityConfig, store: &dyn StateStore) -> Self {
        let state = ChargeControllerState {
            current_period: decode::<String>(store.get(&config.id, "current_from_period"))
                .and_then(|s| PeriodId::parse(&s).ok()),
            delivered_hours: decode(store.get(&config.id, "charge_hours_delivered"))
                .unwrap_or(0.0),
            rates_available: decode(store.get(&config.id, "rates_available")).unwrap_or(false),
            on: decode(store.get(&config.id, "on")).unwrap_or(false),
        };
        let params = ChargeParameters {
            band: config.band,
            charge_hours: config.charge_hours,
            max_rate: config.max_rate,
        };
        Self {
            id: config.id.clone(),
            tariff_id: config.tariff.clone(),
            engine: ChargeDecisionEngine::new(params, state),
            logger: get_entity_logger("charge_sensor", &config.id),
        }
    }

    /// Operator command path: replace the price ceiling.
    pub fn set_max_rate(&mut self, max_rate: f64, store: &mut dyn StateStore) -> Result<()> {
        self.engine.set_max_rate(max_rate);
        let mut updates = Map::new();
        updates.insert("no_charge_above".to_string(), json!(max_rate));
        store.set_all(&self.id, updates)
    }

    /// Operator command path: replace the charge-hours target.
    pub fn set_charge_hours(&mut self, hours: u32, store: &mut dyn StateStore) -> Result<()> {
        self.engine.set_charge_hours(hours);
        let mut updates = Map::new();
        updates.insert("charge_hours".to_string(), json!(hours));
        store.set_all(&self.id, updates)
    }

    /// Update the steering signal for this tick.
    ///
    /// Without a linked tariff entity the previous output is left
    /// untouched and a configuration error is surfaced every cycle;
    /// silently steering against stale data is worse than holding state.
    pub fn update(
        &mut self,
        now: DateTime<Utc>,
        tz: Tz,
        tariff: Option<&TariffEntity>,
        store: &mut dyn StateStore,
    ) -> Result<()> {
        let Some(tariff) = tariff else {
            let mut updates = Map::new();
            updates.insert("authoritative".to_string(), json!(false));
            store.set_all(&self.id, updates)?;
            return Err(AurigaError::config(format!(
                "No tariff entity associated with charge sensor {} - check device settings",
                self.id
            )));
        };
        let Some(table) = tariff.cache.today.as_ref() else {
            let mut updates = Map::new();
            updates.insert("authoritative".to_string(), json!(false));
            store.set_all(&self.id, updates)?;
            return Err(AurigaError::config(format!(
                "Tariff entity {} has no rates for today yet (sensor {})",
                self.tariff_id, self.id
            )));
        };

        let local_today = now.with_timezone(&tz).date_naive();
        if tariff.cache.needs_daily_refresh(local_today) {
            self.logger
                .debug("Tariff entity not refreshed for today - steering from stale rates");
        }

        let Some(decision) = self.engine.evaluate(now, table) else {
            // Same period as last evaluation; previous outputs stand
            return Ok(());
        };

        if decision.cycle_reset {
            self.logger.info("Resetting charge hours delivered to 0");
        }
        self.logger.info(&format!(
            "Setting charge sensor to {}",
            if decision.on { "ON" } else { "OFF" }
        ));

        let period = current_period(now);
        let mut updates = Map::new();
        updates.insert("on".to_string(), json!(decision.on));
        updates.insert(
            "rates_available".to_string(),
            json!(decision.rates_available),
        );
        updates.insert(
            "charge_hours_delivered".to_string(),
            json!(decision.delivered_hours),
        );
        let periods: Vec<String> = decision
            .preferred
            .iter()
            .map(|slot| slot.start.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .collect();
        let rates: Vec<String> = decision
            .preferred
            .iter()
            .map(|slot| slot.rate.to_string())
            .collect();
        updates.insert("preferred_periods".to_string(), json!(periods.join(",")));
        updates.insert("preferred_rates".to_string(), json!(rates.join(",")));
        updates.insert(
            "no_charge_above".to_string(),
            json!(self.engine.params().max_rate),
        );
        updates.insert(
            "charge_hours".to_string(),
            json!(self.engine.params().charge_hours),
        );
        updates.insert("current_from_period".to_string(), json!(period.label()));
        updates.insert("authoritative".to_string(), json!(true));
        store.set_all(&self.id, updates)
    }
}

/// One consumption metering unit. Fetches the prior day once per local
/// day, retrying no sooner than half an hour after a failed attempt.
pub struct MeterEntity {
    pub id: String,
    config: MeterEntityConfig,
    pub source: Arc<dyn RateSource>,
    api_today: Option<NaiveDate>,
    last_attempt: Option<DateTime<Utc>>,
    logger: crate::logging::StructuredLogger,
}

impl MeterEntity {
    pub fn new(
        config: &MeterEntityConfig,
        source: Arc<dyn RateSource>,
        store: &dyn StateStore,
    ) -> Self {
        let api_today =
            decode::<String>(store.get(&config.id, "api_today")).and_then(|s| s.parse().ok());
        Self {
            id: config.id.clone(),
            config: config.clone(),
            source,
            api_today,
            last_attempt: None,
            logger: get_entity_logger("meter", &config.id),
        }
    }

    /// Linked tariff entity id, when cost calculation is configured.
    pub fn tariff_id(&self) -> Option<&str> {
        self.config.tariff.as_deref()
    }

    fn meter_point(&self) -> MeterPoint {
        MeterPoint {
            point: self.config.meter_point.clone(),
            serial: self.config.meter_serial.clone(),
            kind: self.config.kind,
        }
    }

    /// Force a fetch on the next cycle.
    pub fn request_refresh(&mut self) {
        self.api_today = None;
        self.last_attempt = None;
        self.logger.info("Set for refresh on next cycle");
    }

    /// Update the entity for this tick: once per day, reconcile the prior
    /// day's readings and publish per-period values and the daily total.
    pub async fn update(
        &mut self,
        now: DateTime<Utc>,
        tz: Tz,
        tariff: Option<&TariffEntity>,
        store: &mut dyn StateStore,
        export_config: &ExportConfig,
    ) -> Result<()> {
        let local_today = now.with_timezone(&tz).date_naive();
        if self.api_today == Some(local_today) {
            return Ok(());
        }
        if let Some(last) = self.last_attempt
            && now - last < Duration::minutes(30)
        {
            // Data not yet published; hold off before asking again
            return Ok(());
        }
        self.last_attempt = Some(now);

        match self.fetch_and_reconcile(local_today, tz, tariff).await {
            Ok(day) => {
                let mut updates = Map::new();
                for period in &day.per_period {
                    let label = period
                        .interval_start
                        .with_timezone(&tz)
                        .format("from_%H_%M")
                        .to_string();
                    updates.insert(label, json!(period.value));
                }
                let unit = if self.config.calculate_costs {
                    "p"
                } else {
                    self.config.kind.unit()
                };
                updates.insert("total_daily_consumption".to_string(), json!(day.total));
                updates.insert("total_daily_unit".to_string(), json!(unit));
                updates.insert("api_today".to_string(), json!(local_today.to_string()));
                store.set_all(&self.id, updates)?;
                self.api_today = Some(local_today);

                if self.config.export {
                    let rows: Vec<(DateTime<Utc>, f64)> = day
                        .per_period
                        .iter()
                        .map(|p| (p.interval_start, p.value))
                        .collect();
                    let yesterday = local_today - Duration::days(1);
                    match export::export_history_csv(
                        Path::new(&export_config.directory),
                        yesterday,
                        &self.id,
                        &rows,
                    ) {
                        Ok(path) => self
                            .logger
                            .info(&format!("Created CSV file {}", path.display())),
                        Err(e) => self.logger.error(&format!("CSV export failed: {}", e)),
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.logger.error(&format!(
                    "Octopus API refresh failure (consumption): {} - will retry in 30 minutes",
                    e
                ));
                let mut updates = Map::new();
                updates.insert("api_today".to_string(), json!(METER_DATA_UNAVAILABLE));
                store.set_all(&self.id, updates)?;
                Err(e)
            }
        }
    }

    async fn fetch_and_reconcile(
        &self,
        local_today: NaiveDate,
        tz: Tz,
        tariff: Option<&TariffEntity>,
    ) -> Result<consumption::ReconciledDay> {
        let (from, to) = consumption_window(local_today, self.config.smets2, tz);
        let readings = self
            .source
            .fetch_consumption(&self.meter_point(), from, to)
            .await?;
        if readings.len() != 48 {
            // Data for the day is published all at once; anything else
            // means it is not available yet
            return Err(AurigaError::incomplete_data(readings.len(), 48));
        }

        if self.config.calculate_costs && self.config.kind == MeterKind::Electricity {
            let rates = tariff
                .and_then(|t| t.cache.yesterday.as_ref())
                .ok_or_else(|| {
                    AurigaError::config(format!(
                        "No historical rates available to cost meter {}",
                        self.id
                    ))
                })?;
            // Outside DST the window starts half an hour before the rate
            // table; drop leading readings the table does not cover
            let aligned: Vec<_> = readings
                .iter()
                .skip_while(|r| {
                    rates
                        .periods
                        .first()
                        .is_some_and(|first| r.interval_start < first.valid_from)
                })
                .copied()
                .collect();
            consumption::reconcile(&aligned, rates)
        } else {
            Ok(consumption::quantity_totals(&readings))
        }
    }
}

fn restore_table(store: &dyn StateStore, entity_id: &str, key: &str) -> Option<DayRateTable> {
    let table = decode::<DayRateTable>(store.get(entity_id, key))?;
    // Discard anything that no longer satisfies the ordering invariant
    table.validate().ok().map(|_| table)
}
