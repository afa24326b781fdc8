//! Preferred-period charge steering
//!
//! A charge sensor follows one tariff entity and raises a boolean
//! "charging allowed" signal whenever the current half-hour period is one
//! of the cheapest slots inside its configured clock-time band and the
//! current rate does not exceed the configured ceiling. The decision is a
//! pure function of current inputs per period - there is deliberately no
//! hysteresis, so the signal may toggle every half hour when prices
//! straddle the ceiling.

use crate::period::PeriodId;
use crate::tariff::DayRateTable;
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Fixed clock-time band within which cheap slots are selected.
///
/// The windows are anchored to the UTC period labels the upstream
/// publishes, matching the published rate identifiers rather than local
/// wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredBand {
    /// 00:00-07:30 starts; cheapest overnight slots
    Night,

    /// 08:00-15:30 starts
    Day,

    /// 19:30-23:30 starts
    Evening,
}

impl PreferredBand {
    /// Whether a period starting at `t` falls inside the band.
    pub fn contains(self, t: NaiveTime) -> bool {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default();
        let sixteen = NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default();
        let half_seven_pm = NaiveTime::from_hms_opt(19, 30, 0).unwrap_or_default();
        match self {
            PreferredBand::Night => t < eight,
            PreferredBand::Day => t >= eight && t < sixteen,
            PreferredBand::Evening => t >= half_seven_pm,
        }
    }

    /// Hour of day at which delivered-hours accounting restarts for a new
    /// band cycle.
    pub fn reset_hour(self) -> u32 {
        match self {
            PreferredBand::Night | PreferredBand::Evening => 19,
            PreferredBand::Day => 23,
        }
    }

    /// Whether the cached preferred set can be trusted at this hour. Each
    /// band has a blackout window between the end of its slots and the
    /// expected publication of the next day's rates, during which the set
    /// refers to slots that have already passed.
    pub fn rates_available(self, hour: u32) -> bool {
        match self {
            PreferredBand::Night => !(8..18).contains(&hour),
            PreferredBand::Day => !(16..18).contains(&hour),
            PreferredBand::Evening => hour >= 17,
        }
    }

    /// Configuration label, as accepted in YAML.
    pub fn as_str(self) -> &'static str {
        match self {
            PreferredBand::Night => "night",
            PreferredBand::Day => "day",
            PreferredBand::Evening => "evening",
        }
    }
}

/// Validated steering parameters for one charge sensor.
#[derive(Debug, Clone)]
pub struct ChargeParameters {
    /// Band the cheap slots are selected from
    pub band: PreferredBand,

    /// Hours of charge to deliver per band cycle (1..=10)
    pub charge_hours: u32,

    /// Inclusive price ceiling in pence per kWh; above this the signal
    /// stays off even inside the preferred set
    pub max_rate: f64,
}

impl ChargeParameters {
    /// Half-hour slots needed to deliver the configured hours.
    pub fn desired_slots(&self) -> usize {
        (self.charge_hours as usize) * 2
    }
}

/// Mutable per-sensor state carried across periods. Restored from the
/// state store at startup so delivered-hours accounting survives restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargeControllerState {
    /// Period the last decision was made for
    pub current_period: Option<PeriodId>,

    /// Cumulative charge hours delivered this band cycle
    pub delivered_hours: f64,

    /// False while inside the band's blackout window
    pub rates_available: bool,

    /// The steering signal
    pub on: bool,
}

/// One preferred slot with its rate, surfaced for operator visibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreferredSlot {
    pub start: DateTime<Utc>,
    pub rate: f64,
}

/// Outcome of evaluating one period.
#[derive(Debug, Clone)]
pub struct ChargeDecision {
    pub on: bool,
    pub rates_available: bool,
    pub delivered_hours: f64,
    pub preferred: Vec<PreferredSlot>,
    /// Whether this evaluation reset the delivered-hours accumulator
    pub cycle_reset: bool,
}

/// Decision logic for a single charge sensor.
///
/// `evaluate` must only be called once per period transition; the driver
/// guards it with the period boundary check so the delivered-hours
/// increment fires at most once per period.
#[derive(Debug)]
pub struct ChargeDecisionEngine {
    params: ChargeParameters,
    state: ChargeControllerState,
}

impl ChargeDecisionEngine {
    pub fn new(params: ChargeParameters, state: ChargeControllerState) -> Self {
        Self { params, state }
    }

    pub fn state(&self) -> &ChargeControllerState {
        &self.state
    }

    pub fn params(&self) -> &ChargeParameters {
        &self.params
    }

    /// Replace the steering parameters (operator command path).
    pub fn set_max_rate(&mut self, max_rate: f64) {
        self.params.max_rate = max_rate;
    }

    /// Replace the charge-hours target (operator command path).
    pub fn set_charge_hours(&mut self, hours: u32) {
        self.params.charge_hours = hours;
    }

    /// The cheapest `desired_slots` periods inside the band, ascending by
    /// rate.
    pub fn preferred_set(&self, table: &DayRateTable) -> Vec<PreferredSlot> {
        let mut slots: Vec<PreferredSlot> = table
            .periods
            .iter()
            .filter(|p| self.params.band.contains(p.valid_from.time()))
            .map(|p| PreferredSlot {
                start: p.valid_from,
                rate: p.value_inc_vat,
            })
            .collect();
        slots.sort_by(|a, b| {
            a.rate
                .partial_cmp(&b.rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.start.cmp(&b.start))
        });
        slots.truncate(self.params.desired_slots());
        slots
    }

    /// Evaluate the steering signal for a freshly-entered period.
    ///
    /// Returns `None` when the period has not changed since the last
    /// evaluation; the previous outputs remain authoritative and the
    /// delivered-hours accumulator is untouched.
    pub fn evaluate(&mut self, now: DateTime<Utc>, table: &DayRateTable) -> Option<ChargeDecision> {
        let period = crate::period::current_period(now);
        if self.state.current_period == Some(period) {
            return None;
        }

        // Reset precedes the decision so a slot in the reset hour counts
        // toward the new cycle
        let mut cycle_reset = false;
        if now.hour() == self.params.band.reset_hour() && self.state.delivered_hours != 0.0 {
            self.state.delivered_hours = 0.0;
            cycle_reset = true;
        }

        let preferred = self.preferred_set(table);
        let rates_available = self.params.band.rates_available(now.hour());
        let current_rate = table.rate_at(period);

        let in_preferred = preferred.iter().any(|slot| slot.start == period.start());
        let on = match current_rate {
            Some(rate) => in_preferred && rate <= self.params.max_rate,
            None => false,
        };
        if on {
            self.state.delivered_hours += 0.5;
        }

        self.state.current_period = Some(period);
        self.state.rates_available = rates_available;
        self.state.on = on;

        Some(ChargeDecision {
            on,
            rates_available,
            delivered_hours: self.state.delivered_hours,
            preferred,
            cycle_reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::{DayRateTable, RatePeriod};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn table(rates: &[f64]) -> DayRateTable {
        let date = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        let start = Utc.with_ymd_and_hms(2021, 1, 15, 0, 0, 0).unwrap();
        let periods = rates
            .iter()
            .enumerate()
            .map(|(i, &rate)| RatePeriod {
                valid_from: start + Duration::minutes(30 * i as i64),
                value_inc_vat: rate,
            })
            .collect();
        DayRateTable::new(date, periods).unwrap()
    }

    fn night_engine(hours: u32, ceiling: f64) -> ChargeDecisionEngine {
        ChargeDecisionEngine::new(
            ChargeParameters {
                band: PreferredBand::Night,
                charge_hours: hours,
                max_rate: ceiling,
            },
            ChargeControllerState::default(),
        )
    }

    #[test]
    fn band_membership_windows() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(PreferredBand::Night.contains(t(0, 0)));
        assert!(PreferredBand::Night.contains(t(7, 30)));
        assert!(!PreferredBand::Night.contains(t(8, 0)));
        assert!(PreferredBand::Day.contains(t(8, 0)));
        assert!(PreferredBand::Day.contains(t(15, 30)));
        assert!(!PreferredBand::Day.contains(t(16, 0)));
        assert!(PreferredBand::Evening.contains(t(19, 30)));
        assert!(PreferredBand::Evening.contains(t(23, 30)));
        assert!(!PreferredBand::Evening.contains(t(19, 0)));
    }

    #[test]
    fn blackout_windows_per_band() {
        assert!(PreferredBand::Night.rates_available(7));
        assert!(!PreferredBand::Night.rates_available(8));
        assert!(!PreferredBand::Night.rates_available(17));
        assert!(PreferredBand::Night.rates_available(18));
        assert!(PreferredBand::Day.rates_available(15));
        assert!(!PreferredBand::Day.rates_available(16));
        assert!(PreferredBand::Day.rates_available(18));
        assert!(!PreferredBand::Evening.rates_available(16));
        assert!(PreferredBand::Evening.rates_available(17));
    }

    #[test]
    fn preferred_set_is_cheapest_band_slots() {
        // 47 winter slots, night covers the first 16 starts
        let mut rates = vec![30.0; 47];
        rates[2] = 5.0; // 01:00
        rates[4] = 6.0; // 02:00
        rates[6] = 7.0; // 03:00
        rates[8] = 8.0; // 04:00
        rates[20] = 1.0; // 10:00, outside the night band
        let t = table(&rates);
        let engine = night_engine(2, 15.0);

        let preferred = engine.preferred_set(&t);
        assert_eq!(preferred.len(), 4);
        let starts: Vec<_> = preferred.iter().map(|s| s.rate).collect();
        assert_eq!(starts, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn turns_on_in_preferred_slot_under_ceiling() {
        let mut rates = vec![30.0; 47];
        rates[0] = 12.0;
        rates[1] = 5.0;
        rates[2] = 6.0;
        rates[3] = 7.0;
        let t = table(&rates);
        let mut engine = night_engine(2, 15.0);

        // 00:10 falls in slot 0 (rate 12.0, in the 4 cheapest night slots)
        let now = Utc.with_ymd_and_hms(2021, 1, 15, 0, 10, 0).unwrap();
        let decision = engine.evaluate(now, &t).unwrap();
        assert!(decision.on);
        assert_eq!(decision.delivered_hours, 0.5);

        // Re-evaluating inside the same period is a no-op
        let again = engine.evaluate(now + Duration::minutes(5), &t);
        assert!(again.is_none());
        assert_eq!(engine.state().delivered_hours, 0.5);

        // Next period (rate 5.0) accrues another half hour
        let next = engine
            .evaluate(now + Duration::minutes(30), &t)
            .unwrap();
        assert!(next.on);
        assert_eq!(next.delivered_hours, 1.0);
    }

    #[test]
    fn ceiling_is_inclusive() {
        let mut rates = vec![30.0; 47];
        rates[0] = 15.0;
        let t = table(&rates);
        let mut engine = night_engine(1, 15.0);

        let now = Utc.with_ymd_and_hms(2021, 1, 15, 0, 0, 0).unwrap();
        let decision = engine.evaluate(now, &t).unwrap();
        assert!(decision.on);
    }

    #[test]
    fn stays_off_above_ceiling_even_in_preferred_slot() {
        let mut rates = vec![30.0; 47];
        rates[0] = 16.0;
        let t = table(&rates);
        let mut engine = night_engine(1, 15.0);

        let now = Utc.with_ymd_and_hms(2021, 1, 15, 0, 0, 0).unwrap();
        let decision = engine.evaluate(now, &t).unwrap();
        assert!(!decision.on);
        assert_eq!(decision.delivered_hours, 0.0);
    }

    #[test]
    fn stays_off_outside_preferred_set() {
        let rates = vec![10.0; 47];
        let t = table(&rates);
        let mut engine = night_engine(1, 15.0);

        // 12:00 is outside the night band entirely
        let now = Utc.with_ymd_and_hms(2021, 1, 15, 12, 0, 0).unwrap();
        let decision = engine.evaluate(now, &t).unwrap();
        assert!(!decision.on);
        assert!(!decision.rates_available);
    }

    #[test]
    fn delivered_hours_reset_at_band_reset_hour() {
        let rates = vec![10.0; 47];
        let t = table(&rates);
        let mut engine = night_engine(1, 15.0);
        engine.state.delivered_hours = 2.0;
        engine.state.current_period = None;

        let now = Utc.with_ymd_and_hms(2021, 1, 15, 19, 0, 0).unwrap();
        let decision = engine.evaluate(now, &t).unwrap();
        assert!(decision.cycle_reset);
        assert_eq!(decision.delivered_hours, 0.0);
    }
}
