//! Metered consumption reconciliation
//!
//! Consumption is published with a next-day lag as up to 48 half-hour
//! readings. Electricity meters with cost calculation enabled are merged
//! against yesterday's cached rate table by ordinal position; both
//! sequences are ordered by time, so any length mismatch means the merge
//! would silently misprice periods and is rejected instead.

use crate::error::{AurigaError, Result};
use crate::tariff::DayRateTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One half-hour meter reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// UTC start of the half-hour interval
    pub interval_start: DateTime<Utc>,

    /// Energy in kWh for electricity, volume in m3 for gas
    pub quantity: f64,
}

/// Kind of metered supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    Electricity,
    Gas,
}

impl MeterKind {
    /// Unit label used when surfacing daily totals.
    pub fn unit(self) -> &'static str {
        match self {
            MeterKind::Electricity => "kWh",
            MeterKind::Gas => "m3",
        }
    }
}

/// One reconciled half-hour value: cost in pence, or a raw quantity for
/// meters without cost calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodValue {
    pub interval_start: DateTime<Utc>,
    pub value: f64,
}

/// A reconciled day of consumption.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledDay {
    pub per_period: Vec<PeriodValue>,
    pub total: f64,
}

/// Merge a day of consumption with the matching historical rates by
/// ordinal position: `cost[i] = quantity[i] * rate[i]`.
///
/// Fails with an alignment error when the sequences differ in length;
/// computing against misaligned data would silently produce wrong costs,
/// which is strictly worse than retrying a cycle later.
pub fn reconcile(
    consumption: &[ConsumptionRecord],
    rates: &DayRateTable,
) -> Result<ReconciledDay> {
    if consumption.len() != rates.periods.len() {
        return Err(AurigaError::alignment(rates.periods.len(), consumption.len()));
    }
    let mut per_period = Vec::with_capacity(consumption.len());
    let mut total = 0.0;
    for (reading, rate) in consumption.iter().zip(rates.periods.iter()) {
        let cost = reading.quantity * rate.value_inc_vat;
        total += cost;
        per_period.push(PeriodValue {
            interval_start: reading.interval_start,
            value: cost,
        });
    }
    Ok(ReconciledDay { per_period, total })
}

/// Raw quantity totals for meters that skip cost conversion (gas, or
/// electricity without a linked tariff).
pub fn quantity_totals(consumption: &[ConsumptionRecord]) -> ReconciledDay {
    let mut total = 0.0;
    let per_period = consumption
        .iter()
        .map(|reading| {
            total += reading.quantity;
            PeriodValue {
                interval_start: reading.interval_start,
                value: reading.quantity,
            }
        })
        .collect();
    ReconciledDay { per_period, total }
}
