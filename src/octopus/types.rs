//! Wire types for the Octopus v1 REST API

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Paged list envelope common to all list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    pub count: usize,
    pub results: Vec<T>,
}

/// One half-hour unit rate record. The envelope carries more fields
/// (`value_exc_vat`, `valid_to`); only the ones the cache needs are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitRate {
    pub value_inc_vat: f64,
    pub valid_from: DateTime<Utc>,
}

/// Standing charge record.
#[derive(Debug, Clone, Deserialize)]
pub struct StandingCharge {
    pub value_inc_vat: f64,
}

/// One half-hour consumption reading.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionReading {
    pub consumption: f64,
    pub interval_start: DateTime<Utc>,
}

/// Grid-supply-point lookup result.
#[derive(Debug, Clone, Deserialize)]
pub struct GridSupplyPoint {
    pub group_id: String,
}
