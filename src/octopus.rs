//! Octopus Energy REST API integration
//!
//! Upstream access goes through the [`RateSource`] trait so the cache,
//! reconciliation and decision logic can be exercised against scripted
//! sources in tests. The real implementation is [`OctopusClient`], a
//! reqwest client for the v1 REST API with a bounded request timeout.

pub mod client;
pub mod types;

pub use client::OctopusClient;

use crate::consumption::{ConsumptionRecord, MeterKind};
use crate::error::Result;
use crate::tariff::{DayRateTable, dst_in_effect};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Identity of one physical meter at a supply point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterPoint {
    /// Electricity MPAN or gas MPRN
    pub point: String,

    /// Meter serial number
    pub serial: String,

    /// Supply kind, selects the electricity or gas endpoint
    pub kind: MeterKind,
}

/// Upstream tariff and consumption data source.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the half-hourly unit rates covering one local day, ascending
    /// by period start.
    async fn fetch_rates(&self, date: NaiveDate) -> Result<DayRateTable>;

    /// Fetch the current standing charge in pence per day.
    async fn fetch_standing_charge(&self) -> Result<f64>;

    /// Fetch half-hourly consumption readings for a window, ascending by
    /// interval start.
    async fn fetch_consumption(
        &self,
        meter: &MeterPoint,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConsumptionRecord>>;

    /// Resolve a postcode to its grid-supply-point region letter.
    async fn resolve_region(&self, postcode: &str) -> Result<String>;
}

/// The consumption window to request for the day before `local_today`.
///
/// With DST in effect (or a first-generation smart meter) the full local
/// day is available. A SMETS2 meter outside DST only publishes up to
/// 23:00, so the window shifts back half an hour to start at 23:30 of the
/// day before yesterday, keeping the response at 48 records.
pub fn consumption_window(
    local_today: NaiveDate,
    smets2: bool,
    tz: Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let yesterday = local_today - Duration::days(1);
    let to = local_datetime(
        yesterday,
        NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default(),
        tz,
    );
    let from = if dst_in_effect(yesterday, tz) || !smets2 {
        local_datetime(yesterday, NaiveTime::MIN, tz)
    } else {
        let day_before = yesterday - Duration::days(1);
        local_datetime(
            day_before,
            NaiveTime::from_hms_opt(23, 30, 0).unwrap_or_default(),
            tz,
        )
    };
    (from, to)
}

fn local_datetime(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map_or_else(
            || Utc.from_utc_datetime(&date.and_time(time)),
            |dt| dt.with_timezone(&Utc),
        )
}
