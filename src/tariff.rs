//! Rate tables and the per-entity tariff cache
//!
//! A day of agile pricing is an ordered sequence of half-hour
//! [`RatePeriod`]s keyed by the local calendar date it represents. The
//! number of periods a complete publication carries depends on daylight
//! saving: 48 when DST is in effect, 47 otherwise (the upstream only
//! exposes up to 23:00 for a SMETS2 meter outside DST; the missing
//! late-evening period is carried by the following day's table), and 46 on
//! a transition day. All DST arithmetic for completeness lives here.

pub mod cache;

pub use cache::{RefreshOutcome, TariffCacheEntry};

use crate::error::{AurigaError, Result};
use crate::period::PeriodId;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use serde::{Deserialize, Serialize};

/// A single half-hour tariff period. Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePeriod {
    /// UTC start of the half-hour period, half-hour aligned
    pub valid_from: DateTime<Utc>,

    /// Unit price including tax, in pence per kWh
    pub value_inc_vat: f64,
}

/// An ordered day of half-hour rate periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRateTable {
    /// Local calendar date the table represents
    pub date: NaiveDate,

    /// Periods in ascending order of `valid_from`
    pub periods: Vec<RatePeriod>,
}

impl DayRateTable {
    /// Build a table from periods, enforcing the ordering invariant:
    /// strictly increasing starts spaced exactly 30 minutes apart.
    pub fn new(date: NaiveDate, periods: Vec<RatePeriod>) -> Result<Self> {
        let table = Self { date, periods };
        table.validate()?;
        Ok(table)
    }

    /// Re-check the ordering invariant (used when restoring a serialized
    /// table from the state store).
    pub fn validate(&self) -> Result<()> {
        if self.periods.is_empty() {
            return Err(AurigaError::incomplete_data(0, FULL_DAY_PERIODS));
        }
        for pair in self.periods.windows(2) {
            if pair[1].valid_from - pair[0].valid_from != Duration::minutes(30) {
                return Err(AurigaError::validation(
                    "periods".to_string(),
                    format!(
                        "periods not half-hour spaced at {}",
                        pair[0].valid_from.to_rfc3339()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Number of periods in the table.
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// True if the table holds no periods.
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// The rate applying to the given period, if the table covers it.
    pub fn rate_at(&self, period: PeriodId) -> Option<f64> {
        self.periods
            .iter()
            .find(|p| p.valid_from == period.start())
            .map(|p| p.value_inc_vat)
    }

    /// True when the table carries the full publication for its date
    /// given the tariff's timezone.
    pub fn is_complete(&self, tz: Tz) -> bool {
        self.periods.len() == expected_period_count(self.date, tz)
    }
}

/// Period count of a full-day publication when DST is in effect.
pub const FULL_DAY_PERIODS: usize = 48;

/// How many periods a complete publication for `date` should carry.
///
/// 46 on a DST transition day, 48 while DST is in effect, 47 otherwise.
pub fn expected_period_count(date: NaiveDate, tz: Tz) -> usize {
    if is_dst_transition_day(date, tz) {
        46
    } else if dst_in_effect(date, tz) {
        FULL_DAY_PERIODS
    } else {
        47
    }
}

/// Whether daylight saving applies on the given local date. Sampled at
/// midday to stay clear of the transition instants.
pub fn dst_in_effect(date: NaiveDate, tz: Tz) -> bool {
    let midday = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
    tz.from_local_datetime(&midday)
        .earliest()
        .is_some_and(|dt| !dt.offset().dst_offset().is_zero())
}

/// Whether the local date contains a DST transition: the UTC offset at the
/// start of the day differs from the offset at its end.
pub fn is_dst_transition_day(date: NaiveDate, tz: Tz) -> bool {
    let start = offset_seconds(date, NaiveTime::from_hms_opt(0, 30, 0).unwrap_or_default(), tz);
    let end = offset_seconds(date, NaiveTime::from_hms_opt(23, 30, 0).unwrap_or_default(), tz);
    match (start, end) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

fn offset_seconds(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<i32> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.offset().fix().local_minus_utc())
}
