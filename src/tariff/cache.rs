//! Rolling today/yesterday rate cache
//!
//! Each tariff entity owns exactly one [`TariffCacheEntry`]. The entry is
//! refreshed from the upstream source at local-day rollover and once more
//! at the fixed 17:00Z slot (rates for the full day are commonly not
//! published until the afternoon). Today and yesterday are fetched
//! independently so a partial failure keeps whichever half succeeded;
//! yesterday is always re-fetched from source rather than copied forward,
//! which makes the first-ever run and missed cycles self-correcting.

use crate::error::{AurigaError, Result};
use crate::octopus::RateSource;
use crate::period::{PeriodId, current_period};
use crate::tariff::{DayRateTable, expected_period_count};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cached rate state owned by a single tariff entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TariffCacheEntry {
    /// Today's rate table, if a fetch has succeeded for the current day
    pub today: Option<DayRateTable>,

    /// Yesterday's rate table
    pub yesterday: Option<DayRateTable>,

    /// Local date of the last successful today-fetch
    pub last_refreshed: Option<NaiveDate>,

    /// Whether the 17:00Z re-publish fetch already ran for the current day
    pub afternoon_refresh_done: bool,

    /// Standing charge in pence per day, today and yesterday
    pub standing_charge: Option<f64>,
    pub yesterday_standing_charge: Option<f64>,
}

/// What a `refresh_if_needed` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache was already current for this period; no network traffic
    NotNeeded,

    /// At least one upstream fetch ran
    Refreshed,
}

impl TariffCacheEntry {
    /// A daily refresh is due whenever the cache was last refreshed on a
    /// different local day (or never).
    pub fn needs_daily_refresh(&self, local_today: NaiveDate) -> bool {
        self.last_refreshed != Some(local_today)
    }

    /// The afternoon refresh is due exactly once, at the 17:00Z slot.
    pub fn needs_afternoon_refresh(&self, current: PeriodId, local_today: NaiveDate) -> bool {
        current.is_afternoon_refresh_slot(local_today) && !self.afternoon_refresh_done
    }

    /// Refresh the cache from the source if either predicate fires.
    ///
    /// Calling this twice within the same period with no upstream change
    /// performs at most one set of network fetches. On partial failure the
    /// stale half is retained and an error is returned; the caller retries
    /// on the next eligible boundary.
    pub async fn refresh_if_needed(
        &mut self,
        source: &dyn RateSource,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<RefreshOutcome> {
        let local_today = now.with_timezone(&tz).date_naive();
        let current = current_period(now);

        let daily = self.needs_daily_refresh(local_today);
        let afternoon = self.needs_afternoon_refresh(current, local_today);
        if !daily && !afternoon {
            return Ok(RefreshOutcome::NotNeeded);
        }

        let local_yesterday = local_today - Duration::days(1);
        let mut first_error: Option<AurigaError> = None;

        match fetch_complete_day(source, local_today, tz).await {
            Ok(table) => {
                self.today = Some(table);
                self.last_refreshed = Some(local_today);
                if afternoon {
                    self.afternoon_refresh_done = true;
                }
            }
            Err(e) => {
                // Forces the daily predicate to fire again next period
                self.last_refreshed = None;
                first_error = Some(e);
            }
        }
        if !afternoon {
            // Day rollover: the afternoon fetch has not happened yet today
            self.afternoon_refresh_done = false;
        }

        match fetch_complete_day(source, local_yesterday, tz).await {
            Ok(table) => self.yesterday = Some(table),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        // Standing charges change rarely; a failed fetch keeps the stale
        // value and is not an error for the cycle
        match source.fetch_standing_charge().await {
            Ok(charge) => {
                self.yesterday_standing_charge = self.standing_charge.or(Some(charge));
                self.standing_charge = Some(charge);
            }
            Err(e) => warn!("standing charge refresh failed: {}", e),
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(RefreshOutcome::Refreshed),
        }
    }
}

/// Fetch one day of rates and enforce the DST-dependent completeness
/// contract before the table is allowed into the cache.
async fn fetch_complete_day(
    source: &dyn RateSource,
    date: NaiveDate,
    tz: Tz,
) -> Result<DayRateTable> {
    let table = source.fetch_rates(date).await?;
    let expected = expected_period_count(date, tz);
    if table.len() != expected {
        return Err(AurigaError::incomplete_data(table.len(), expected));
    }
    Ok(table)
}
