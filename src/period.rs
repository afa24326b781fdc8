//! Half-hour period identity
//!
//! The upstream API anchors every rate to the UTC start of a half-hour
//! period. Working in UTC keeps period identity stable across daylight
//! saving transitions; only here and in the rate table completeness check
//! does any timezone arithmetic happen.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a half-hour tariff period: the UTC timestamp truncated
/// down to minute 0 or 30.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeriodId(DateTime<Utc>);

impl PeriodId {
    /// Truncate an instant down to the enclosing half-hour boundary.
    pub fn from_instant(now: DateTime<Utc>) -> Self {
        let secs = now.timestamp();
        let floored = secs - secs.rem_euclid(1800);
        Self(DateTime::<Utc>::from_timestamp(floored, 0).unwrap_or(now))
    }

    /// The UTC start instant of the period.
    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }

    /// The label the upstream API uses for this period, e.g.
    /// `2020-04-28T17:30:00Z`.
    pub fn label(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Parse an upstream period label back into an identifier.
    pub fn parse(label: &str) -> crate::error::Result<Self> {
        let dt = DateTime::parse_from_rfc3339(label)?;
        Ok(Self::from_instant(dt.with_timezone(&Utc)))
    }

    /// True iff this is the fixed 17:00Z slot of the given local day, the
    /// point at which the upstream has reliably published the full day.
    pub fn is_afternoon_refresh_slot(&self, local_today: NaiveDate) -> bool {
        self.0.date_naive() == local_today && self.0.hour() == 17 && self.0.minute() == 0
    }

    /// True iff this is the fixed 18:00Z slot of the given local day
    /// (the daily export trigger).
    pub fn is_export_slot(&self, local_today: NaiveDate) -> bool {
        self.0.date_naive() == local_today && self.0.hour() == 18 && self.0.minute() == 0
    }

    /// UTC hour of day of the period start.
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// UTC calendar date of the period start.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }
}

impl std::fmt::Display for PeriodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Current period for an instant. Pure and idempotent within a half hour.
pub fn current_period(now: DateTime<Utc>) -> PeriodId {
    PeriodId::from_instant(now)
}

/// Whether a half-hour boundary has been crossed since `previous` was
/// recorded. A missing previous observation counts as crossed so the first
/// run populates state.
pub fn has_crossed_boundary(previous: Option<&PeriodId>, now: DateTime<Utc>) -> bool {
    match previous {
        Some(prev) => current_period(now) != *prev,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn truncates_to_half_hour() {
        let p = current_period(utc(2020, 4, 28, 9, 12, 45));
        assert_eq!(p.label(), "2020-04-28T09:00:00Z");

        let p = current_period(utc(2020, 4, 28, 9, 30, 0));
        assert_eq!(p.label(), "2020-04-28T09:30:00Z");

        let p = current_period(utc(2020, 4, 28, 9, 59, 59));
        assert_eq!(p.label(), "2020-04-28T09:30:00Z");
    }

    #[test]
    fn idempotent_within_period_and_increasing_across() {
        let a = current_period(utc(2021, 1, 5, 23, 31, 0));
        let b = current_period(utc(2021, 1, 5, 23, 59, 59));
        assert_eq!(a, b);

        let c = current_period(utc(2021, 1, 6, 0, 0, 0));
        assert!(c > b);
    }

    #[test]
    fn boundary_detection() {
        let prev = current_period(utc(2021, 1, 5, 10, 0, 0));
        assert!(!has_crossed_boundary(Some(&prev), utc(2021, 1, 5, 10, 29, 59)));
        assert!(has_crossed_boundary(Some(&prev), utc(2021, 1, 5, 10, 30, 0)));
        // First-ever observation forces a crossing
        assert!(has_crossed_boundary(None, utc(2021, 1, 5, 10, 0, 0)));
    }

    #[test]
    fn label_roundtrip() {
        let p = current_period(utc(2020, 4, 28, 17, 0, 3));
        let parsed = PeriodId::parse(&p.label()).unwrap();
        assert_eq!(p, parsed);
    }

    #[test]
    fn afternoon_slot_detection() {
        let date = NaiveDate::from_ymd_opt(2020, 4, 28).unwrap();
        let slot = current_period(utc(2020, 4, 28, 17, 4, 0));
        assert!(slot.is_afternoon_refresh_slot(date));
        let other = current_period(utc(2020, 4, 28, 17, 30, 0));
        assert!(!other.is_afternoon_refresh_slot(date));
        let wrong_day = NaiveDate::from_ymd_opt(2020, 4, 29).unwrap();
        assert!(!slot.is_afternoon_refresh_slot(wrong_day));
    }
}
