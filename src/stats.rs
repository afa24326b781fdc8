//! Daily rate statistics and lowest-cost window search

use crate::tariff::DayRateTable;
use chrono::{DateTime, Utc};

/// Min/max/average over a day of rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

/// The cheapest contiguous run of a given length, by mean rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatWindow {
    /// Window length in half-hour slots
    pub length_slots: usize,

    /// UTC start of the first slot in the window
    pub start: DateTime<Utc>,

    /// Mean rate over the window
    pub average_rate: f64,
}

/// Window lengths surfaced to operators: 30m, 1h, 2h, 3h and 4h.
pub const WINDOW_LENGTHS: [usize; 5] = [1, 2, 4, 6, 8];

/// Compute min, max and average over the table's rates. Slots are equal
/// length so the plain mean is also the time-weighted mean.
pub fn daily_stats(table: &DayRateTable) -> Option<DailyStats> {
    let first = table.periods.first()?;
    let mut min = first.value_inc_vat;
    let mut max = first.value_inc_vat;
    let mut sum = 0.0;
    for period in &table.periods {
        let rate = period.value_inc_vat;
        if rate < min {
            min = rate;
        }
        if rate > max {
            max = rate;
        }
        sum += rate;
    }
    Some(DailyStats {
        min,
        max,
        average: sum / table.periods.len() as f64,
    })
}

/// For each configured window length, find the start offset minimising the
/// mean rate of that many consecutive slots. Windows never run past the
/// table's end (no wraparound into the next day); ties go to the earliest
/// start. Lengths longer than the table are omitted.
pub fn lowest_cost_windows(table: &DayRateTable) -> Vec<StatWindow> {
    lowest_cost_windows_of(table, &WINDOW_LENGTHS)
}

/// As [`lowest_cost_windows`] for an arbitrary set of lengths.
pub fn lowest_cost_windows_of(table: &DayRateTable, lengths: &[usize]) -> Vec<StatWindow> {
    let n = table.periods.len();
    // Prefix sums keep the scan O(n) per length
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for period in &table.periods {
        let last: f64 = *prefix.last().unwrap_or(&0.0);
        prefix.push(last + period.value_inc_vat);
    }

    let mut windows = Vec::new();
    for &length in lengths {
        if length == 0 || length > n {
            continue;
        }
        let mut best_offset = 0usize;
        let mut best_mean = f64::INFINITY;
        for offset in 0..=(n - length) {
            let mean = (prefix[offset + length] - prefix[offset]) / length as f64;
            // Strict comparison keeps the earliest offset on ties
            if mean < best_mean {
                best_mean = mean;
                best_offset = offset;
            }
        }
        windows.push(StatWindow {
            length_slots: length,
            start: table.periods[best_offset].valid_from,
            average_rate: best_mean,
        });
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::{DayRateTable, RatePeriod};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn table(rates: &[f64]) -> DayRateTable {
        let date = NaiveDate::from_ymd_opt(2021, 7, 15).unwrap();
        let start = Utc.with_ymd_and_hms(2021, 7, 14, 23, 0, 0).unwrap();
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

    #[test]
    fn stats_over_known_rates() {
        let t = table(&[10.0, 20.0, 30.0, 40.0]);
        let stats = daily_stats(&t).unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        assert_eq!(stats.average, 25.0);
    }

    #[test]
    fn single_slot_window_is_global_minimum() {
        let mut rates = vec![15.0; 48];
        rates[31] = 3.5;
        let t = table(&rates);
        let windows = lowest_cost_windows(&t);
        let half_hour = windows.iter().find(|w| w.length_slots == 1).unwrap();
        assert_eq!(half_hour.average_rate, 3.5);
        assert_eq!(half_hour.start, t.periods[31].valid_from);
    }

    #[test]
    fn full_table_window_equals_table_average() {
        let rates: Vec<f64> = (0..48).map(|i| 5.0 + i as f64).collect();
        let t = table(&rates);
        let windows = lowest_cost_windows_of(&t, &[48]);
        assert_eq!(windows.len(), 1);
        let expected = daily_stats(&t).unwrap().average;
        assert!((windows[0].average_rate - expected).abs() < 1e-9);
        assert_eq!(windows[0].start, t.periods[0].valid_from);
    }

    #[test]
    fn windows_do_not_run_past_table_end() {
        // Cheap rates at the tail would win only if the window overflowed
        let mut rates = vec![20.0; 48];
        rates[47] = 0.0;
        let t = table(&rates);
        let windows = lowest_cost_windows(&t);
        let four_hour = windows.iter().find(|w| w.length_slots == 8).unwrap();
        // The best fitting 8-slot window ends at the final slot
        assert_eq!(four_hour.start, t.periods[40].valid_from);
    }

    #[test]
    fn ties_break_to_earliest_start() {
        let rates = vec![10.0; 48];
        let t = table(&rates);
        for window in lowest_cost_windows(&t) {
            assert_eq!(window.start, t.periods[0].valid_from);
            assert_eq!(window.average_rate, 10.0);
        }
    }

    #[test]
    fn oversized_lengths_are_omitted() {
        let t = table(&[10.0, 20.0]);
        let windows = lowest_cost_windows(&t);
        assert_eq!(
            windows.iter().map(|w| w.length_slots).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
