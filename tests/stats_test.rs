use auriga::stats::{daily_stats, lowest_cost_windows, lowest_cost_windows_of};
use auriga::tariff::{DayRateTable, RatePeriod};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

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

#[test]
fn average_min_max_over_four_rates() {
    let stats = daily_stats(&table(&[10.0, 20.0, 30.0, 40.0])).unwrap();
    assert_eq!(stats.average, 25.0);
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 40.0);
}

#[test]
fn length_one_window_finds_the_global_cheapest_slot() {
    let mut rates = vec![25.0; 48];
    rates[10] = 2.0;
    let t = table(&rates);
    let windows = lowest_cost_windows(&t);
    let w = windows.iter().find(|w| w.length_slots == 1).unwrap();
    assert_eq!(w.start, t.periods[10].valid_from);
    assert_eq!(w.average_rate, 2.0);
}

#[test]
fn whole_table_window_cost_is_the_table_average() {
    let rates: Vec<f64> = (0..48).map(|i| 10.0 + (i % 7) as f64).collect();
    let t = table(&rates);
    let windows = lowest_cost_windows_of(&t, &[48]);
    let expected = daily_stats(&t).unwrap().average;
    assert!((windows[0].average_rate - expected).abs() < 1e-9);
}

#[test]
fn returns_all_standard_lengths_for_a_full_day() {
    let t = table(&vec![12.0; 48]);
    let lengths: Vec<usize> = lowest_cost_windows(&t).iter().map(|w| w.length_slots).collect();
    assert_eq!(lengths, vec![1, 2, 4, 6, 8]);
}

#[test]
fn window_search_prefers_contiguous_cheap_runs() {
    // Two cheap slots separated by an expensive one must not beat a
    // genuinely cheap contiguous pair
    let mut rates = vec![20.0; 48];
    rates[4] = 1.0;
    rates[5] = 30.0;
    rates[6] = 1.0;
    rates[20] = 5.0;
    rates[21] = 5.0;
    let t = table(&rates);
    let windows = lowest_cost_windows(&t);
    let pair = windows.iter().find(|w| w.length_slots == 2).unwrap();
    assert_eq!(pair.start, t.periods[20].valid_from);
    assert_eq!(pair.average_rate, 5.0);
}
