use auriga::consumption::{ConsumptionRecord, quantity_totals, reconcile};
use auriga::error::AurigaError;
use auriga::tariff::{DayRateTable, RatePeriod};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

fn readings(count: usize, quantity: f64) -> Vec<ConsumptionRecord> {
    let start = Utc.with_ymd_and_hms(2021, 1, 14, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| ConsumptionRecord {
            interval_start: start + Duration::minutes(30 * i as i64),
            quantity,
        })
        .collect()
}

fn rates(count: usize, rate: f64) -> DayRateTable {
    let date = NaiveDate::from_ymd_opt(2021, 1, 14).unwrap();
    let start = Utc.with_ymd_and_hms(2021, 1, 14, 0, 0, 0).unwrap();
    DayRateTable::new(
        date,
        (0..count)
            .map(|i| RatePeriod {
                valid_from: start + Duration::minutes(30 * i as i64),
                value_inc_vat: rate,
            })
            .collect(),
    )
    .unwrap()
}

#[test]
fn unit_quantities_against_uniform_rates() {
    let reconciled = reconcile(&readings(48, 1.0), &rates(48, 2.0)).unwrap();
    assert_eq!(reconciled.total, 96.0);
    assert_eq!(reconciled.per_period.len(), 48);
    assert!(reconciled.per_period.iter().all(|p| p.value == 2.0));
}

#[test]
fn per_period_costs_follow_ordinal_position() {
    let date = NaiveDate::from_ymd_opt(2021, 1, 14).unwrap();
    let start = Utc.with_ymd_and_hms(2021, 1, 14, 0, 0, 0).unwrap();
    let table = DayRateTable::new(
        date,
        (0..48)
            .map(|i| RatePeriod {
                valid_from: start + Duration::minutes(30 * i),
                value_inc_vat: i as f64,
            })
            .collect(),
    )
    .unwrap();
    let reconciled = reconcile(&readings(48, 2.0), &table).unwrap();
    assert_eq!(reconciled.per_period[0].value, 0.0);
    assert_eq!(reconciled.per_period[10].value, 20.0);
    assert_eq!(reconciled.per_period[47].value, 94.0);
}

#[test]
fn misaligned_sequences_are_refused() {
    let err = reconcile(&readings(48, 1.0), &rates(47, 2.0)).unwrap_err();
    assert!(matches!(err, AurigaError::Alignment { expected: 47, actual: 48 }));
}

#[test]
fn gas_totals_skip_cost_conversion() {
    let day = quantity_totals(&readings(48, 0.25));
    assert_eq!(day.total, 12.0);
    assert_eq!(day.per_period[0].value, 0.25);
}
