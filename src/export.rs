//! Daily CSV export
//!
//! Writes a two-column record table for one day, one ascending row per
//! half-hour slot, either on operator demand or automatically at the
//! fixed 18:00Z slot.

use crate::error::Result;
use crate::tariff::DayRateTable;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};

/// Write a rates table to `<date>-<entity>-Rates.csv` in the export
/// directory. Returns the path written.
pub fn export_rates_csv(
    directory: &Path,
    date: NaiveDate,
    entity_id: &str,
    table: &DayRateTable,
) -> Result<PathBuf> {
    let rows: Vec<(DateTime<Utc>, f64)> = table
        .periods
        .iter()
        .map(|p| (p.valid_from, p.value_inc_vat))
        .collect();
    write_csv(directory, &format!("{}-{}-Rates.csv", date, entity_id), &rows)
}

/// Write reconciled meter history to `<date>-<entity>-History.csv`.
pub fn export_history_csv(
    directory: &Path,
    date: NaiveDate,
    entity_id: &str,
    rows: &[(DateTime<Utc>, f64)],
) -> Result<PathBuf> {
    write_csv(
        directory,
        &format!("{}-{}-History.csv", date, entity_id),
        rows,
    )
}

fn write_csv(directory: &Path, file_name: &str, rows: &[(DateTime<Utc>, f64)]) -> Result<PathBuf> {
    if !directory.is_dir() {
        std::fs::create_dir_all(directory)?;
    }
    let path = directory.join(file_name);
    let mut contents = String::from("Period,Tariff\n");
    for (period, value) in rows {
        contents.push_str(&format!(
            "{},{}\n",
            period.format("%Y-%m-%dT%H:%M:%SZ"),
            value
        ));
    }
    std::fs::write(&path, contents)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::RatePeriod;
    use chrono::{Duration, TimeZone};

    #[test]
    fn writes_header_and_ascending_rows() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        let start = Utc.with_ymd_and_hms(2021, 1, 15, 0, 0, 0).unwrap();
        let table = DayRateTable::new(
            date,
            (0..3)
                .map(|i| RatePeriod {
                    valid_from: start + Duration::minutes(30 * i),
                    value_inc_vat: 10.0 + i as f64,
                })
                .collect(),
        )
        .unwrap();

        let path = export_rates_csv(dir.path(), date, "tariff_home", &table).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "2021-01-15-tariff_home-Rates.csv"
        );
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Period,Tariff");
        assert_eq!(lines[1], "2021-01-15T00:00:00Z,10");
        assert_eq!(lines[3], "2021-01-15T01:00:00Z,12");
    }

    #[test]
    fn creates_missing_export_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("exports");
        let rows = vec![(Utc.with_ymd_and_hms(2021, 1, 14, 0, 0, 0).unwrap(), 0.5)];
        let date = NaiveDate::from_ymd_opt(2021, 1, 14).unwrap();
        let path = export_history_csv(&nested, date, "meter", &rows).unwrap();
        assert!(path.exists());
    }
}
