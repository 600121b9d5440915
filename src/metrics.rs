use crate::error::{DashboardError, Result};
use crate::merge::MergedRecord;
use chrono::NaiveDate;
use serde::Serialize;

/// Ratios of the most recent day.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    /// recovered / confirmed × 100, or 0 when nothing is confirmed
    pub recovered_rate: f64,
    /// deaths / confirmed × 100, or 0 when nothing is confirmed
    pub death_rate: f64,
    /// confirmed − recovered − deaths
    pub active: i64,
}

/// Label of confirmed cases that are neither recovered nor dead.
pub const ACTIVE_LABEL: &str = "격리중";

/// One slice of the 감염자 분포 chart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProportionSlice {
    pub label: &'static str,
    pub value: i64,
}

impl SummaryMetrics {
    pub fn from_record(record: &MergedRecord) -> Result<Self> {
        let percent = |part: i64| {
            if record.confirmed == 0 {
                0.0
            } else {
                part as f64 / record.confirmed as f64 * 100.0
            }
        };

        let active = record
            .confirmed
            .checked_sub(record.recovered)
            .and_then(|rest| rest.checked_sub(record.deaths))
            .ok_or_else(|| DashboardError::CountOverflow {
                quantity: ACTIVE_LABEL.to_string(),
                date: record.date,
            })?;

        Ok(SummaryMetrics {
            date: record.date,
            confirmed: record.confirmed,
            deaths: record.deaths,
            recovered: record.recovered,
            recovered_rate: percent(record.recovered),
            death_rate: percent(record.deaths),
            active,
        })
    }

    /// Metrics of the last record, if there is one.
    pub fn latest(records: &[MergedRecord]) -> Result<Option<Self>> {
        records.last().map(Self::from_record).transpose()
    }

    /// 회복자 / 사망자 / 격리중, summing to `confirmed`.
    pub fn proportions(&self) -> [ProportionSlice; 3] {
        [
            ProportionSlice {
                label: "회복자",
                value: self.recovered,
            },
            ProportionSlice {
                label: "사망자",
                value: self.deaths,
            },
            ProportionSlice {
                label: ACTIVE_LABEL,
                value: self.active,
            },
        ]
    }
}

/// Render a rate the way the dashboard shows it, e.g. `83.33%`.
pub fn format_rate(rate: f64) -> String {
    format!("{:.2}%", rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(confirmed: i64, deaths: i64, recovered: i64) -> MergedRecord {
        MergedRecord {
            date: NaiveDate::from_ymd_opt(2020, 3, 3).unwrap(),
            confirmed,
            deaths,
            recovered,
            new_confirmed: 0,
            new_deaths: 0,
            new_recovered: 0,
        }
    }

    #[test]
    fn rates_of_the_latest_day() {
        let m = SummaryMetrics::from_record(&record(30, 3, 25)).unwrap();
        assert!((m.recovered_rate - 83.333_333).abs() < 1e-4);
        assert!((m.death_rate - 10.0).abs() < 1e-9);
        assert_eq!(m.active, 2);
        assert_eq!(format_rate(m.recovered_rate), "83.33%");
        assert_eq!(format_rate(m.death_rate), "10.00%");
    }

    #[test]
    fn zero_confirmed_gives_zero_rates() {
        let m = SummaryMetrics::from_record(&record(0, 0, 0)).unwrap();
        assert_eq!(m.recovered_rate, 0.0);
        assert_eq!(m.death_rate, 0.0);
        assert_eq!(format_rate(m.death_rate), "0.00%");
    }

    #[test]
    fn proportions_add_up_to_confirmed() {
        let m = SummaryMetrics::from_record(&record(11_000, 260, 9_800)).unwrap();
        let total: i64 = m.proportions().iter().map(|s| s.value).sum();
        assert_eq!(total, m.confirmed);
        assert_eq!(m.proportions()[2].label, "격리중");
    }

    #[test]
    fn latest_uses_the_last_record_only() {
        let records = [record(10, 0, 0), record(20, 2, 10)];
        let m = SummaryMetrics::latest(&records).unwrap().unwrap();
        assert_eq!(m.confirmed, 20);
        assert!((m.recovered_rate - 50.0).abs() < 1e-9);
        assert!(SummaryMetrics::latest(&[]).unwrap().is_none());
    }

    #[test]
    fn active_count_outside_i64_is_an_error() {
        let err = SummaryMetrics::from_record(&record(i64::MIN, 0, 1)).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::CountOverflow { ref quantity, .. } if quantity == ACTIVE_LABEL
        ));
    }
}
