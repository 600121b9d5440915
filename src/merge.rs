use crate::error::{DashboardError, Result};
use crate::metric::Metric;
use crate::series::RegionSeries;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which cumulative column the 신규 회복자 delta is taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveredDelta {
    /// Difference of the recovered column.
    #[default]
    FromRecovered,
    /// Difference of the confirmed column. Reproduces the legacy 신규 회복자
    /// figures, which repeated 신규 확진자.
    FromConfirmed,
}

/// One day of the merged table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MergedRecord {
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub new_confirmed: i64,
    pub new_deaths: i64,
    pub new_recovered: i64,
}

impl MergedRecord {
    pub fn cumulative(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }

    pub fn daily(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Confirmed => self.new_confirmed,
            Metric::Deaths => self.new_deaths,
            Metric::Recovered => self.new_recovered,
        }
    }
}

/// Dates one input had that the others lacked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DroppedDates {
    pub metric: Metric,
    pub dates: Vec<NaiveDate>,
}

/// What the inner join threw away.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub dropped: Vec<DroppedDates>,
}

impl MergeReport {
    pub fn total_dropped(&self) -> usize {
        self.dropped.iter().map(|d| d.dates.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total_dropped() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MergedTable {
    pub records: Vec<MergedRecord>,
    pub report: MergeReport,
}

impl MergedTable {
    pub fn latest(&self) -> Option<&MergedRecord> {
        self.records.last()
    }

    /// The last `n` records, oldest first.
    pub fn tail(&self, n: usize) -> &[MergedRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }
}

/// Inner-join three region series on date and derive daily deltas
///
/// Only dates present in all three inputs survive; the rest are listed in
/// the returned [`MergeReport`]. Deltas are taken against the preceding
/// merged row, and the first row's deltas are 0. A delta outside the `i64`
/// range is a [`DashboardError::CountOverflow`].
pub fn merge_series(
    confirmed: &RegionSeries,
    deaths: &RegionSeries,
    recovered: &RegionSeries,
    recovered_delta: RecoveredDelta,
) -> Result<MergedTable> {
    let index = |s: &RegionSeries| -> BTreeMap<NaiveDate, i64> {
        s.points.iter().map(|p| (p.date, p.value)).collect()
    };
    let c = index(confirmed);
    let d = index(deaths);
    let r = index(recovered);

    let mut records: Vec<MergedRecord> = Vec::with_capacity(c.len());
    for (&date, &conf) in &c {
        let (Some(&dead), Some(&rec)) = (d.get(&date), r.get(&date)) else {
            continue;
        };
        records.push(MergedRecord {
            date,
            confirmed: conf,
            deaths: dead,
            recovered: rec,
            new_confirmed: 0,
            new_deaths: 0,
            new_recovered: 0,
        });
    }
    fill_deltas(&mut records, recovered_delta)?;

    let kept: BTreeSet<NaiveDate> = records.iter().map(|rec| rec.date).collect();
    let mut report = MergeReport::default();
    for (metric, dates) in [
        (Metric::Confirmed, &c),
        (Metric::Deaths, &d),
        (Metric::Recovered, &r),
    ] {
        let dropped: Vec<NaiveDate> = dates.keys().filter(|d| !kept.contains(*d)).copied().collect();
        if !dropped.is_empty() {
            warn!(
                "inner join dropped {} {} date(s), first {}",
                dropped.len(),
                metric.key(),
                dropped[0]
            );
            report.dropped.push(DroppedDates {
                metric,
                dates: dropped,
            });
        }
    }

    Ok(MergedTable { records, report })
}

fn fill_deltas(records: &mut [MergedRecord], recovered_delta: RecoveredDelta) -> Result<()> {
    for i in 1..records.len() {
        let prev = records[i - 1];
        let cur = &mut records[i];
        let delta = |metric: Metric| {
            cur.cumulative(metric)
                .checked_sub(prev.cumulative(metric))
                .ok_or_else(|| DashboardError::CountOverflow {
                    quantity: metric.daily_label().to_string(),
                    date: cur.date,
                })
        };
        let new_confirmed = delta(Metric::Confirmed)?;
        let new_deaths = delta(Metric::Deaths)?;
        let new_recovered = match recovered_delta {
            RecoveredDelta::FromRecovered => delta(Metric::Recovered)?,
            RecoveredDelta::FromConfirmed => new_confirmed,
        };
        cur.new_confirmed = new_confirmed;
        cur.new_deaths = new_deaths;
        cur.new_recovered = new_recovered;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::DatedValue;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn series(metric: Metric, points: &[(u32, i64)]) -> RegionSeries {
        RegionSeries {
            metric,
            region: "Korea, South".to_string(),
            matched_rows: 1,
            points: points
                .iter()
                .map(|&(d, value)| DatedValue { date: day(d), value })
                .collect(),
        }
    }

    fn scenario(mode: RecoveredDelta) -> MergedTable {
        merge_series(
            &series(Metric::Confirmed, &[(1, 10), (2, 20), (3, 30)]),
            &series(Metric::Deaths, &[(1, 1), (2, 2), (3, 3)]),
            &series(Metric::Recovered, &[(1, 5), (2, 15), (3, 25)]),
            mode,
        )
        .unwrap()
    }

    #[test]
    fn identical_date_sets_keep_every_row() {
        let merged = scenario(RecoveredDelta::FromRecovered);
        assert_eq!(merged.records.len(), 3);
        assert!(merged.report.is_clean());
    }

    #[test]
    fn deltas_difference_the_previous_row() {
        let merged = scenario(RecoveredDelta::FromRecovered);
        let new_confirmed: Vec<_> = merged.records.iter().map(|r| r.new_confirmed).collect();
        assert_eq!(new_confirmed, vec![0, 10, 10]);
        let new_deaths: Vec<_> = merged.records.iter().map(|r| r.new_deaths).collect();
        assert_eq!(new_deaths, vec![0, 1, 1]);
        for w in merged.records.windows(2) {
            assert_eq!(w[1].new_confirmed, w[1].confirmed - w[0].confirmed);
        }
    }

    #[test]
    fn corrected_recovered_delta_uses_recovered_column() {
        let mut merged = scenario(RecoveredDelta::FromRecovered);
        // Make the two possible sources disagree
        merged.records[2].recovered = 40;
        fill_deltas(&mut merged.records, RecoveredDelta::FromRecovered).unwrap();
        let new_recovered: Vec<_> = merged.records.iter().map(|r| r.new_recovered).collect();
        assert_eq!(new_recovered, vec![0, 10, 25]);
    }

    #[test]
    fn legacy_recovered_delta_copies_confirmed_delta() {
        let merged = merge_series(
            &series(Metric::Confirmed, &[(1, 10), (2, 25)]),
            &series(Metric::Deaths, &[(1, 0), (2, 0)]),
            &series(Metric::Recovered, &[(1, 0), (2, 3)]),
            RecoveredDelta::FromConfirmed,
        )
        .unwrap();
        assert_eq!(merged.records[1].new_recovered, 15);
        assert_eq!(merged.records[1].new_recovered, merged.records[1].new_confirmed);
    }

    #[test]
    fn partial_overlap_keeps_the_intersection_and_reports_the_rest() {
        let merged = merge_series(
            &series(Metric::Confirmed, &[(1, 1), (2, 2), (3, 3), (4, 4)]),
            &series(Metric::Deaths, &[(2, 0), (3, 0), (4, 0)]),
            &series(Metric::Recovered, &[(1, 0), (2, 0), (3, 0), (5, 0)]),
            RecoveredDelta::FromRecovered,
        )
        .unwrap();
        let dates: Vec<_> = merged.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2), day(3)]);
        // The first surviving row has no baseline
        assert_eq!(merged.records[0].new_confirmed, 0);
        assert_eq!(merged.records[1].new_confirmed, 1);

        assert_eq!(merged.report.total_dropped(), 5);
        let confirmed = &merged.report.dropped[0];
        assert_eq!(confirmed.metric, Metric::Confirmed);
        assert_eq!(confirmed.dates, vec![day(1), day(4)]);
        let recovered = merged
            .report
            .dropped
            .iter()
            .find(|d| d.metric == Metric::Recovered)
            .unwrap();
        assert_eq!(recovered.dates, vec![day(1), day(5)]);
    }

    #[test]
    fn tail_returns_the_most_recent_rows() {
        let merged = scenario(RecoveredDelta::FromRecovered);
        assert_eq!(merged.tail(10).len(), 3);
        let last_two = merged.tail(2);
        assert_eq!(last_two[0].date, day(2));
        assert_eq!(merged.latest().unwrap().date, day(3));
        assert!(MergedTable::default().latest().is_none());
    }

    #[test]
    fn delta_outside_i64_is_an_error() {
        let result = merge_series(
            &series(Metric::Confirmed, &[(1, i64::MIN), (2, i64::MAX)]),
            &series(Metric::Deaths, &[(1, 0), (2, 0)]),
            &series(Metric::Recovered, &[(1, 0), (2, 0)]),
            RecoveredDelta::FromRecovered,
        );
        match result {
            Err(DashboardError::CountOverflow { quantity, date }) => {
                assert_eq!(quantity, "신규 확진자");
                assert_eq!(date, day(2));
            }
            other => panic!("expected an overflow error, got {:?}", other),
        }
    }
}
