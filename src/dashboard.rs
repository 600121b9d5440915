use crate::config::DashboardOptions;
use crate::error::Result;
use crate::loader::{InputSet, TableSet};
use crate::merge::{MergedTable, merge_series};
use crate::metric::Metric;
use crate::metrics::SummaryMetrics;
use crate::series::region_series;
use log::debug;
use serde::Serialize;

/// Everything the three tabs render, derived from one set of uploads.
#[derive(Clone, Debug, Serialize)]
pub struct Dashboard {
    pub region: String,
    pub merged: MergedTable,
    pub summary: Option<SummaryMetrics>,
    /// Inputs in which the region had no rows.
    pub unmatched: Vec<Metric>,
}

impl Dashboard {
    /// Run extraction, merge and derivation over the three tables.
    pub fn build(tables: &TableSet, options: &DashboardOptions) -> Result<Self> {
        let series = |metric| region_series(tables.get(metric), &options.region, metric);
        let confirmed = series(Metric::Confirmed)?;
        let deaths = series(Metric::Deaths)?;
        let recovered = series(Metric::Recovered)?;

        let unmatched = [&confirmed, &deaths, &recovered]
            .into_iter()
            .filter(|s| s.matched_rows == 0)
            .map(|s| s.metric)
            .collect();

        let merged = merge_series(&confirmed, &deaths, &recovered, options.recovered_delta)?;
        let summary = SummaryMetrics::latest(&merged.records)?;
        debug!(
            "built dashboard for '{}': {} merged rows",
            options.region,
            merged.records.len()
        );

        Ok(Dashboard {
            region: options.region.clone(),
            merged,
            summary,
            unmatched,
        })
    }

    /// Parse the session's uploads and build the dashboard; `None` until all
    /// three files are present.
    pub fn from_inputs(inputs: &InputSet, options: &DashboardOptions) -> Result<Option<Self>> {
        inputs
            .load_tables()?
            .map(|tables| Dashboard::build(&tables, options))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TimeSeriesTable;
    use crate::merge::RecoveredDelta;

    fn table(korea: [i64; 3]) -> TimeSeriesTable {
        let csv = format!(
            "Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20\n\
             ,\"Korea, South\",35.9,127.7,{},{},{}\n\
             ,Italy,41.8,12.5,100,200,300\n",
            korea[0], korea[1], korea[2]
        );
        TimeSeriesTable::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn end_to_end_scenario() {
        let tables = TableSet {
            confirmed: table([10, 20, 30]),
            deaths: table([1, 2, 3]),
            recovered: table([5, 15, 25]),
        };
        let dashboard = Dashboard::build(&tables, &DashboardOptions::default()).unwrap();

        let new_confirmed: Vec<_> = dashboard.merged.records.iter().map(|r| r.new_confirmed).collect();
        assert_eq!(new_confirmed, vec![0, 10, 10]);
        assert!(dashboard.unmatched.is_empty());

        let summary = dashboard.summary.unwrap();
        assert!((summary.recovered_rate - 25.0 / 30.0 * 100.0).abs() < 1e-9);
        assert!((summary.death_rate - 10.0).abs() < 1e-9);
        assert_eq!(summary.active, 2);
    }

    #[test]
    fn legacy_option_reaches_the_merge() {
        let tables = TableSet {
            confirmed: table([10, 20, 30]),
            deaths: table([1, 2, 3]),
            recovered: table([5, 6, 7]),
        };
        let options = DashboardOptions {
            recovered_delta: RecoveredDelta::FromConfirmed,
            ..DashboardOptions::default()
        };
        let dashboard = Dashboard::build(&tables, &options).unwrap();
        let new_recovered: Vec<_> = dashboard.merged.records.iter().map(|r| r.new_recovered).collect();
        assert_eq!(new_recovered, vec![0, 10, 10]);
    }

    #[test]
    fn unknown_region_reports_every_input() {
        let tables = TableSet {
            confirmed: table([1, 2, 3]),
            deaths: table([0, 0, 0]),
            recovered: table([0, 1, 1]),
        };
        let options = DashboardOptions {
            region: "Atlantis".to_string(),
            ..DashboardOptions::default()
        };
        let dashboard = Dashboard::build(&tables, &options).unwrap();
        assert_eq!(dashboard.unmatched, Metric::ALL.to_vec());
        let summary = dashboard.summary.unwrap();
        assert_eq!(summary.confirmed, 0);
        assert_eq!(summary.recovered_rate, 0.0);
    }
}
