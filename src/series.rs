use crate::error::{DashboardError, Result};
use crate::loader::TimeSeriesTable;
use crate::metric::Metric;
use chrono::NaiveDate;
use log::warn;
use serde::Serialize;

/// Region label the upstream data uses for South Korea.
pub const DEFAULT_REGION: &str = "Korea, South";

/// A single (date, cumulative count) observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: i64,
}

/// One metric of one region in long form, ascending by date.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionSeries {
    pub metric: Metric,
    pub region: String,
    /// Number of source rows that matched the region; 0 means the series is
    /// all zeros because nothing matched.
    pub matched_rows: usize,
    pub points: Vec<DatedValue>,
}

/// Project a wide table onto one region
///
/// Rows whose `Country/Region` equals `region` exactly are summed per date
/// (a country split into provinces yields one total). The result has one
/// point per date column, sorted ascending.
///
/// # Arguments
/// * `table` - Parsed wide-format table
/// * `region` - Exact `Country/Region` label to keep
/// * `metric` - What the table counts; labels the output
///
/// # Errors
/// [`DashboardError::CountOverflow`] when a per-date total leaves the `i64`
/// range.
pub fn region_series(table: &TimeSeriesTable, region: &str, metric: Metric) -> Result<RegionSeries> {
    let mut totals = vec![0i64; table.dates().len()];
    let mut matched_rows = 0;

    for row in table.rows().iter().filter(|row| row.country == region) {
        matched_rows += 1;
        for ((total, count), &date) in totals.iter_mut().zip(&row.counts).zip(table.dates()) {
            *total = total
                .checked_add(*count)
                .ok_or_else(|| DashboardError::CountOverflow {
                    quantity: metric.label().to_string(),
                    date,
                })?;
        }
    }

    if matched_rows == 0 {
        warn!("no '{}' rows in the {} table", region, metric.key());
    }

    let mut points: Vec<DatedValue> = table
        .dates()
        .iter()
        .zip(totals)
        .map(|(&date, value)| DatedValue { date, value })
        .collect();
    points.sort_by_key(|p| p.date);

    Ok(RegionSeries {
        metric,
        region: region.to_string(),
        matched_rows,
        points,
    })
}

/// [`region_series`] for "Korea, South".
pub fn korea_series(table: &TimeSeriesTable, metric: Metric) -> Result<RegionSeries> {
    region_series(table, DEFAULT_REGION, metric)
}
