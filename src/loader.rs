use crate::error::{DashboardError, Result};
use crate::metric::Metric;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const PROVINCE_COLUMN: &str = "Province/State";
pub const COUNTRY_COLUMN: &str = "Country/Region";
pub const LAT_COLUMN: &str = "Lat";
pub const LONG_COLUMN: &str = "Long";

lazy_static! {
    static ref DATE_HEADER: Regex = Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").unwrap();
}

/// One region row of a wide-format time series.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionRow {
    pub province: Option<String>,
    pub country: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    /// Cumulative counts, one per entry of [`TimeSeriesTable::dates`].
    pub counts: Vec<i64>,
}

/// Wide-format time series: one row per region, one column per day.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    rows: Vec<RegionRow>,
}

impl TimeSeriesTable {
    /// Date columns in header order.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[RegionRow] {
        &self.rows
    }

    /// Parse a table from any CSV source
    ///
    /// The four metadata columns are found by name; every other header must
    /// be a `M/D/YY` date.
    ///
    /// # Errors
    /// * [`DashboardError::MissingColumn`] if a metadata column is absent
    /// * [`DashboardError::InvalidDateHeader`] for a header that is not a date
    /// * [`DashboardError::InvalidCount`] for a cell that is not a number
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() {
            return Err(DashboardError::EmptyTable);
        }

        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(DashboardError::MissingColumn(name))
        };
        let province_idx = find(PROVINCE_COLUMN)?;
        let country_idx = find(COUNTRY_COLUMN)?;
        let lat_idx = find(LAT_COLUMN)?;
        let long_idx = find(LONG_COLUMN)?;
        let metadata = [province_idx, country_idx, lat_idx, long_idx];

        // (column index, header) of every date column
        let mut date_columns = Vec::new();
        let mut dates = Vec::new();
        let mut seen = HashSet::new();
        for (idx, header) in headers.iter().enumerate() {
            if metadata.contains(&idx) {
                continue;
            }
            let date = parse_date_header(header)?;
            if !seen.insert(date) {
                return Err(DashboardError::DuplicateDate {
                    header: header.to_string(),
                });
            }
            date_columns.push((idx, header.to_string()));
            dates.push(date);
        }

        let mut rows = Vec::new();
        for (r, record) in csv_reader.records().enumerate() {
            let record = record?;
            // Row numbers are 1-based and count the header line
            let row_number = r + 2;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let province = Some(field(province_idx).trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            let mut counts = Vec::with_capacity(date_columns.len());
            for (idx, header) in &date_columns {
                let raw = field(*idx);
                let count = parse_count(raw).ok_or_else(|| DashboardError::InvalidCount {
                    row: row_number,
                    column: header.clone(),
                    value: raw.to_string(),
                })?;
                counts.push(count);
            }

            rows.push(RegionRow {
                province,
                country: field(country_idx).to_string(),
                lat: parse_coordinate(field(lat_idx), row_number)?,
                long: parse_coordinate(field(long_idx), row_number)?,
                counts,
            });
        }

        Ok(TimeSeriesTable { dates, rows })
    }

    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    /// Load a table from a CSV file on disk
    pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(filepath)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}

/// Parse a `M/D/YY` column header; two-digit years below 69 land in the 2000s.
pub fn parse_date_header(header: &str) -> Result<NaiveDate> {
    let invalid = || DashboardError::InvalidDateHeader {
        header: header.to_string(),
    };
    let caps = DATE_HEADER.captures(header).ok_or_else(invalid)?;
    let month: u32 = caps[1].parse().map_err(|_| invalid())?;
    let day: u32 = caps[2].parse().map_err(|_| invalid())?;
    let yy: i32 = caps[3].parse().map_err(|_| invalid())?;
    let year = if yy < 69 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

// Empty cells count as 0 so they drop out of the per-date sum
fn parse_count(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f as i64)
}

fn parse_coordinate(raw: &str, row: usize) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| DashboardError::InvalidCoordinate {
            row,
            value: raw.to_string(),
        })
}

/// A file received from the upload form
#[derive(Clone, Debug)]
pub struct UploadedCsv {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedCsv {
    /// Accept an upload, refusing anything without a `.csv` extension.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let filename = filename.into();
        let is_csv = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(DashboardError::UnsupportedUpload { filename });
        }
        Ok(UploadedCsv { filename, bytes })
    }

    pub fn parse(&self) -> Result<TimeSeriesTable> {
        TimeSeriesTable::from_csv_bytes(&self.bytes)
    }
}

/// The three upload slots of one dashboard session.
#[derive(Clone, Debug, Default)]
pub struct InputSet {
    confirmed: Option<UploadedCsv>,
    deaths: Option<UploadedCsv>,
    recovered: Option<UploadedCsv>,
}

impl InputSet {
    pub fn set(&mut self, metric: Metric, upload: UploadedCsv) {
        *self.slot_mut(metric) = Some(upload);
    }

    pub fn get(&self, metric: Metric) -> Option<&UploadedCsv> {
        match metric {
            Metric::Confirmed => self.confirmed.as_ref(),
            Metric::Deaths => self.deaths.as_ref(),
            Metric::Recovered => self.recovered.as_ref(),
        }
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut Option<UploadedCsv> {
        match metric {
            Metric::Confirmed => &mut self.confirmed,
            Metric::Deaths => &mut self.deaths,
            Metric::Recovered => &mut self.recovered,
        }
    }

    /// Metrics that still have no upload.
    pub fn missing(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Parse all three uploads, or return `None` while any slot is empty.
    pub fn load_tables(&self) -> Result<Option<TableSet>> {
        match (&self.confirmed, &self.deaths, &self.recovered) {
            (Some(c), Some(d), Some(r)) => Ok(Some(TableSet {
                confirmed: c.parse()?,
                deaths: d.parse()?,
                recovered: r.parse()?,
            })),
            _ => Ok(None),
        }
    }
}

/// Parsed confirmed/deaths/recovered tables.
#[derive(Clone, Debug)]
pub struct TableSet {
    pub confirmed: TimeSeriesTable,
    pub deaths: TimeSeriesTable,
    pub recovered: TimeSeriesTable,
}

impl TableSet {
    pub fn from_paths(
        confirmed: impl AsRef<Path>,
        deaths: impl AsRef<Path>,
        recovered: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(TableSet {
            confirmed: TimeSeriesTable::from_csv(confirmed)?,
            deaths: TimeSeriesTable::from_csv(deaths)?,
            recovered: TimeSeriesTable::from_csv(recovered)?,
        })
    }

    pub fn get(&self, metric: Metric) -> &TimeSeriesTable {
        match metric {
            Metric::Confirmed => &self.confirmed,
            Metric::Deaths => &self.deaths,
            Metric::Recovered => &self.recovered,
        }
    }
}
