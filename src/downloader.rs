use crate::error::{DashboardError, Result};
use crate::merge::MergedRecord;
use crate::metric::{DATE_LABEL, Metric};

/// Column headers of the exported merged table.
pub fn export_headers() -> Vec<&'static str> {
    let mut headers = vec![DATE_LABEL];
    headers.extend(Metric::ALL.map(Metric::label));
    headers.extend(Metric::ALL.map(Metric::daily_label));
    headers
}

fn row_values(record: &MergedRecord) -> [i64; 6] {
    [
        record.confirmed,
        record.deaths,
        record.recovered,
        record.new_confirmed,
        record.new_deaths,
        record.new_recovered,
    ]
}

/// Convert the merged table to CSV
///
/// Dates are written as `YYYY-MM-DD`, one row per merged record.
pub fn to_csv(records: &[MergedRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(export_headers())?;

    for record in records {
        let mut row = vec![record.date.format("%Y-%m-%d").to_string()];
        row.extend(row_values(record).iter().map(i64::to_string));
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DashboardError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DashboardError::Export(e.to_string()))
}

/// Convert the merged table to XLSX
///
/// Same layout as [`to_csv`], in a single worksheet.
#[cfg(feature = "web")]
pub fn to_xlsx(records: &[MergedRecord]) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let export = |e: rust_xlsxwriter::XlsxError| DashboardError::Export(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, header) in export_headers().into_iter().enumerate() {
        worksheet.write_string(0, c as u16, header).map_err(export)?;
    }

    for (r, record) in records.iter().enumerate() {
        let row = (r + 1) as u32;
        let date = record.date.format("%Y-%m-%d").to_string();
        worksheet.write_string(row, 0, &date).map_err(export)?;
        for (c, value) in row_values(record).into_iter().enumerate() {
            worksheet
                .write_number(row, (c + 1) as u16, value as f64)
                .map_err(export)?;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn records() -> Vec<MergedRecord> {
        vec![
            MergedRecord {
                date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                confirmed: 10,
                deaths: 1,
                recovered: 5,
                new_confirmed: 0,
                new_deaths: 0,
                new_recovered: 0,
            },
            MergedRecord {
                date: NaiveDate::from_ymd_opt(2020, 3, 2).unwrap(),
                confirmed: 20,
                deaths: 2,
                recovered: 15,
                new_confirmed: 10,
                new_deaths: 1,
                new_recovered: 10,
            },
        ]
    }

    #[test]
    fn csv_has_korean_header_and_one_row_per_record() {
        let csv = to_csv(&records()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "날짜,확진자,사망자,회복자,신규 확진자,신규 사망자,신규 회복자"
        );
        assert_eq!(lines[2], "2020-03-02,20,2,15,10,1,10");
    }

    #[test]
    fn csv_of_empty_table_is_just_the_header() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx(&records()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
