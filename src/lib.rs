/*!
# South Korea COVID-19 Dashboard

A browser-based dashboard for the Johns Hopkins style COVID-19 time series,
built in Rust.

## Overview

Users upload three wide-format CSV files (confirmed, deaths, recovered). Each
file has `Province/State, Country/Region, Lat, Long` followed by one column per
day in `M/D/YY` form. The dashboard keeps the rows of one region
("Korea, South" by default), joins the three series on date, derives daily
deltas and renders the result in three tabs.

## Architecture

### Data Layer
- **loader**: CSV parsing into [`TimeSeriesTable`], upload slots ([`InputSet`])
- **series**: region filter and wide-to-long reshaping ([`region_series`])
- **merge**: inner join on date and day-over-day deltas ([`merge_series`])
- **metrics**: recovery/fatality rate and active cases of the latest day
- **dashboard**: the whole pipeline for one set of uploads

### Presentation Layer
- **graph**: line, bar and pie charts rendered to SVG with plotters
- **view**: page model of the 감염 추이 / 통계 요약 / 비율 분석 tabs
- **downloader**: CSV and XLSX export of the merged table
- **app**: axum routes and per-session upload storage

Nothing is persisted: every request recomputes the tables from the session's
uploaded bytes.

## REST API Endpoints

- `GET /` - Dashboard page (`?tab=trend|summary|ratio`)
- `POST /upload` - Multipart upload with `confirmed`, `deaths`, `recovered`
- `POST /reset` - Forget the session's uploads
- `GET /export.csv`, `GET /export.xlsx` - Merged table download
- `GET /api/dashboard` - Merged table, summary and join report as JSON
*/

pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod logger;
pub mod merge;
pub mod metric;
pub mod metrics;
pub mod series;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod view;

/// Re-export the data pipeline to make it easier to use
pub use dashboard::*;
pub use error::*;
pub use loader::*;
pub use merge::*;
pub use metric::*;
pub use metrics::*;
pub use series::*;
