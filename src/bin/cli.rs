#![cfg(not(tarpaulin_include))]

use clap::Parser;
use kr_dashboard::config::{DEFAULT_TAIL_ROWS, DashboardOptions, recovered_delta};
use kr_dashboard::logger::init_logging;
use kr_dashboard::{DATE_LABEL, Dashboard, DEFAULT_REGION, Metric, TableSet, format_rate};
use std::path::PathBuf;

/// Print the dashboard's summary table and ratios for three local CSV files
#[derive(Debug, Parser)]
#[command(name = "kr-summary")]
struct Args {
    /// Confirmed cases time series
    confirmed: PathBuf,
    /// Deaths time series
    deaths: PathBuf,
    /// Recovered time series
    recovered: PathBuf,

    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    #[arg(long, default_value_t = DEFAULT_TAIL_ROWS)]
    tail_rows: usize,

    /// Derive 신규 회복자 from the confirmed column like the legacy dashboard
    #[arg(long)]
    legacy_recovered_delta: bool,

    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let tables = TableSet::from_paths(&args.confirmed, &args.deaths, &args.recovered)?;
    let options = DashboardOptions {
        region: args.region,
        tail_rows: args.tail_rows,
        recovered_delta: recovered_delta(args.legacy_recovered_delta),
    };
    let dashboard = Dashboard::build(&tables, &options)?;

    for metric in &dashboard.unmatched {
        println!("warning: no '{}' rows in the {} file", dashboard.region, metric.key());
    }
    for dropped in &dashboard.merged.report.dropped {
        println!(
            "warning: {} date(s) only in the {} file were dropped",
            dropped.dates.len(),
            dropped.metric.key()
        );
    }

    print!("{:<12}", DATE_LABEL);
    for metric in Metric::ALL {
        print!("{:>12}", metric.label());
    }
    for metric in Metric::ALL {
        print!("{:>14}", metric.daily_label());
    }
    println!();
    for record in dashboard.merged.tail(options.tail_rows) {
        print!("{:<12}", record.date.format("%Y-%m-%d"));
        for metric in Metric::ALL {
            print!("{:>12}", record.cumulative(metric));
        }
        for metric in Metric::ALL {
            print!("{:>14}", record.daily(metric));
        }
        println!();
    }

    match dashboard.summary {
        Some(summary) => {
            println!();
            println!("최신일 {}", summary.date);
            println!("회복률 {}", format_rate(summary.recovered_rate));
            println!("치명률 {}", format_rate(summary.death_rate));
            for slice in summary.proportions() {
                println!("{} {}", slice.label, slice.value);
            }
        }
        None => println!("no dates are shared by all three files"),
    }

    Ok(())
}
