use crate::merge::RecoveredDelta;
use crate::series::DEFAULT_REGION;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_TAIL_ROWS: usize = 10;
pub const DEFAULT_SESSION_TTL_MINS: u64 = 60;

/// Knobs of the ingest → merge pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardOptions {
    /// Exact `Country/Region` label to extract.
    pub region: String,
    /// Rows shown in the 통계 요약 table.
    pub tail_rows: usize,
    pub recovered_delta: RecoveredDelta,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            tail_rows: DEFAULT_TAIL_ROWS,
            recovered_delta: RecoveredDelta::default(),
        }
    }
}

/// Command line of the dashboard server.
#[derive(Debug, Parser)]
#[command(name = "dashboard", about = "South Korea COVID-19 dashboard server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Country/Region label to extract from the uploads
    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,

    /// Rows shown in the summary table
    #[arg(long, default_value_t = DEFAULT_TAIL_ROWS)]
    pub tail_rows: usize,

    /// Derive 신규 회복자 from the confirmed column like the legacy dashboard
    #[arg(long)]
    pub legacy_recovered_delta: bool,

    /// Largest accepted upload request, in MiB
    #[arg(long, default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Minutes a session's uploads are kept after its last upload
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_MINS)]
    pub session_ttl_mins: u64,

    /// Log level (error, warn, info, debug, trace); falls back to RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn options(&self) -> DashboardOptions {
        DashboardOptions {
            region: self.region.clone(),
            tail_rows: self.tail_rows,
            recovered_delta: recovered_delta(self.legacy_recovered_delta),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_mins.saturating_mul(60))
    }
}

pub fn recovered_delta(legacy: bool) -> RecoveredDelta {
    if legacy {
        RecoveredDelta::FromConfirmed
    } else {
        RecoveredDelta::FromRecovered
    }
}
