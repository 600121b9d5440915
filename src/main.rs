#![cfg(not(tarpaulin_include))]

use clap::Parser;
use kr_dashboard::app;
use kr_dashboard::config::Config;
use kr_dashboard::logger::init_logging;

/// Main entry point for the dashboard web server
///
/// Parses the command line, initialises logging and serves the dashboard
/// until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_logging(config.log_level.as_deref());

    app::run(config).await
}
