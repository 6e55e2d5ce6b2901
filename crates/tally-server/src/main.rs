//! `tally` binary: HTTP service and local aggregation CLI

use tally_server::cli::{self, CliCommand};
use tally_server::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::parse();
    telemetry::init(cli.log_format)?;

    match cli.command {
        CliCommand::Serve(config) => tally_server::serve(config).await,
        CliCommand::Aggregate(args) => {
            let summary = tokio::task::spawn_blocking(move || cli::run_aggregate(&args)).await??;
            eprintln!(
                "aggregated {} rows into {} groups{}",
                summary.rows_read,
                summary.groups,
                if summary.header_skipped { " (header skipped)" } else { "" }
            );
            Ok(())
        }
    }
}
