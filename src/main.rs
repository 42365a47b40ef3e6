use clap::Parser;
use std::path::PathBuf;
use tracing::error;

use sheet_allocator::config::AlpacaSettings;
use sheet_allocator::runner::{self, RunSummary};
use sheet_allocator::{setup, SetupError};

/// Size market buys from the signal sheet and send them to Alpaca.
#[derive(Parser)]
#[command(name = "sheet_allocator")]
struct Cli {
    /// Log the orders instead of submitting them.
    #[arg(long)]
    dry_run: bool,

    /// Read sheet values from a saved Sheets API response instead of the network.
    #[arg(long, value_name = "PATH")]
    rows_file: Option<PathBuf>,

    /// Use this buying power instead of the account's.
    #[arg(long, value_name = "DOLLARS")]
    buying_power: Option<f64>,
}

async fn execute(cli: Cli) -> Result<RunSummary, SetupError> {
    let plan = setup::plan(cli.dry_run, cli.buying_power, AlpacaSettings::from_env())?;
    let broker = plan.connect()?;
    let sink = setup::select_sink(broker.clone(), plan.submit_orders);

    setup::run_after_setup(
        setup::buying_power(plan.capital, broker.as_ref()),
        setup::load_rows(cli.rows_file.as_deref()),
        sink.as_ref(),
    )
    .await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_allocator=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match execute(cli).await {
        Ok(summary) => runner::log_summary(&summary),
        Err(e) => {
            error!("Run aborted: {}", e);
            std::process::exit(1);
        }
    }
}
