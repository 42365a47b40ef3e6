//! Everything that happens before the first row is evaluated: validating
//! the capital source, choosing the order sink and loading the sheet. Any
//! failure here aborts the run before an order can be placed.

use std::future::Future;
use std::path::Path;
use tracing::{info, warn};

use crate::allocation::RowRecord;
use crate::broker::{AlpacaClient, DryRunSink};
use crate::config::{AlpacaSettings, SheetSettings};
use crate::error::SetupError;
use crate::order::OrderSink;
use crate::runner::{self, RunSummary};
use crate::sheet::{self, SheetClient};

/// Buying power must be a finite, non-negative dollar amount.
pub fn checked_capital(value: f64) -> Result<f64, SetupError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SetupError::InvalidCapital(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capital {
    /// Given on the command line, already checked.
    Override(f64),
    /// Read from `GET /v2/account`.
    FromAccount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub alpaca: Option<AlpacaSettings>,
    pub capital: Capital,
    pub submit_orders: bool,
}

/// Decide where capital comes from and whether orders go to the broker.
///
/// Missing Alpaca credentials are tolerated only for a dry run with an
/// explicit buying power; every other setting error is passed through.
pub fn plan(
    dry_run: bool,
    buying_power: Option<f64>,
    alpaca: Result<AlpacaSettings, SetupError>,
) -> Result<Plan, SetupError> {
    let capital = match buying_power {
        Some(bp) => Capital::Override(checked_capital(bp)?),
        None => Capital::FromAccount,
    };

    let alpaca = match alpaca {
        Ok(settings) => Some(settings),
        Err(SetupError::MissingEnv(_)) if dry_run && capital != Capital::FromAccount => None,
        Err(e) => return Err(e),
    };

    Ok(Plan {
        alpaca,
        capital,
        submit_orders: !dry_run,
    })
}

impl Plan {
    pub fn connect(&self) -> Result<Option<AlpacaClient>, SetupError> {
        let Some(settings) = &self.alpaca else {
            return Ok(None);
        };
        if settings.is_live() && self.submit_orders {
            warn!("Using LIVE trading endpoint {}", settings.base_url);
        }
        AlpacaClient::new(settings).map(Some)
    }
}

pub async fn buying_power(
    capital: Capital,
    broker: Option<&AlpacaClient>,
) -> Result<f64, SetupError> {
    match (capital, broker) {
        (Capital::Override(bp), _) => {
            info!("Using buying power override: {:.2}", bp);
            Ok(bp)
        }
        (Capital::FromAccount, Some(client)) => client.account().await?.buying_power(),
        (Capital::FromAccount, None) => Err(SetupError::MissingEnv("ALPACA_API_KEY")),
    }
}

pub fn select_sink(broker: Option<AlpacaClient>, submit_orders: bool) -> Box<dyn OrderSink> {
    match broker {
        Some(client) if submit_orders => Box::new(client),
        _ => {
            info!("Dry run: orders will be logged, not submitted");
            Box::new(DryRunSink::default())
        }
    }
}

/// Rows from a saved values file, or from the live sheet when no file is given.
pub async fn load_rows(rows_file: Option<&Path>) -> Result<Vec<RowRecord>, SetupError> {
    let grid = match rows_file {
        Some(path) => sheet::load_grid_file(path)?,
        None => {
            SheetClient::new(SheetSettings::from_env()?)?
                .fetch_grid()
                .await?
        }
    };
    Ok(sheet::parse_rows(&grid)
        .into_iter()
        .map(|r| r.record)
        .collect())
}

/// Resolve capital and rows, then run. `sink` is untouched unless both
/// resolve.
pub async fn run_after_setup<C, R, S>(
    capital: C,
    rows: R,
    sink: &S,
) -> Result<RunSummary, SetupError>
where
    C: Future<Output = Result<f64, SetupError>>,
    R: Future<Output = Result<Vec<RowRecord>, SetupError>>,
    S: OrderSink + ?Sized,
{
    let buying_power = checked_capital(capital.await?)?;
    let rows = rows.await?;
    Ok(runner::run(&rows, buying_power, sink).await)
}
