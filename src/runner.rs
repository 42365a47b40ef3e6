use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info};

use crate::allocation::{self, AllocationResult, RowRecord, SkipReason};
use crate::order::{OrderIntent, OrderSink};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedOrder {
    pub symbol: String,
    pub notional: Decimal,
    pub order_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_rows: usize,
    pub unique_symbols: usize,
    pub orders_submitted: usize,
    pub skipped: BTreeMap<String, SkipReason>,
    pub submitted: Vec<SubmittedOrder>,
}

/// Keep the first row for each symbol, compared case-insensitively.
pub fn dedupe_symbols(rows: &[RowRecord]) -> Vec<&RowRecord> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| {
            let fresh = seen.insert(row.symbol.to_uppercase());
            if !fresh {
                info!("{}: symbol already processed, skipping duplicate row", row.symbol);
            }
            fresh
        })
        .collect()
}

/// Size every unique row and hand valid orders to `sink`, one at a time in
/// input order. A failed submission is recorded against its symbol and the
/// run moves on.
pub async fn run<S: OrderSink + ?Sized>(
    rows: &[RowRecord],
    buying_power: f64,
    sink: &S,
) -> RunSummary {
    let unique = dedupe_symbols(rows);
    let mut summary = RunSummary {
        total_rows: rows.len(),
        unique_symbols: unique.len(),
        ..RunSummary::default()
    };

    for row in unique {
        let sized = allocation::size_row(row, buying_power);
        if let Ok(sizing) = &sized {
            debug!(
                "{}: bracket={} icon={} ma_factor={:.4} sentiment={} raw_notional={:.4}",
                row.symbol,
                sizing.bracket_pct,
                sizing.icon_mult,
                sizing.ma_factor,
                sizing.sentiment_mult,
                sizing.notional
            );
        }

        match allocation::settle(row.symbol.clone(), sized) {
            AllocationResult::Skipped { symbol, reason } => {
                info!("{}: skipping ({})", symbol, reason);
                summary.skipped.insert(symbol, reason);
            }
            AllocationResult::Valid { symbol, notional } => {
                let intent = OrderIntent::market_buy(symbol, notional);
                info!("{}: submitting market BUY for ${}", intent.symbol, intent.notional);

                match sink.submit(&intent).await {
                    Ok(order_id) => {
                        info!("{}: order submitted (id {})", intent.symbol, order_id);
                        summary.orders_submitted += 1;
                        summary.submitted.push(SubmittedOrder {
                            symbol: intent.symbol,
                            notional: intent.notional,
                            order_id,
                        });
                    }
                    Err(e) => {
                        error!("{}: failed to submit order: {}", intent.symbol, e);
                        summary
                            .skipped
                            .insert(intent.symbol, SkipReason::SubmissionFailed(e.to_string()));
                    }
                }
            }
        }
    }

    summary
}

/// Write the end-of-run tally to the log.
pub fn log_summary(summary: &RunSummary) {
    info!(
        "Finished run. Rows: {}, unique symbols: {}, orders submitted: {}, skipped: {}",
        summary.total_rows,
        summary.unique_symbols,
        summary.orders_submitted,
        summary.skipped.len()
    );
    for (symbol, reason) in &summary.skipped {
        info!("  skipped {}: {}", symbol, reason);
    }
    match serde_json::to_string(summary) {
        Ok(json) => debug!("summary: {}", json),
        Err(e) => debug!("could not serialize summary: {}", e),
    }
}
