use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
}

/// A dollar-notional market order ready for the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub notional: Decimal,
    pub side: OrderSide,
    pub time_in_force: TimeInForce,
}

impl OrderIntent {
    pub fn market_buy(symbol: impl Into<String>, notional: Decimal) -> Self {
        OrderIntent {
            symbol: symbol.into(),
            notional,
            side: OrderSide::Buy,
            time_in_force: TimeInForce::Day,
        }
    }
}

/// Where sized orders go. Returns the broker's order id on success.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit(&self, intent: &OrderIntent) -> Result<String, SubmitError>;
}
