use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AlpacaSettings;
use crate::error::{SetupError, SubmitError};
use crate::order::{OrderIntent, OrderSide, OrderSink, TimeInForce};

#[derive(Debug, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub account_number: String,
    pub buying_power: String,
    #[serde(default)]
    pub status: String,
}

impl Account {
    pub fn buying_power(&self) -> Result<f64, SetupError> {
        match self.buying_power.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(SetupError::InvalidCapital(self.buying_power.clone())),
        }
    }
}

/// JSON body for `POST /v2/orders`.
#[derive(Debug, Serialize)]
pub struct OrderRequest<'a> {
    pub symbol: &'a str,
    pub notional: Decimal,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub time_in_force: TimeInForce,
}

impl<'a> From<&'a OrderIntent> for OrderRequest<'a> {
    fn from(intent: &'a OrderIntent) -> Self {
        OrderRequest {
            symbol: &intent.symbol,
            notional: intent.notional,
            side: intent.side,
            order_type: "market",
            time_in_force: intent.time_in_force,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

/// Alpaca trading API client. Clones share one connection pool.
#[derive(Clone)]
pub struct AlpacaClient {
    http: reqwest::Client,
    base_url: String,
}

impl AlpacaClient {
    pub fn new(settings: &AlpacaSettings) -> Result<Self, SetupError> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", header_value("ALPACA_API_KEY", &settings.api_key)?);
        headers.insert(
            "APCA-API-SECRET-KEY",
            header_value("ALPACA_API_SECRET", &settings.api_secret)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(AlpacaClient {
            http,
            base_url: settings.base_url.clone(),
        })
    }

    /// Fetch the account; this doubles as the credential check.
    pub async fn account(&self) -> Result<Account, SetupError> {
        let resp = self
            .http
            .get(format!("{}/v2/account", self.base_url))
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(SetupError::Upstream {
                service: "alpaca",
                status: status.as_u16(),
                body: text,
            });
        }

        let account: Account = serde_json::from_str(&text)?;
        info!(
            "Connected to Alpaca account {} ({}). Buying power: {}",
            account.account_number, account.status, account.buying_power
        );
        Ok(account)
    }
}

fn header_value(name: &'static str, raw: &str) -> Result<HeaderValue, SetupError> {
    let mut value = HeaderValue::from_str(raw).map_err(|e| SetupError::InvalidSetting {
        name,
        message: e.to_string(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait]
impl OrderSink for AlpacaClient {
    async fn submit(&self, intent: &OrderIntent) -> Result<String, SubmitError> {
        let resp = self
            .http
            .post(format!("{}/v2/orders", self.base_url))
            .json(&OrderRequest::from(intent))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        // An accepted order whose body we cannot read is still accepted.
        match resp.text().await {
            Ok(text) => Ok(order_id_from_body(&text)),
            Err(e) => {
                warn!("{}: order accepted but response unreadable: {}", intent.symbol, e);
                Ok(String::from(UNKNOWN_ORDER_ID))
            }
        }
    }
}

pub const UNKNOWN_ORDER_ID: &str = "unknown";

fn order_id_from_body(text: &str) -> String {
    serde_json::from_str::<OrderResponse>(text)
        .map(|o| o.id)
        .unwrap_or_else(|_| String::from(UNKNOWN_ORDER_ID))
}

/// Logs orders instead of sending them.
#[derive(Debug, Default)]
pub struct DryRunSink {
    count: AtomicUsize,
}

#[async_trait]
impl OrderSink for DryRunSink {
    async fn submit(&self, intent: &OrderIntent) -> Result<String, SubmitError> {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "[DRY RUN] would place market {:?} {} for ${} ({:?})",
            intent.side, intent.symbol, intent.notional, intent.time_in_force
        );
        Ok(format!("dry-run-{}", n))
    }
}
