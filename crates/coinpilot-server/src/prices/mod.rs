//! Crypto prices from several independent upstream APIs.
//!
//! Each upstream is a [`PriceSource`]; the [`PriceAggregator`] asks all of them at once
//! and averages whatever came back in time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

mod aggregator;
mod coinbase;
mod coincap;
mod coingecko;
mod ids;

pub use aggregator::PriceAggregator;
pub use coinbase::{Coinbase, COINBASE_URL};
pub use coincap::{CoinCap, COINCAP_URL};
pub use coingecko::{CoinGecko, COINGECKO_URL};
pub use ids::{CoinIdMapper, StaticIdTable};

#[cfg(test)]
pub(crate) use aggregator::tests as testing;

/// What one source reported for one coin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePrice {
    pub price: f64,
    /// Percent change over the last 24 hours, when the source reports it
    pub change_24h: Option<f64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("unparseable response: {0}")]
    Body(String),

    #[error("no price for '{0}' in response")]
    MissingPrice(String),

    #[error("'{0}' cannot be used as a coin id")]
    InvalidId(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("All sources failed")]
    AllSourcesFailed,
}

/// One upstream price API
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Display name used in summaries and logs
    fn name(&self) -> &str;

    /// Fetch the USD price of `coin_id`, exactly once, without retries
    async fn fetch(&self, coin_id: &str) -> Result<SourcePrice, SourceError>;
}

/// A source's view of one coin within an aggregation; `price` is `None` when the source
/// failed or did not answer in time
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub source: String,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPrice {
    pub coin_id: String,
    /// Mean over the quotes that are present
    pub average: f64,
    /// Mean of the 24h changes reported by the sources that answered
    pub change_24h: Option<f64>,
    pub quotes: Vec<PriceQuote>,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedPrice {
    /// Combine per-source quotes. Fails when no quote carries a price.
    pub fn from_quotes(
        coin_id: &str,
        quotes: Vec<PriceQuote>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PriceError> {
        let prices: Vec<f64> = quotes.iter().filter_map(|q| q.price).collect();
        let average = mean(&prices).ok_or(PriceError::AllSourcesFailed)?;

        let changes: Vec<f64> = quotes
            .iter()
            .filter(|q| q.price.is_some())
            .filter_map(|q| q.change_24h)
            .collect();

        Ok(Self {
            coin_id: coin_id.to_string(),
            average,
            change_24h: mean(&changes),
            quotes,
            timestamp,
        })
    }

    pub fn available_sources(&self) -> usize {
        self.quotes.iter().filter(|q| q.price.is_some()).count()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// Parse a request URL built from a configured base URL
pub(crate) fn parse_url(url: &str) -> Result<Url, SourceError> {
    Url::parse(url).map_err(|e| SourceError::Request(format!("bad url '{}': {}", url, e)))
}

/// Percent-encode a source-native id so it stays a single path segment
pub(crate) fn path_segment(native_id: &str) -> Result<String, SourceError> {
    match native_id {
        "" | "." | ".." => Err(SourceError::InvalidId(native_id.to_string())),
        id => Ok(urlencoding::encode(id).into_owned()),
    }
}

/// GET a JSON document, folding every failure into a [`SourceError`]
pub(crate) async fn get_json(source: &str, client: &Client, url: Url) -> Result<Value, SourceError> {
    debug!(source, %url, "fetching price");

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Request(e.to_string())
        }
    })?;

    match response.status() {
        StatusCode::OK => response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Body(e.to_string())),
        status => Err(SourceError::Status(status.as_u16())),
    }
}

/// Read a price-like field that may be a JSON number or a decimal string
pub(crate) fn number_field(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|n| n.is_finite())
}

/// A usable price is finite and strictly positive
pub(crate) fn validate_price(coin_id: &str, price: Option<f64>) -> Result<f64, SourceError> {
    match price {
        Some(price) if price > 0.0 => Ok(price),
        Some(price) => Err(SourceError::Body(format!(
            "invalid price {} for '{}'",
            price, coin_id
        ))),
        None => Err(SourceError::MissingPrice(coin_id.to_string())),
    }
}
