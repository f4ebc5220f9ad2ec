use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use super::{AggregatedPrice, PriceError, PriceQuote, PriceSource, SourceError};

/// Queries every configured source concurrently and averages the answers that arrive
/// before a shared deadline. A single failing source never fails the whole request.
pub struct PriceAggregator {
    sources: Vec<Arc<dyn PriceSource>>,
    timeout: Duration,
}

impl PriceAggregator {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn get_price(&self, coin_id: &str) -> Result<AggregatedPrice, PriceError> {
        let deadline = Instant::now() + self.timeout;

        let fetches = self.sources.iter().map(|source| {
            let task = {
                let source = Arc::clone(source);
                let coin_id = coin_id.to_string();
                tokio::spawn(async move { source.fetch(&coin_id).await })
            };

            async move {
                let mut task = task;
                let outcome = match timeout_at(deadline, &mut task).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => Err(SourceError::Request(format!("worker failed: {}", e))),
                    Err(_) => {
                        task.abort();
                        Err(SourceError::Timeout)
                    }
                };

                match outcome {
                    Ok(price) => PriceQuote {
                        source: source.name().to_string(),
                        price: Some(price.price),
                        change_24h: price.change_24h,
                    },
                    Err(error) => {
                        warn!(source = source.name(), coin_id, %error, "price source failed");
                        PriceQuote {
                            source: source.name().to_string(),
                            price: None,
                            change_24h: None,
                        }
                    }
                }
            }
        });

        let quotes = join_all(fetches).await;
        let aggregated = AggregatedPrice::from_quotes(coin_id, quotes, Utc::now())?;

        info!(
            coin_id,
            average = aggregated.average,
            sources = aggregated.available_sources(),
            "aggregated price"
        );
        Ok(aggregated)
    }

    /// Aggregate each coin in order. Failures are reported per coin.
    pub async fn get_multiple_prices(
        &self,
        coin_ids: &[String],
    ) -> Vec<(String, Result<AggregatedPrice, PriceError>)> {
        let mut results = Vec::with_capacity(coin_ids.len());
        for coin_id in coin_ids {
            results.push((coin_id.clone(), self.get_price(coin_id).await));
        }
        results
    }
}
