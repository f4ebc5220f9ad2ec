use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{
    build_client, get_json, number_field, parse_url, path_segment, validate_price, CoinIdMapper,
    PriceSource, SourceError, SourcePrice, StaticIdTable,
};

pub const COINBASE_URL: &str = "https://api.coinbase.com/v2";

/// Spot price of the `{SYMBOL}-USD` pair. Coinbase does not report a 24h change here.
pub struct Coinbase {
    client: Client,
    base_url: String,
    ids: Box<dyn CoinIdMapper>,
}

impl Coinbase {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            ids: Box::new(StaticIdTable::coinbase()),
        })
    }

    pub fn with_ids(mut self, ids: Box<dyn CoinIdMapper>) -> Self {
        self.ids = ids;
        self
    }
}

#[async_trait]
impl PriceSource for Coinbase {
    fn name(&self) -> &str {
        "Coinbase"
    }

    async fn fetch(&self, coin_id: &str) -> Result<SourcePrice, SourceError> {
        let symbol = self.ids.native_id(coin_id).to_uppercase();
        let url = parse_url(&format!(
            "{}/prices/{}-USD/spot",
            self.base_url.trim_end_matches('/'),
            path_segment(&symbol)?
        ))?;

        let body = get_json(self.name(), &self.client, url).await?;
        let amount = body.get("data").and_then(|d| d.get("amount"));
        let price = validate_price(coin_id, number_field(amount))?;

        debug!(source = self.name(), coin_id, price, "fetched price");
        Ok(SourcePrice {
            price,
            change_24h: None,
        })
    }
}
