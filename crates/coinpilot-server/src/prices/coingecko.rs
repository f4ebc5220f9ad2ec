use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{
    build_client, get_json, number_field, parse_url, validate_price, CoinIdMapper, PriceSource,
    SourceError, SourcePrice, StaticIdTable,
};

pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

/// `GET /simple/price?ids={id}&vs_currencies=usd&include_24hr_change=true`
pub struct CoinGecko {
    client: Client,
    base_url: String,
    ids: Box<dyn CoinIdMapper>,
}

impl CoinGecko {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            ids: Box::new(StaticIdTable::identity()),
        })
    }

    pub fn with_ids(mut self, ids: Box<dyn CoinIdMapper>) -> Self {
        self.ids = ids;
        self
    }
}

#[async_trait]
impl PriceSource for CoinGecko {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    async fn fetch(&self, coin_id: &str) -> Result<SourcePrice, SourceError> {
        let native = self.ids.native_id(coin_id);
        let mut url = parse_url(&format!(
            "{}/simple/price",
            self.base_url.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("ids", &native)
            .append_pair("vs_currencies", "usd")
            .append_pair("include_24hr_change", "true");

        let body = get_json(self.name(), &self.client, url).await?;
        let entry = body.get(&native);
        let price = validate_price(coin_id, number_field(entry.and_then(|e| e.get("usd"))))?;
        let change_24h = number_field(entry.and_then(|e| e.get("usd_24h_change")));

        debug!(source = self.name(), coin_id, price, "fetched price");
        Ok(SourcePrice { price, change_24h })
    }
}
