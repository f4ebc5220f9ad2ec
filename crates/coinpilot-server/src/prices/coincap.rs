use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{
    build_client, get_json, number_field, parse_url, path_segment, validate_price, CoinIdMapper,
    PriceSource, SourceError, SourcePrice, StaticIdTable,
};

pub const COINCAP_URL: &str = "https://api.coincap.io/v2";

/// `GET /assets/{id}`, prices come back as decimal strings
pub struct CoinCap {
    client: Client,
    base_url: String,
    ids: Box<dyn CoinIdMapper>,
}

impl CoinCap {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            ids: Box::new(StaticIdTable::coincap()),
        })
    }

    pub fn with_ids(mut self, ids: Box<dyn CoinIdMapper>) -> Self {
        self.ids = ids;
        self
    }
}

#[async_trait]
impl PriceSource for CoinCap {
    fn name(&self) -> &str {
        "CoinCap"
    }

    async fn fetch(&self, coin_id: &str) -> Result<SourcePrice, SourceError> {
        let url = parse_url(&format!(
            "{}/assets/{}",
            self.base_url.trim_end_matches('/'),
            path_segment(&self.ids.native_id(coin_id))?
        ))?;

        let body = get_json(self.name(), &self.client, url).await?;
        let data = body.get("data");
        let price = validate_price(coin_id, number_field(data.and_then(|d| d.get("priceUsd"))))?;
        let change_24h = number_field(data.and_then(|d| d.get("changePercent24Hr")));

        debug!(source = self.name(), coin_id, price, "fetched price");
        Ok(SourcePrice { price, change_24h })
    }
}
