use std::collections::HashMap;

/// Translates a canonical coin id (a CoinGecko-style slug such as `bitcoin`) into the
/// identifier one upstream source expects
pub trait CoinIdMapper: Send + Sync {
    fn native_id(&self, coin_id: &str) -> String;
}

/// A fixed lookup table. Ids missing from the table pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct StaticIdTable {
    table: HashMap<String, String>,
}

impl StaticIdTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            table: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Canonical ids are used as-is
    pub fn identity() -> Self {
        Self::default()
    }

    /// CoinCap asset ids that differ from the canonical slug
    pub fn coincap() -> Self {
        Self::new([
            ("binancecoin", "binance-coin"),
            ("ripple", "xrp"),
            ("avalanche-2", "avalanche"),
            ("matic-network", "polygon"),
        ])
    }

    /// Coinbase trades by ticker symbol
    pub fn coinbase() -> Self {
        Self::new([
            ("bitcoin", "BTC"),
            ("ethereum", "ETH"),
            ("solana", "SOL"),
            ("dogecoin", "DOGE"),
            ("cardano", "ADA"),
            ("ripple", "XRP"),
            ("litecoin", "LTC"),
            ("polkadot", "DOT"),
            ("avalanche-2", "AVAX"),
            ("chainlink", "LINK"),
        ])
    }

    /// Add or replace one mapping
    pub fn with(mut self, coin_id: &str, native_id: &str) -> Self {
        self.table.insert(coin_id.to_string(), native_id.to_string());
        self
    }
}

impl CoinIdMapper for StaticIdTable {
    fn native_id(&self, coin_id: &str) -> String {
        self.table
            .get(coin_id)
            .cloned()
            .unwrap_or_else(|| coin_id.to_string())
    }
}
