use crate::error::{to_env_var, ConfigError};
use crate::prices::{
    CoinCap, CoinGecko, CoinIdMapper, Coinbase, PriceAggregator, PriceSource, StaticIdTable,
    COINBASE_URL, COINCAP_URL, COINGECKO_URL,
};
use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

/// Upstream price APIs and how long to wait for them
#[derive(Debug, Deserialize)]
pub struct PriceSettings {
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
    #[serde(default = "default_coincap_url")]
    pub coincap_url: String,
    #[serde(default = "default_coinbase_url")]
    pub coinbase_url: String,
    #[serde(default = "default_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub aggregate_timeout_secs: u64,
    /// Extra canonical id -> source id mappings, layered over the built-in tables
    #[serde(default)]
    pub coingecko_ids: HashMap<String, String>,
    #[serde(default)]
    pub coincap_ids: HashMap<String, String>,
    #[serde(default)]
    pub coinbase_ids: HashMap<String, String>,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            coingecko_url: default_coingecko_url(),
            coincap_url: default_coincap_url(),
            coinbase_url: default_coinbase_url(),
            source_timeout_secs: default_timeout_secs(),
            aggregate_timeout_secs: default_timeout_secs(),
            coingecko_ids: HashMap::new(),
            coincap_ids: HashMap::new(),
            coinbase_ids: HashMap::new(),
        }
    }
}

impl PriceSettings {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs)
    }

    /// CoinGecko, CoinCap and Coinbase, in that order
    pub fn build_aggregator(&self) -> reqwest::Result<PriceAggregator> {
        let timeout = self.source_timeout();
        let sources: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(
                CoinGecko::new(self.coingecko_url.clone(), timeout)?
                    .with_ids(id_table(StaticIdTable::identity(), &self.coingecko_ids)),
            ),
            Arc::new(
                CoinCap::new(self.coincap_url.clone(), timeout)?
                    .with_ids(id_table(StaticIdTable::coincap(), &self.coincap_ids)),
            ),
            Arc::new(
                Coinbase::new(self.coinbase_url.clone(), timeout)?
                    .with_ids(id_table(StaticIdTable::coinbase(), &self.coinbase_ids)),
            ),
        ];
        Ok(PriceAggregator::new(sources, self.aggregate_timeout()))
    }
}

fn id_table(defaults: StaticIdTable, overrides: &HashMap<String, String>) -> Box<dyn CoinIdMapper> {
    Box::new(
        overrides
            .iter()
            .fold(defaults, |table, (coin_id, native_id)| table.with(coin_id, native_id)),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub prices: PriceSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("prices.coingecko_url", default_coingecko_url())?
            .set_default("prices.coincap_url", default_coincap_url())?
            .set_default("prices.coinbase_url", default_coinbase_url())?
            .set_default("prices.source_timeout_secs", default_timeout_secs())?
            .set_default("prices.aggregate_timeout_secs", default_timeout_secs())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("COINPILOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(match err {
                    config::ConfigError::Type {
                        key: Some(ref key), ..
                    } => ConfigError::Invalid {
                        env_var: to_env_var(key),
                        reason: err.to_string(),
                    },
                    other => ConfigError::Other(other),
                });
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("prices.source_timeout_secs", self.prices.source_timeout_secs),
            ("prices.aggregate_timeout_secs", self.prices.aggregate_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    env_var: to_env_var(key),
                    reason: "timeout must be at least one second".to_string(),
                });
            }
        }

        for (key, value) in [
            ("prices.coingecko_url", &self.prices.coingecko_url),
            ("prices.coincap_url", &self.prices.coincap_url),
            ("prices.coinbase_url", &self.prices.coinbase_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    env_var: to_env_var(key),
                    reason: format!("'{}' is not an http(s) URL", value),
                });
            }
        }

        self.server.socket_addr()?;
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_coingecko_url() -> String {
    COINGECKO_URL.to_string()
}

fn default_coincap_url() -> String {
    COINCAP_URL.to_string()
}

fn default_coinbase_url() -> String {
    COINBASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("COINPILOT_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.prices.coingecko_url, "https://api.coingecko.com/api/v3");
        assert_eq!(settings.prices.coincap_url, "https://api.coincap.io/v2");
        assert_eq!(settings.prices.coinbase_url, "https://api.coinbase.com/v2");
        assert_eq!(settings.prices.source_timeout(), Duration::from_secs(5));
        assert_eq!(settings.prices.aggregate_timeout(), Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("COINPILOT_SERVER__HOST", "0.0.0.0");
        env::set_var("COINPILOT_SERVER__PORT", "9090");
        env::set_var("COINPILOT_PRICES__COINCAP_URL", "http://localhost:4000/v2");
        env::set_var("COINPILOT_PRICES__SOURCE_TIMEOUT_SECS", "2");
        env::set_var("COINPILOT_PRICES__AGGREGATE_TIMEOUT_SECS", "3");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.socket_addr().unwrap().to_string(), "0.0.0.0:9090");
        assert_eq!(settings.prices.coincap_url, "http://localhost:4000/v2");
        assert_eq!(settings.prices.coingecko_url, "https://api.coingecko.com/api/v3");
        assert_eq!(settings.prices.source_timeout_secs, 2);
        assert_eq!(settings.prices.aggregate_timeout_secs, 3);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_zero_timeout_is_rejected() {
        clean_env();
        env::set_var("COINPILOT_PRICES__AGGREGATE_TIMEOUT_SECS", "0");

        match Settings::new() {
            Err(ConfigError::Invalid { env_var, .. }) => {
                assert_eq!(env_var, "COINPILOT_PRICES__AGGREGATE_TIMEOUT_SECS")
            }
            other => panic!("Expected an invalid value error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_non_http_url_is_rejected() {
        clean_env();
        env::set_var("COINPILOT_PRICES__COINBASE_URL", "ftp://example.com");

        match Settings::new() {
            Err(ConfigError::Invalid { env_var, .. }) => {
                assert_eq!(env_var, "COINPILOT_PRICES__COINBASE_URL")
            }
            other => panic!("Expected an invalid value error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_id_overrides() {
        clean_env();
        env::set_var("COINPILOT_PRICES__COINBASE_IDS__PEPE", "PEPE2");

        let settings = Settings::new().unwrap();
        assert_eq!(
            settings.prices.coinbase_ids.get("pepe").map(String::as_str),
            Some("PEPE2")
        );
        assert!(settings.prices.coincap_ids.is_empty());

        let table = id_table(StaticIdTable::coinbase(), &settings.prices.coinbase_ids);
        assert_eq!(table.native_id("pepe"), "PEPE2");
        assert_eq!(table.native_id("bitcoin"), "BTC");

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(matches!(bad.socket_addr(), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_build_aggregator_uses_all_sources() {
        let aggregator = PriceSettings::default().build_aggregator().unwrap();
        assert_eq!(
            aggregator.source_names(),
            vec!["CoinGecko", "CoinCap", "Coinbase"]
        );
    }
}
