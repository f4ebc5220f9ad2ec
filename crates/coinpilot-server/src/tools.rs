use async_trait::async_trait;
use coinpilot::errors::{AgentError, AgentResult};
use coinpilot::models::content::Content;
use coinpilot::models::tool::{Tool, ToolCall};
use coinpilot::systems::System;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::prices::{AggregatedPrice, PriceAggregator};

pub const GET_CRYPTO_PRICE: &str = "get_crypto_price";
pub const GET_MULTIPLE_PRICES: &str = "get_multiple_prices";

/// Largest `get_multiple_prices` batch. Ids are aggregated one after another, and the
/// whole batch has to fit in a client's 30 s request timeout.
pub const MAX_COIN_IDS: usize = 5;

/// A tool invocation after its arguments have been checked against the tool's schema
#[derive(Debug, Clone, PartialEq)]
pub enum PriceToolCall {
    GetCryptoPrice { coin_id: String },
    GetMultiplePrices { coin_ids: Vec<String> },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CryptoPriceArgs {
    coin_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MultiplePricesArgs {
    coin_ids: Vec<String>,
}

impl PriceToolCall {
    pub fn parse(name: &str, arguments: Value) -> AgentResult<Self> {
        match name {
            GET_CRYPTO_PRICE => {
                let args: CryptoPriceArgs = parse_args(name, arguments)?;
                Ok(PriceToolCall::GetCryptoPrice {
                    coin_id: normalize_id(&args.coin_id)?,
                })
            }
            GET_MULTIPLE_PRICES => {
                let args: MultiplePricesArgs = parse_args(name, arguments)?;
                if args.coin_ids.is_empty() {
                    return Err(AgentError::InvalidParameters(
                        "coin_ids must not be empty".into(),
                    ));
                }
                if args.coin_ids.len() > MAX_COIN_IDS {
                    return Err(AgentError::InvalidParameters(format!(
                        "coin_ids accepts at most {} ids, got {}",
                        MAX_COIN_IDS,
                        args.coin_ids.len()
                    )));
                }
                let coin_ids = args
                    .coin_ids
                    .iter()
                    .map(|id| normalize_id(id))
                    .collect::<AgentResult<Vec<_>>>()?;
                Ok(PriceToolCall::GetMultiplePrices { coin_ids })
            }
            other => Err(AgentError::ToolNotFound(other.to_string())),
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> AgentResult<T> {
    // Missing arguments arrive as `null`
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| AgentError::InvalidParameters(format!("{}: {}", tool, e)))
}

fn normalize_id(raw: &str) -> AgentResult<String> {
    let id = raw.trim().to_lowercase();
    if id.is_empty() {
        return Err(AgentError::InvalidParameters(
            "coin ids must not be empty".into(),
        ));
    }
    Ok(id)
}

/// Human-readable summary of one aggregated price
pub fn summarize(price: &AggregatedPrice) -> String {
    let mut lines = vec![format!(
        "{}: ${:.2} (average of {}/{} sources)",
        price.coin_id,
        price.average,
        price.available_sources(),
        price.quotes.len()
    )];

    for quote in &price.quotes {
        match quote.price {
            Some(value) => lines.push(format!("  {}: ${:.2}", quote.source, value)),
            None => lines.push(format!("  {}: unavailable", quote.source)),
        }
    }

    lines.push(match price.change_24h {
        Some(change) => format!("  24h change: {:+.2}%", change),
        None => "  24h change: n/a".to_string(),
    });
    lines.push(format!("  Updated: {}", price.timestamp.to_rfc3339()));

    lines.join("\n")
}

/// The price tools served over JSON-RPC
pub struct PriceSystem {
    aggregator: Arc<PriceAggregator>,
    tools: Vec<Tool>,
}

impl PriceSystem {
    pub fn new(aggregator: Arc<PriceAggregator>) -> Self {
        let tools = vec![
            Tool::new(
                GET_CRYPTO_PRICE,
                "Get the current USD price of one cryptocurrency, averaged across several exchanges",
                json!({
                    "type": "object",
                    "properties": {
                        "coin_id": {
                            "type": "string",
                            "description": "CoinGecko-style coin id, for example 'bitcoin' or 'ethereum'"
                        }
                    },
                    "required": ["coin_id"],
                    "additionalProperties": false
                }),
            ),
            Tool::new(
                GET_MULTIPLE_PRICES,
                "Get current USD prices for several cryptocurrencies at once",
                json!({
                    "type": "object",
                    "properties": {
                        "coin_ids": {
                            "type": "array",
                            "items": {"type": "string"},
                            "minItems": 1,
                            "maxItems": MAX_COIN_IDS,
                            "description": "CoinGecko-style coin ids"
                        }
                    },
                    "required": ["coin_ids"],
                    "additionalProperties": false
                }),
            ),
        ];

        Self { aggregator, tools }
    }

    async fn run(&self, call: PriceToolCall) -> AgentResult<String> {
        match call {
            PriceToolCall::GetCryptoPrice { coin_id } => {
                let price = self
                    .aggregator
                    .get_price(&coin_id)
                    .await
                    .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
                Ok(summarize(&price))
            }
            PriceToolCall::GetMultiplePrices { coin_ids } => {
                let summaries: Vec<String> = self
                    .aggregator
                    .get_multiple_prices(&coin_ids)
                    .await
                    .into_iter()
                    .map(|(coin_id, result)| match result {
                        Ok(price) => summarize(&price),
                        Err(e) => format!("{}: Error - {}", coin_id, e),
                    })
                    .collect();
                Ok(summaries.join("\n"))
            }
        }
    }
}

#[async_trait]
impl System for PriceSystem {
    fn name(&self) -> &str {
        "prices"
    }

    fn description(&self) -> &str {
        "Live cryptocurrency prices aggregated from CoinGecko, CoinCap and Coinbase"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        let call = PriceToolCall::parse(&tool_call.name, tool_call.arguments)?;
        info!(tool = %tool_call.name, ?call, "running tool");
        Ok(vec![Content::text(self.run(call).await?)])
    }
}
