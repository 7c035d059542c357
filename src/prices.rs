use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::HttpTransport;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Prices {
    pub sol: f64,
    pub btc: f64,
    pub bnb: f64,
}

/// CoinGecko `simple/price` client.
pub struct PriceClient {
    url: String,
    sol_id: String,
    btc_id: String,
    bnb_id: String,
    transport: Arc<dyn HttpTransport>,
}

impl PriceClient {
    pub fn new(cfg: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            url: cfg.price_api_url.clone(),
            sol_id: cfg.sol_price_id.clone(),
            btc_id: cfg.btc_price_id.clone(),
            bnb_id: cfg.bnb_price_id.clone(),
            transport,
        }
    }

    /// USD quotes. Each price falls back to 0 on its own.
    pub async fn fetch(&self) -> Prices {
        let ids = format!("{},{},{}", self.sol_id, self.btc_id, self.bnb_id);
        let query = [("ids", ids.as_str()), ("vs_currencies", "usd")];
        let data = match self.transport.get_json(&self.url, &query).await {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "prices.fetch_failed");
                return Prices::default();
            }
        };

        let prices = Prices {
            sol: usd_quote(&data, &self.sol_id),
            btc: usd_quote(&data, &self.btc_id),
            bnb: usd_quote(&data, &self.bnb_id),
        };
        info!(sol = prices.sol, btc = prices.btc, bnb = prices.bnb, "prices.usd");
        prices
    }
}

fn usd_quote(data: &Value, id: &str) -> f64 {
    match data.get(id).and_then(|q| q.get("usd")).and_then(Value::as_f64) {
        Some(price) => price,
        None => {
            warn!(id, "prices.missing_quote");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubTransport;
    use serde_json::json;

    #[tokio::test]
    async fn missing_ids_fall_back_independently() {
        let cfg = Config::default();
        let transport = StubTransport::default().with_get(
            &cfg.price_api_url,
            json!({"solana": {"usd": 142.3}, "bitcoin": {"eur": 1.0}}),
        );
        let prices = PriceClient::new(&cfg, Arc::new(transport)).fetch().await;
        assert_eq!(prices, Prices { sol: 142.3, btc: 0.0, bnb: 0.0 });
    }

    #[tokio::test]
    async fn request_failure_is_all_zero() {
        let cfg = Config::default();
        let prices = PriceClient::new(&cfg, Arc::new(StubTransport::default()))
            .fetch()
            .await;
        assert_eq!(prices, Prices::default());
    }
}
