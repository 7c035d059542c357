use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One JSONL line: an ordered, open-ended JSON object.
///
/// Producers evolve independently, so unknown fields pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherToken {
    pub mint: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub timestamp: String,
    pub wallet_address: String,
    pub sol_balance: f64,
    pub usdc_balance: f64,
    pub wbtc_balance: f64,
    pub bnb_balance: f64,
    pub other_tokens: Vec<OtherToken>,
    pub sol_price_usd: f64,
    pub btc_price_usd: f64,
    pub bnb_price_usd: f64,
    pub sol_value_usd: f64,
    pub wbtc_value_usd: f64,
    pub bnb_value_usd: f64,
    pub total_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub last_updated: String,
    pub trades_count: usize,
    pub signals_count: usize,
    pub tasks_count: usize,
    pub daily_reports_count: usize,
    pub strategies_count: usize,
    pub wallet_total_usd: f64,
}
