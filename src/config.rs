use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{path::PathBuf, str::FromStr};

use tracing::warn;

use crate::time::Clock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // RPC
    pub solana_rpc_url: String,
    pub http_timeout_secs: u64,

    // Wallet
    pub wallet_address: String,
    pub token_program_id: String,
    pub usdc_mint: String,
    pub wbtc_mint: String,
    pub bnb_mint: String,

    // Prices (CoinGecko ids)
    pub price_api_url: String,
    pub sol_price_id: String,
    pub btc_price_id: String,
    pub bnb_price_id: String,

    // Runtime
    /// IANA zone for rendered timestamps; process local time when unset.
    pub tz: Option<String>,

    // Inputs
    pub bot_data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub memory_dir: PathBuf,

    // Strategies
    pub strategy_source_path: PathBuf,
    pub strategy_config_name: String,
    pub grid_process_name: String,
    pub grid_marker_path: PathBuf,
    pub grid_pair: String,
    pub grid_symbol: String,
    pub recent_trade_files: usize,

    // Outputs
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solana_rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            http_timeout_secs: 10,
            wallet_address: "CdJSUeHX49eFK8hixbfDKNRLTakYcy59MbVEh8pDnn9U".to_string(),
            token_program_id: "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".to_string(),
            usdc_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            wbtc_mint: "3NZ9JMVBmGAqocybic2c7LQCJScmgsAZ6vQqTDzcqmJh".to_string(),
            bnb_mint: "9gP2kCy3wA1ctvYWQk75guqXuHfrEomqydHLtcTCqiLa".to_string(),
            price_api_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            sol_price_id: "solana".to_string(),
            btc_price_id: "bitcoin".to_string(),
            bnb_price_id: "binancecoin".to_string(),
            tz: None,
            bot_data_dir: PathBuf::from("../bot/data"),
            tasks_path: PathBuf::from("../tasks.json"),
            memory_dir: PathBuf::from("../memory"),
            strategy_source_path: PathBuf::from("../bot/config.py"),
            strategy_config_name: "STRATEGY_CONFIG".to_string(),
            grid_process_name: "grid_bot.py".to_string(),
            grid_marker_path: PathBuf::from("../bot/grid_bot.pid"),
            grid_pair: "SOL/USDC".to_string(),
            grid_symbol: "SOL".to_string(),
            recent_trade_files: 7,
            output_dir: PathBuf::from("./data"),
        }
    }
}

/// Non-blank value of `key` from `lookup`.
fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|s| !s.trim().is_empty())
}

/// Applies `key` when `check` accepts it; otherwise the default stays and the
/// rejection is logged.
fn apply<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    check: impl FnOnce(&str) -> Result<T>,
    slot: &mut T,
) {
    let Some(raw) = non_blank(lookup, key) else { return };
    match check(raw.trim()) {
        Ok(v) => *slot = v,
        Err(err) => warn!(key, value = %raw, error = %format!("{err:#}"), "config.override_ignored"),
    }
}

fn pubkey(raw: &str) -> Result<String> {
    Pubkey::from_str(raw).with_context(|| format!("invalid address: {raw}"))?;
    Ok(raw.to_string())
}

impl Config {
    /// Compiled-in defaults with optional `DASHBOARD_*` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`] over an arbitrary variable source. A malformed
    /// override keeps its compiled-in default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        let text = |raw: &str| -> Result<String> { Ok(raw.to_string()) };
        let path = |raw: &str| -> Result<PathBuf> { Ok(PathBuf::from(raw)) };

        apply(&lookup, "DASHBOARD_RPC_URL", text, &mut cfg.solana_rpc_url);
        apply(
            &lookup,
            "DASHBOARD_HTTP_TIMEOUT_SECS",
            |raw| match raw.parse::<u64>()? {
                0 => Err(anyhow!("http timeout must be positive")),
                secs => Ok(secs),
            },
            &mut cfg.http_timeout_secs,
        );
        apply(&lookup, "DASHBOARD_WALLET_ADDRESS", pubkey, &mut cfg.wallet_address);
        apply(&lookup, "DASHBOARD_PRICE_API_URL", text, &mut cfg.price_api_url);
        apply(
            &lookup,
            "DASHBOARD_TZ",
            |raw| Clock::from_tz(Some(raw)).map(|_| Some(raw.to_string())),
            &mut cfg.tz,
        );

        apply(&lookup, "DASHBOARD_BOT_DATA_DIR", path, &mut cfg.bot_data_dir);
        apply(&lookup, "DASHBOARD_TASKS_PATH", path, &mut cfg.tasks_path);
        apply(&lookup, "DASHBOARD_MEMORY_DIR", path, &mut cfg.memory_dir);
        apply(&lookup, "DASHBOARD_STRATEGY_SOURCE", path, &mut cfg.strategy_source_path);
        apply(&lookup, "DASHBOARD_OUTPUT_DIR", path, &mut cfg.output_dir);

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http timeout must be positive"));
        }
        for (label, addr) in [
            ("wallet_address", &self.wallet_address),
            ("token_program_id", &self.token_program_id),
            ("usdc_mint", &self.usdc_mint),
            ("wbtc_mint", &self.wbtc_mint),
            ("bnb_mint", &self.bnb_mint),
        ] {
            Pubkey::from_str(addr).with_context(|| format!("invalid {label}: {addr}"))?;
        }
        self.clock()?;
        Ok(())
    }

    pub fn clock(&self) -> Result<Clock> {
        Clock::from_tz(self.tz.as_deref())
    }

    pub fn trades_dir(&self) -> PathBuf {
        self.bot_data_dir.join("trades")
    }

    pub fn signals_dir(&self) -> PathBuf {
        self.bot_data_dir.join("signal_logs")
    }

    pub fn grid_trades_dir(&self) -> PathBuf {
        self.bot_data_dir.join("grid_trades")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_malformed_mint() {
        let cfg = Config {
            usdc_mint: "not-a-mint".into(),
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("usdc_mint"));
    }

    #[test]
    fn rejects_unknown_tz() {
        let cfg = Config {
            tz: Some("Mars/Olympus_Mons".into()),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn valid_overrides_apply() {
        let cfg = Config::from_lookup(vars(&[
            ("DASHBOARD_TZ", "Asia/Tokyo"),
            ("DASHBOARD_HTTP_TIMEOUT_SECS", "30"),
            ("DASHBOARD_OUTPUT_DIR", "/tmp/out"),
            ("DASHBOARD_WALLET_ADDRESS", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        ]))
        .unwrap();
        assert_eq!(cfg.tz.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.wallet_address, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
    }

    #[test]
    fn malformed_overrides_keep_defaults() {
        let defaults = Config::default();
        let cfg = Config::from_lookup(vars(&[
            ("DASHBOARD_WALLET_ADDRESS", "not-a-wallet"),
            ("DASHBOARD_TZ", "Mars/Olympus_Mons"),
            ("DASHBOARD_HTTP_TIMEOUT_SECS", "0"),
            ("DASHBOARD_RPC_URL", "   "),
            ("DASHBOARD_MEMORY_DIR", "/srv/memory"),
        ]))
        .unwrap();
        assert_eq!(cfg.wallet_address, defaults.wallet_address);
        assert_eq!(cfg.tz, None);
        assert_eq!(cfg.http_timeout_secs, defaults.http_timeout_secs);
        assert_eq!(cfg.solana_rpc_url, defaults.solana_rpc_url);
        assert_eq!(cfg.memory_dir, PathBuf::from("/srv/memory"));
    }
}
