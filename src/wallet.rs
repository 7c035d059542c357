use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::OtherToken;
use crate::http::HttpTransport;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBalances {
    pub usdc: f64,
    pub wbtc: f64,
    pub bnb: f64,
    pub other: Vec<OtherToken>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletBalances {
    pub sol: f64,
    pub tokens: TokenBalances,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct TokenAccount {
    account: AccountBody,
}

#[derive(Debug, Deserialize)]
struct AccountBody {
    data: AccountData,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    parsed: ParsedAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedAccount {
    info: TokenInfo,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    mint: String,
    #[serde(rename = "tokenAmount")]
    token_amount: TokenAmount,
}

#[derive(Debug, Deserialize)]
struct TokenAmount {
    #[serde(rename = "uiAmount")]
    ui_amount: Option<f64>,
}

/// Reads native and SPL balances for one owner over JSON-RPC.
///
/// Every failure degrades to zero/empty; the run never aborts here.
pub struct WalletFetcher {
    rpc_url: String,
    owner: String,
    token_program_id: String,
    usdc_mint: String,
    wbtc_mint: String,
    bnb_mint: String,
    transport: Arc<dyn HttpTransport>,
}

impl WalletFetcher {
    pub fn new(cfg: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            rpc_url: cfg.solana_rpc_url.clone(),
            owner: cfg.wallet_address.clone(),
            token_program_id: cfg.token_program_id.clone(),
            usdc_mint: cfg.usdc_mint.clone(),
            wbtc_mint: cfg.wbtc_mint.clone(),
            bnb_mint: cfg.bnb_mint.clone(),
            transport,
        }
    }

    pub async fn fetch(&self) -> WalletBalances {
        let sol = self.native_balance().await;
        let tokens = self.token_balances().await;
        info!(
            sol,
            usdc = tokens.usdc,
            wbtc = tokens.wbtc,
            bnb = tokens.bnb,
            other = tokens.other.len(),
            "wallet.balances"
        );
        WalletBalances { sol, tokens }
    }

    pub async fn native_balance(&self) -> f64 {
        match self.try_native_balance().await {
            Ok(Some(sol)) => sol,
            // A missing result reads as an empty wallet, not a distinct failure.
            Ok(None) => 0.0,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "wallet.balance_failed");
                0.0
            }
        }
    }

    async fn try_native_balance(&self) -> Result<Option<f64>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getBalance",
            "params": [self.owner],
        });
        let raw = self.transport.post_json(&self.rpc_url, &body).await?;
        let envelope: RpcEnvelope<WithValue<u64>> =
            serde_json::from_value(raw).context("decoding getBalance response")?;
        match envelope.result {
            Some(r) => Ok(Some(r.value as f64 / LAMPORTS_PER_SOL as f64)),
            None => {
                warn!(error = ?envelope.error, "wallet.balance_missing_result");
                Ok(None)
            }
        }
    }

    pub async fn token_balances(&self) -> TokenBalances {
        match self.try_token_balances().await {
            Ok(balances) => balances,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "wallet.tokens_failed");
                TokenBalances::default()
            }
        }
    }

    async fn try_token_balances(&self) -> Result<TokenBalances> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "getTokenAccountsByOwner",
            "params": [
                self.owner,
                {"programId": self.token_program_id},
                {"encoding": "jsonParsed"},
            ],
        });
        let raw = self.transport.post_json(&self.rpc_url, &body).await?;
        let envelope: RpcEnvelope<WithValue<Vec<TokenAccount>>> =
            serde_json::from_value(raw).context("decoding getTokenAccountsByOwner response")?;
        let Some(result) = envelope.result else {
            warn!(error = ?envelope.error, "wallet.tokens_missing_result");
            return Ok(TokenBalances::default());
        };
        Ok(self.bucket(result.value))
    }

    fn bucket(&self, accounts: Vec<TokenAccount>) -> TokenBalances {
        let mut out = TokenBalances::default();
        for acc in accounts {
            let info = acc.account.data.parsed.info;
            let amount = info.token_amount.ui_amount.unwrap_or(0.0);
            if amount == 0.0 {
                continue;
            }
            if info.mint == self.usdc_mint {
                out.usdc = amount;
            } else if info.mint == self.wbtc_mint {
                out.wbtc = amount;
            } else if info.mint == self.bnb_mint {
                out.bnb = amount;
            } else {
                out.other.push(OtherToken { mint: info.mint, amount });
            }
        }
        out
    }
}
