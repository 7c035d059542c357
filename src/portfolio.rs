use crate::domain::WalletSnapshot;
use crate::prices::Prices;
use crate::wallet::WalletBalances;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Valuation {
    pub sol_value_usd: f64,
    pub wbtc_value_usd: f64,
    pub bnb_value_usd: f64,
    pub total_usd: f64,
}

impl Valuation {
    /// USDC counts at face value. Stored values are not rounded.
    pub fn compute(balances: &WalletBalances, prices: &Prices) -> Self {
        let sol_value_usd = balances.sol * prices.sol;
        let wbtc_value_usd = balances.tokens.wbtc * prices.btc;
        let bnb_value_usd = balances.tokens.bnb * prices.bnb;
        let total_usd = sol_value_usd + balances.tokens.usdc + wbtc_value_usd + bnb_value_usd;
        Self {
            sol_value_usd,
            wbtc_value_usd,
            bnb_value_usd,
            total_usd,
        }
    }
}

pub fn snapshot(
    timestamp: String,
    wallet_address: &str,
    balances: WalletBalances,
    prices: Prices,
) -> WalletSnapshot {
    let v = Valuation::compute(&balances, &prices);
    WalletSnapshot {
        timestamp,
        wallet_address: wallet_address.to_string(),
        sol_balance: balances.sol,
        usdc_balance: balances.tokens.usdc,
        wbtc_balance: balances.tokens.wbtc,
        bnb_balance: balances.tokens.bnb,
        other_tokens: balances.tokens.other,
        sol_price_usd: prices.sol,
        btc_price_usd: prices.btc,
        bnb_price_usd: prices.bnb,
        sol_value_usd: v.sol_value_usd,
        wbtc_value_usd: v.wbtc_value_usd,
        bnb_value_usd: v.bnb_value_usd,
        total_usd: v.total_usd,
    }
}
