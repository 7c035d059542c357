use std::{fs, path::Path, process::Command};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::Record;
use crate::tasks::round1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAction {
    Buy,
    TakeProfit,
    StopLoss,
}

impl GridAction {
    pub fn classify(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(GridAction::Buy),
            "take_profit" | "sell_tp" | "tp" => Some(GridAction::TakeProfit),
            "stop_loss" | "sell_sl" | "sl" => Some(GridAction::StopLoss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    pub total_trades: usize,
    pub buys: usize,
    pub take_profits: usize,
    pub stop_losses: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_price: Option<f64>,
    pub amount: Option<f64>,
    pub opened_at: Value,
}

/// take-profit exits / all exits × 100, one decimal; 0 without exits.
pub fn win_rate(take_profits: usize, stop_losses: usize) -> f64 {
    let exits = take_profits + stop_losses;
    if exits == 0 {
        return 0.0;
    }
    round1(take_profits as f64 / exits as f64 * 100.0)
}

/// Stats over grid log records plus the open position, if buys outnumber exits.
pub fn summarize(records: &[Record]) -> (GridStats, Option<OpenPosition>) {
    let mut stats = GridStats::default();
    let mut last_buy: Option<&Record> = None;
    for record in records {
        let Some(action) = record.get_str("action").and_then(GridAction::classify) else {
            continue;
        };
        stats.total_trades += 1;
        match action {
            GridAction::Buy => {
                stats.buys += 1;
                last_buy = Some(record);
            }
            GridAction::TakeProfit => stats.take_profits += 1,
            GridAction::StopLoss => stats.stop_losses += 1,
        }
    }
    stats.win_rate = win_rate(stats.take_profits, stats.stop_losses);

    let position = if stats.buys > stats.take_profits + stats.stop_losses {
        last_buy.map(|buy| OpenPosition {
            entry_price: buy.get_f64("price"),
            amount: buy.get_f64("amount"),
            opened_at: buy.get("timestamp").cloned().unwrap_or(Value::Null),
        })
    } else {
        None
    };
    (stats, position)
}

/// Whether the grid bot is alive: a marker file naming a live PID, or a
/// `pgrep -f` hit on the process name.
pub fn is_running(process_name: &str, marker: &Path) -> Result<bool> {
    if let Some(pid) = marker_pid(marker) {
        if Path::new("/proc").join(pid.to_string()).exists() {
            debug!(pid, "grid.marker_alive");
            return Ok(true);
        }
    }
    let status = Command::new("pgrep")
        .arg("-f")
        .arg(process_name)
        .output()
        .context("running pgrep")?
        .status;
    Ok(status.success())
}

fn marker_pid(marker: &Path) -> Option<u32> {
    fs::read_to_string(marker).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    #[test]
    fn win_rate_is_guarded() {
        assert_eq!(win_rate(0, 0), 0.0);
        assert_eq!(win_rate(3, 1), 75.0);
        assert_eq!(win_rate(2, 1), 66.7);
    }

    #[test]
    fn classifies_actions_case_insensitively() {
        assert_eq!(GridAction::classify("BUY"), Some(GridAction::Buy));
        assert_eq!(GridAction::classify("Sell_TP"), Some(GridAction::TakeProfit));
        assert_eq!(GridAction::classify("stop_loss"), Some(GridAction::StopLoss));
        assert_eq!(GridAction::classify("rebalance"), None);
    }

    #[test]
    fn open_position_uses_latest_buy() {
        let recs = records(vec![
            json!({"action": "buy", "price": 140.0, "amount": 0.1, "timestamp": "2024-05-01T10:00:00"}),
            json!({"action": "take_profit", "price": 142.0}),
            json!({"action": "buy", "price": 139.5, "amount": 0.2, "timestamp": "2024-05-01T12:00:00"}),
            json!({"action": "heartbeat"}),
        ]);

        let (stats, position) = summarize(&recs);

        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.buys, 2);
        assert_eq!(stats.take_profits, 1);
        assert_eq!(stats.win_rate, 100.0);
        assert_eq!(
            position,
            Some(OpenPosition {
                entry_price: Some(139.5),
                amount: Some(0.2),
                opened_at: json!("2024-05-01T12:00:00"),
            })
        );
    }

    #[test]
    fn no_position_when_exits_balance_buys() {
        let recs = records(vec![
            json!({"action": "buy"}),
            json!({"action": "stop_loss"}),
        ]);
        let (stats, position) = summarize(&recs);
        assert_eq!(stats.win_rate, 0.0);
        assert!(position.is_none());
    }

    #[test]
    fn live_marker_pid_counts_as_running() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("grid_bot.pid");
        fs::write(&marker, std::process::id().to_string()).unwrap();
        assert!(is_running("no-such-process-name-xyz", &marker).unwrap());
    }
}
