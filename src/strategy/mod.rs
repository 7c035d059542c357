pub mod grid;
pub mod literal;

use std::fs;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::Record;
use crate::jsonl::{self, FilePattern};

use self::grid::{GridStats, OpenPosition};

const CCI_PARAMS: &[&str] = &[
    "cci_period",
    "ema_period",
    "cci_buy_threshold",
    "cci_sell_threshold",
    "take_profit_pct",
    "stop_loss_pct",
    "position_size_usdc",
    "timeframe",
];

const RSI_PARAMS: &[&str] = &[
    "rsi_period",
    "rsi_oversold",
    "rsi_overbought",
    "take_profit_pct",
    "stop_loss_pct",
    "position_size_usdc",
    "timeframe",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    Cci,
    Rsi,
    Grid,
    Other(String),
}

impl StrategyKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "cci" => StrategyKind::Cci,
            "rsi" => StrategyKind::Rsi,
            "grid" => StrategyKind::Grid,
            _ => StrategyKind::Other(tag.to_string()),
        }
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            StrategyKind::Cci => CCI_PARAMS,
            StrategyKind::Rsi => RSI_PARAMS,
            StrategyKind::Grid | StrategyKind::Other(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<usize>,
    #[serde(flatten)]
    pub grid: Option<GridStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub pair: String,
    pub strategy: String,
    pub enabled: bool,
    pub symbol: String,
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StrategyStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<OpenPosition>,
}

impl StrategyDescriptor {
    pub fn kind(&self) -> StrategyKind {
        StrategyKind::from_tag(&self.strategy)
    }

    /// Normalizes one `pair -> config` literal entry.
    pub fn from_entry(pair: &str, config: &Value) -> Self {
        let tag = config.get("strategy").and_then(Value::as_str).unwrap_or_default();
        let kind = StrategyKind::from_tag(tag);
        let params = kind
            .param_names()
            .iter()
            .filter_map(|name| config.get(*name).map(|v| (name.to_string(), v.clone())))
            .collect();
        Self {
            pair: pair.to_string(),
            strategy: tag.to_string(),
            enabled: config.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            symbol: config
                .get("symbol")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            params,
            stats: None,
            position: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySnapshot {
    pub updated_at: String,
    pub grid_bot_running: bool,
    pub strategies: Vec<StrategyDescriptor>,
}

/// Descriptors from the configured source file's literal block.
pub fn load_configured(cfg: &Config) -> Result<Vec<StrategyDescriptor>> {
    let path = &cfg.strategy_source_path;
    let source =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let block = literal::extract_block(&source, &cfg.strategy_config_name)?;
    let value = literal::parse(block)?;
    let entries = value
        .as_object()
        .ok_or_else(|| anyhow!("{} is not a mapping", cfg.strategy_config_name))?;
    Ok(entries
        .iter()
        .map(|(pair, config)| StrategyDescriptor::from_entry(pair, config))
        .collect())
}

/// Synthesized descriptor for the running grid bot.
pub fn grid_descriptor(cfg: &Config) -> StrategyDescriptor {
    let records = jsonl::read_pattern(&FilePattern::new(cfg.grid_trades_dir(), "grid_", ".jsonl"));
    let (stats, position) = grid::summarize(&records);
    StrategyDescriptor {
        pair: cfg.grid_pair.clone(),
        strategy: "grid".to_string(),
        enabled: true,
        symbol: cfg.grid_symbol.clone(),
        params: Map::new(),
        stats: Some(StrategyStats { trade_count: None, grid: Some(stats) }),
        position,
    }
}

/// Counts trades touching `symbol` in either token field, case-insensitively.
pub fn count_symbol_trades(records: &[Record], symbol: &str) -> usize {
    let needle = symbol.to_lowercase();
    records
        .iter()
        .filter(|r| {
            ["input_token", "output_token"].iter().any(|field| {
                r.get_str(field)
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
            })
        })
        .count()
}

/// Attaches `trade_count` to every CCI descriptor from the most recent trade files.
pub fn attach_trade_counts(cfg: &Config, strategies: &mut [StrategyDescriptor]) -> Result<()> {
    let pattern = FilePattern::new(cfg.trades_dir(), "trades_", ".jsonl");
    let files = pattern.list()?;
    let recent = &files[files.len().saturating_sub(cfg.recent_trade_files)..];
    let records = jsonl::read_files(recent);
    for desc in strategies.iter_mut() {
        if desc.kind() != StrategyKind::Cci || desc.symbol.is_empty() {
            continue;
        }
        let count = count_symbol_trades(&records, &desc.symbol);
        desc.stats.get_or_insert_with(StrategyStats::default).trade_count = Some(count);
    }
    Ok(())
}

/// Runs every extraction stage; a failing stage only drops its own contribution.
pub fn extract(cfg: &Config, updated_at: String) -> StrategySnapshot {
    let mut strategies = match load_configured(cfg) {
        Ok(list) => list,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "strategies.config_failed");
            Vec::new()
        }
    };

    let grid_bot_running = match grid::is_running(&cfg.grid_process_name, &cfg.grid_marker_path) {
        Ok(running) => running,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "strategies.process_check_failed");
            false
        }
    };
    if grid_bot_running {
        strategies.push(grid_descriptor(cfg));
    }

    if let Err(err) = attach_trade_counts(cfg, &mut strategies) {
        warn!(error = %format!("{err:#}"), "strategies.trade_counts_failed");
    }

    info!(count = strategies.len(), grid_bot_running, "strategies.extracted");
    StrategySnapshot {
        updated_at,
        grid_bot_running,
        strategies,
    }
}
