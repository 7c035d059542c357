use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::domain::{DailyReport, Record, Summary, WalletSnapshot};
use crate::http::HttpTransport;
use crate::jsonl::{self, FilePattern};
use crate::output::SnapshotWriter;
use crate::portfolio;
use crate::prices::PriceClient;
use crate::reports;
use crate::strategy::{self, StrategySnapshot};
use crate::tasks;
use crate::time::Clock;
use crate::wallet::WalletFetcher;

/// One update pass. Stages run in order and each writes its own file, so an
/// error leaves earlier outputs in place.
pub struct Pipeline {
    cfg: Config,
    clock: Clock,
    writer: SnapshotWriter,
    transport: Arc<dyn HttpTransport>,
}

impl Pipeline {
    pub fn new(cfg: Config, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let clock = cfg.clock()?;
        let writer = SnapshotWriter::new(&cfg.output_dir);
        Ok(Self { cfg, clock, writer, transport })
    }

    pub async fn run(&self) -> Result<Summary> {
        info!(started_at = %self.clock.now_iso(), output = %self.cfg.output_dir.display(), "pipeline.start");
        self.writer.ensure_dir()?;

        let trades = self.update_trades()?;
        let signals = self.update_signals()?;
        let wallet = self.update_wallet().await?;
        let tasks_count = self.update_tasks()?;
        let daily_reports = self.update_daily_reports()?;
        let strategies = self.update_strategies()?;

        let summary = Summary {
            last_updated: self.clock.now_iso(),
            trades_count: trades.len(),
            signals_count: signals.len(),
            tasks_count,
            daily_reports_count: daily_reports.len(),
            strategies_count: strategies.strategies.len(),
            wallet_total_usd: wallet.total_usd,
        };
        let path = self.writer.save("summary.json", &summary)?;
        info!(path = %path.display(), "summary.saved");

        info!(
            "update completed: {} trades, {} signals, {} tasks, {} daily reports, {} strategies",
            summary.trades_count,
            summary.signals_count,
            summary.tasks_count,
            summary.daily_reports_count,
            summary.strategies_count
        );
        info!("portfolio: ${:.2}", summary.wallet_total_usd);
        Ok(summary)
    }

    fn update_records(&self, pattern: FilePattern, ts_field: &str, file: &str) -> Result<Vec<Record>> {
        let mut records = jsonl::read_pattern(&pattern);
        jsonl::normalize_timestamps(&mut records, ts_field, &self.clock);
        let path = self.writer.save(file, &records)?;
        info!(count = records.len(), path = %path.display(), "records.saved");
        Ok(records)
    }

    pub fn update_trades(&self) -> Result<Vec<Record>> {
        let pattern = FilePattern::new(self.cfg.trades_dir(), "trades_", ".jsonl");
        self.update_records(pattern, "timestamp", "trades.json")
    }

    pub fn update_signals(&self) -> Result<Vec<Record>> {
        let pattern = FilePattern::new(self.cfg.signals_dir(), "signals_", ".jsonl");
        self.update_records(pattern, "checked_at", "signals.json")
    }

    pub async fn update_wallet(&self) -> Result<WalletSnapshot> {
        let balances = WalletFetcher::new(&self.cfg, self.transport.clone()).fetch().await;
        let prices = PriceClient::new(&self.cfg, self.transport.clone()).fetch().await;
        let snapshot = portfolio::snapshot(
            self.clock.now_iso(),
            &self.cfg.wallet_address,
            balances,
            prices,
        );

        let path = self.writer.save("wallet.json", &snapshot)?;
        info!(path = %path.display(), "wallet.saved");
        info!("SOL: {:.4} (${:.2})", snapshot.sol_balance, snapshot.sol_value_usd);
        info!("USDC: ${:.2}", snapshot.usdc_balance);
        info!("Total: ${:.2}", snapshot.total_usd);
        Ok(snapshot)
    }

    /// Returns the overall task count.
    pub fn update_tasks(&self) -> Result<usize> {
        let (doc, stats) = tasks::aggregate(&self.cfg.tasks_path)?;
        let path = self.writer.save("tasks.json", &doc)?;
        info!(count = stats.total_tasks, path = %path.display(), "tasks.saved");
        Ok(stats.total_tasks)
    }

    pub fn update_daily_reports(&self) -> Result<Vec<DailyReport>> {
        let reports = reports::collect(&self.cfg.memory_dir);
        let path = self.writer.save("daily_reports.json", &reports)?;
        info!(count = reports.len(), path = %path.display(), "daily_reports.saved");
        Ok(reports)
    }

    pub fn update_strategies(&self) -> Result<StrategySnapshot> {
        let snapshot = strategy::extract(&self.cfg, self.clock.now_iso());
        let path = self.writer.save("strategies.json", &snapshot)?;
        info!(count = snapshot.strategies.len(), path = %path.display(), "strategies.saved");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubTransport;
    use serde_json::{json, Value};
    use std::{fs, path::Path};

    fn fixture(root: &Path) -> Config {
        let cfg = Config {
            bot_data_dir: root.join("bot/data"),
            tasks_path: root.join("tasks.json"),
            memory_dir: root.join("memory"),
            strategy_source_path: root.join("bot/config.py"),
            grid_marker_path: root.join("bot/grid_bot.pid"),
            grid_process_name: "definitely-not-running-grid-bot-7c1e".into(),
            output_dir: root.join("dashboard/data"),
            tz: Some("UTC".into()),
            ..Config::default()
        };
        fs::create_dir_all(cfg.trades_dir()).unwrap();
        fs::create_dir_all(cfg.signals_dir()).unwrap();
        fs::create_dir_all(&cfg.memory_dir).unwrap();
        fs::write(
            cfg.trades_dir().join("trades_2024-05-01.jsonl"),
            "{\"timestamp\":1714557600,\"input_token\":\"USDC\",\"output_token\":\"SOL\",\"amount\":10}\nbroken\n",
        )
        .unwrap();
        fs::write(
            cfg.trades_dir().join("trades_2024-05-02.jsonl"),
            "{\"timestamp\":\"2024-05-02T09:00:00\",\"input_token\":\"SOL\",\"output_token\":\"USDC\"}\n",
        )
        .unwrap();
        fs::write(
            cfg.signals_dir().join("signals_2024-05-01.jsonl"),
            "{\"checked_at\":1714557600.5,\"cci\":-120.4}\n",
        )
        .unwrap();
        fs::write(
            &cfg.tasks_path,
            r#"{"members": {}, "projects": [{"id": "p", "name": "P", "tasks": [{"status": "completed"}, {"status": "pending"}]}]}"#,
        )
        .unwrap();
        fs::write(cfg.memory_dir.join("2024-05-01.md"), "report").unwrap();
        fs::write(
            &cfg.strategy_source_path,
            "STRATEGY_CONFIG = {\n    'SOL/USDC': {'strategy': 'cci', 'enabled': True, 'symbol': 'SOL', 'cci_period': 14},\n}\n",
        )
        .unwrap();
        cfg
    }

    fn stub(cfg: &Config) -> StubTransport {
        StubTransport::default()
            // no "result" key: balance reads as zero
            .with_rpc("getBalance", json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32600, "message": "bad"}}))
            .with_rpc(
                "getTokenAccountsByOwner",
                json!({"jsonrpc": "2.0", "id": 2, "result": {"value": [{
                    "account": {"data": {"parsed": {"info": {"mint": cfg.usdc_mint, "tokenAmount": {"uiAmount": 25.5}}}}}
                }]}}),
            )
            .with_get(
                &cfg.price_api_url,
                json!({"solana": {"usd": 150.0}, "bitcoin": {"usd": 60000.0}, "binancecoin": {"usd": 600.0}}),
            )
    }

    fn read(cfg: &Config, name: &str) -> Value {
        serde_json::from_str(&fs::read_to_string(cfg.output_dir.join(name)).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn writes_every_artifact_when_balance_has_no_result() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = fixture(tmp.path());
        let pipeline = Pipeline::new(cfg.clone(), Arc::new(stub(&cfg))).unwrap();

        let summary = pipeline.run().await.unwrap();

        let wallet = read(&cfg, "wallet.json");
        assert_eq!(wallet["sol_balance"], json!(0.0));
        assert_eq!(wallet["usdc_balance"], json!(25.5));
        assert_eq!(wallet["total_usd"], json!(25.5));

        let trades = read(&cfg, "trades.json");
        assert_eq!(trades.as_array().unwrap().len(), 2);
        assert_eq!(trades[0]["timestamp"], json!("2024-05-01T10:00:00"));
        assert_eq!(trades[1]["timestamp"], json!("2024-05-02T09:00:00"));

        let signals = read(&cfg, "signals.json");
        assert_eq!(signals[0]["checked_at"], json!("2024-05-01T10:00:00.500000"));

        let tasks = read(&cfg, "tasks.json");
        assert_eq!(tasks["statistics"]["progress_percentage"], json!(50.0));

        let strategies = read(&cfg, "strategies.json");
        assert_eq!(strategies["strategies"][0]["stats"]["trade_count"], json!(2));

        assert_eq!(read(&cfg, "daily_reports.json")[0]["date"], json!("2024-05-01"));

        assert_eq!(summary.trades_count, 2);
        assert_eq!(summary.signals_count, 1);
        assert_eq!(summary.tasks_count, 2);
        assert_eq!(summary.daily_reports_count, 1);
        assert_eq!(summary.strategies_count, 1);
        assert_eq!(read(&cfg, "summary.json")["wallet_total_usd"], json!(25.5));
    }

    #[tokio::test]
    async fn network_down_still_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = fixture(tmp.path());
        let pipeline = Pipeline::new(cfg.clone(), Arc::new(StubTransport::default())).unwrap();

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.wallet_total_usd, 0.0);
        assert_eq!(read(&cfg, "wallet.json")["other_tokens"], json!([]));
    }

    #[tokio::test]
    async fn reruns_are_identical_apart_from_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = fixture(tmp.path());
        let files = [
            "trades.json",
            "signals.json",
            "wallet.json",
            "tasks.json",
            "daily_reports.json",
            "strategies.json",
            "summary.json",
        ];

        let snapshot = |cfg: &Config| -> Vec<Value> {
            files
                .iter()
                .map(|name| {
                    let mut v = read(cfg, name);
                    if let Some(obj) = v.as_object_mut() {
                        for key in ["timestamp", "last_updated", "updated_at"] {
                            obj.remove(key);
                        }
                    }
                    v
                })
                .collect()
        };
        let raw = |cfg: &Config, name: &str| fs::read(cfg.output_dir.join(name)).unwrap();

        Pipeline::new(cfg.clone(), Arc::new(stub(&cfg))).unwrap().run().await.unwrap();
        let first = snapshot(&cfg);
        let first_trades = raw(&cfg, "trades.json");
        let first_tasks = raw(&cfg, "tasks.json");

        Pipeline::new(cfg.clone(), Arc::new(stub(&cfg))).unwrap().run().await.unwrap();

        assert_eq!(first, snapshot(&cfg));
        assert_eq!(first_trades, raw(&cfg, "trades.json"));
        assert_eq!(first_tasks, raw(&cfg, "tasks.json"));
    }

    #[tokio::test]
    async fn unwritable_output_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = fixture(tmp.path());
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "file, not a dir").unwrap();
        cfg.output_dir = blocker.join("data");

        let pipeline = Pipeline::new(cfg.clone(), Arc::new(stub(&cfg))).unwrap();

        assert!(pipeline.run().await.is_err());
    }
}
