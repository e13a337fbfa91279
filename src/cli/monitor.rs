//! Monitor command implementation

use super::context;
use crate::config::Config;
use crate::monitor::{AlertLog, FluctuationMonitor, MonitorSettings, MonitorSummary};
use crate::relations::RelationshipStore;
use clap::Args;
use rust_decimal::Decimal;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Token ids to watch
    #[arg(long = "token", required = true, num_args = 1..)]
    pub tokens: Vec<String>,

    /// Seconds between samples (defaults to monitor.interval_secs)
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Fractional move that raises an alert, e.g. 0.05
    #[arg(long)]
    pub threshold: Option<Decimal>,

    /// Stop after this many seconds; runs until Ctrl-C otherwise
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Only alert on threshold moves
    #[arg(long)]
    pub no_trends: bool,
}

impl MonitorArgs {
    fn settings(&self, config: &Config) -> anyhow::Result<MonitorSettings> {
        let interval_secs = self.interval_secs.unwrap_or(config.monitor.interval_secs);
        anyhow::ensure!(interval_secs > 0, "interval must be at least one second");
        let threshold = self.threshold.unwrap_or(config.monitor.threshold);
        anyhow::ensure!(threshold > Decimal::ZERO, "threshold must be positive");

        Ok(MonitorSettings {
            interval: Duration::from_secs(interval_secs),
            threshold,
            duration: self
                .duration_secs
                .or(config.monitor.duration_secs)
                .map(Duration::from_secs),
            trends: config.monitor.trend_alerts && !self.no_trends,
        })
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let settings = self.settings(config)?;
        let alert_log = AlertLog::open(config.storage.alerts_dir())?;
        let mut relations = RelationshipStore::open(config.storage.relationships_dir())?;

        let monitor = FluctuationMonitor::new(context::build_fetcher(config)?, &config.api.clob_url)
            .with_alert_log(alert_log);
        let mut handle = monitor.start(self.tokens.clone(), settings);

        let cancel = handle.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping monitor");
                cancel.cancel();
            }
        });

        while let Some(alert) = handle.next_alert().await {
            println!(
                "[{}] {} {} {} {} -> {} ({:+.2}%)",
                alert.triggered_at.format("%H:%M:%S"),
                alert.severity,
                alert.kind,
                alert.token_id,
                alert.old_price,
                alert.new_price,
                alert.pct_change * Decimal::ONE_HUNDRED,
            );
            if let Err(e) = relations.record_alert(&alert) {
                tracing::error!(alert_id = %alert.id, error = %e, "Failed to link alert");
            }
        }

        let summary = handle.join().await?;
        print_summary(&summary);
        Ok(())
    }
}

fn print_summary(summary: &MonitorSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    println!();
    println!(
        "Monitored {} tokens for {}s: {} ticks, {} samples, {} alerts",
        summary.tokens.len(),
        elapsed.num_seconds(),
        summary.ticks,
        summary.total_samples(),
        summary.total_alerts()
    );
    println!(
        "{:<24} {:>7} {:>8} {:>8} {:>8} {:>8} {:>10} {:>6}",
        "token", "samples", "failed", "min", "max", "last", "volatility", "alerts"
    );
    for (token, stats) in &summary.tokens {
        let fmt = |d: Option<Decimal>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:>7} {:>8} {:>8} {:>8} {:>8} {:>10} {:>6}",
            token,
            stats.samples,
            stats.failures,
            fmt(stats.min_price),
            fmt(stats.max_price),
            fmt(stats.last_price),
            format!("{:.4}", stats.volatility()),
            stats.alerts
        );
    }
}
