//! Polling loop that samples midpoints and raises alerts

use super::alert_log::AlertLog;
use super::summary::MonitorSummary;
use super::tracker::{Alert, BaselineTracker, Observation, PriceSample};
use super::trend::TrendTracker;
use crate::fetch::{FetchError, Fetcher, Request};
use crate::schedule::{CancelToken, Schedule};
use crate::telemetry;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Why one token could not be sampled this tick
#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no usable price in response: {0}")]
    NoPrice(String),
}

/// Loop parameters
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Fractional move that raises an alert
    pub threshold: Decimal,
    /// None runs until stopped
    pub duration: Option<Duration>,
    /// Raise trend alerts as well as threshold alerts
    pub trends: bool,
}

/// Samples a fixed set of tokens on an interval
pub struct FluctuationMonitor {
    fetcher: Arc<Fetcher>,
    clob_url: String,
    alert_log: Option<AlertLog>,
}

impl FluctuationMonitor {
    pub fn new(fetcher: Arc<Fetcher>, clob_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            clob_url: clob_url.into(),
            alert_log: None,
        }
    }

    /// Append every alert to `log` as well
    pub fn with_alert_log(mut self, log: AlertLog) -> Self {
        self.alert_log = Some(log);
        self
    }

    /// Current midpoint of one token
    pub async fn sample(&self, token_id: &str) -> Result<PriceSample, SampleError> {
        let request = Request::new(&self.clob_url, "/midpoint").query("token_id", token_id);
        let response = self.fetcher.fetch(&request).await?;
        let price = parse_price(&response.body)
            .ok_or_else(|| SampleError::NoPrice(truncate(&response.body.to_string(), 120)))?;
        Ok(PriceSample::new(token_id, price, Utc::now()))
    }

    /// Spawn the loop. Alerts arrive on the handle as they fire; the
    /// summary is returned by [`MonitorHandle::join`].
    pub fn start(self, tokens: Vec<String>, settings: MonitorSettings) -> MonitorHandle {
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move { self.run(tokens, settings, task_cancel, tx).await });

        MonitorHandle {
            alerts: rx,
            cancel,
            task,
        }
    }

    /// Run the loop on the current task until cancelled or the duration elapses
    pub async fn run(
        self,
        tokens: Vec<String>,
        settings: MonitorSettings,
        cancel: CancelToken,
        alerts: mpsc::UnboundedSender<Alert>,
    ) -> MonitorSummary {
        let state = Mutex::new(Trackers {
            baselines: BaselineTracker::new(),
            trends: settings.trends.then(TrendTracker::new),
            summary: MonitorSummary::new(&tokens),
        });
        let schedule = Schedule::new(settings.interval, settings.duration);
        let threshold = settings.threshold;

        tracing::info!(
            tokens = tokens.len(),
            interval_secs = settings.interval.as_secs_f64(),
            threshold = %threshold,
            trends = settings.trends,
            duration_secs = settings.duration.map(|d| d.as_secs()),
            "Fluctuation monitor started"
        );

        let reason = schedule
            .run(&cancel, |tick| {
                let this = &self;
                let tokens = &tokens;
                let state = &state;
                let alerts = &alerts;
                let cancel = &cancel;
                async move {
                    let mut trackers = state.lock().await;
                    for token_id in tokens {
                        if cancel.is_cancelled() {
                            break;
                        }
                        this.poll_token(token_id, threshold, &mut trackers, alerts)
                            .await;
                    }
                    trackers.summary.ticks = tick + 1;
                }
            })
            .await;

        let mut summary = state.into_inner().summary;
        summary.finished_at = Utc::now();
        tracing::info!(
            reason = ?reason,
            ticks = summary.ticks,
            samples = summary.total_samples(),
            alerts = summary.total_alerts(),
            "Fluctuation monitor stopped"
        );
        summary
    }

    async fn poll_token(
        &self,
        token_id: &str,
        threshold: Decimal,
        trackers: &mut Trackers,
        alerts: &mpsc::UnboundedSender<Alert>,
    ) {
        let sample = match self.sample(token_id).await {
            Ok(sample) => sample,
            Err(e) => {
                trackers.summary.record_failure(token_id);
                tracing::warn!(token_id, error = %e, "Price sample failed, skipping token this tick");
                return;
            }
        };
        trackers.summary.record_sample(&sample);

        match trackers.baselines.observe(&sample, threshold) {
            Observation::Baselined => {
                tracing::debug!(token_id, price = %sample.price, "Baseline set");
            }
            Observation::Unchanged { pct_change } => {
                tracing::trace!(token_id, price = %sample.price, pct_change = %pct_change, "Within threshold");
            }
            Observation::ZeroReference => {
                tracing::debug!(token_id, price = %sample.price, "Zero baseline, re-anchored without comparison");
            }
            Observation::Stale => {
                tracing::debug!(token_id, "Sample not newer than baseline, ignored");
            }
            Observation::Alerted(alert) => self.raise(alert, &mut trackers.summary, alerts),
        }

        if let Some(alert) = trackers.trends.as_mut().and_then(|t| t.observe(&sample)) {
            self.raise(alert, &mut trackers.summary, alerts);
        }
    }

    fn raise(&self, alert: Alert, summary: &mut MonitorSummary, alerts: &mpsc::UnboundedSender<Alert>) {
        tracing::warn!(
            token_id = %alert.token_id,
            kind = %alert.kind,
            old_price = %alert.old_price,
            new_price = %alert.new_price,
            pct_change = %alert.pct_change,
            severity = %alert.severity,
            "Price fluctuation alert"
        );
        telemetry::record_alert(alert.severity.as_str());
        summary.record_alert(&alert);

        if let Some(log) = &self.alert_log {
            if let Err(e) = log.append(&alert) {
                tracing::error!(token_id = %alert.token_id, error = %e, "Failed to append alert log");
            }
        }
        // Receiver may be gone; the alert is still logged and counted
        let _ = alerts.send(alert);
    }
}

/// Per-run state shared by every tick
struct Trackers {
    baselines: BaselineTracker,
    /// None when trend alerts are off
    trends: Option<TrendTracker>,
    summary: MonitorSummary,
}

/// Running monitor
pub struct MonitorHandle {
    alerts: mpsc::UnboundedReceiver<Alert>,
    cancel: CancelToken,
    task: JoinHandle<MonitorSummary>,
}

impl MonitorHandle {
    /// Next alert; None once the monitor has stopped and all alerts were read
    pub async fn next_alert(&mut self) -> Option<Alert> {
        self.alerts.recv().await
    }

    /// Ask the loop to stop at the next token or tick boundary
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the loop to finish
    pub async fn join(self) -> anyhow::Result<MonitorSummary> {
        Ok(self.task.await?)
    }
}

/// `{"mid": "0.55"}` as served by `/midpoint`; `price` and bare numbers are
/// accepted too
fn parse_price(body: &Value) -> Option<Decimal> {
    let value = match body {
        Value::Object(map) => map.get("mid").or_else(|| map.get("price"))?,
        other => other,
    };
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
