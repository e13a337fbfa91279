//! Fluctuation monitoring end to end

use crate::common::fetcher;
use chrono::{DateTime, Utc};
use poly_harvest::fetch::mock::ScriptedTransport;
use poly_harvest::fetch::RawResponse;
use poly_harvest::monitor::{
    AlertLog, BaselineTracker, FluctuationMonitor, MonitorSettings, Observation, PriceSample,
    Severity,
};
use poly_harvest::record::EntityKind;
use poly_harvest::relations::{Relation, RelationshipStore};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn test_four_percent_is_quiet_six_percent_alerts() {
    let mut tracker = BaselineTracker::new();
    let threshold = dec!(0.05);

    assert_eq!(
        tracker.observe(&PriceSample::new("tok", dec!(1.00), at(0)), threshold),
        Observation::Baselined
    );
    assert_eq!(
        tracker.observe(&PriceSample::new("tok", dec!(1.04), at(10)), threshold),
        Observation::Unchanged {
            pct_change: dec!(0.04)
        }
    );

    let Observation::Alerted(alert) =
        tracker.observe(&PriceSample::new("tok", dec!(1.06), at(20)), threshold)
    else {
        panic!("expected an alert");
    };
    assert_eq!(alert.old_price, dec!(1.00));
    assert_eq!(alert.new_price, dec!(1.06));
    assert_eq!(alert.pct_change, dec!(0.06));
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.baseline_at, at(0));

    // Re-anchored at 1.06
    assert_eq!(tracker.baseline("tok").unwrap().reference_price, dec!(1.06));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_logs_and_links_alerts() {
    let transport = Arc::new(ScriptedTransport::new());
    let calls = AtomicUsize::new(0);
    transport.respond_with("/midpoint", move |_| {
        let prices = ["1.00", "1.04", "1.06"];
        let n = calls.fetch_add(1, Ordering::SeqCst).min(prices.len() - 1);
        Ok(RawResponse::new(200, json!({ "mid": prices[n] }).to_string()))
    });

    let dir = TempDir::new().unwrap();
    let log = AlertLog::open(dir.path().join("alerts")).unwrap();
    let monitor = FluctuationMonitor::new(fetcher(transport.clone()), "http://clob.test")
        .with_alert_log(log.clone());

    let settings = MonitorSettings {
        interval: Duration::from_secs(10),
        threshold: dec!(0.05),
        duration: Some(Duration::from_secs(30)),
        trends: true,
    };
    let mut handle = monitor.start(vec!["tok".to_string()], settings);

    let mut relations = RelationshipStore::open(dir.path().join("relationships")).unwrap();
    let mut alerts = Vec::new();
    while let Some(alert) = handle.next_alert().await {
        relations.record_alert(&alert).unwrap();
        alerts.push(alert);
    }
    let summary = handle.join().await.unwrap();

    assert_eq!(summary.ticks, 3);
    assert_eq!(transport.call_count("/midpoint"), 3);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].pct_change, dec!(0.06));
    assert_eq!(log.read_all().unwrap(), alerts);

    let linked = relations.query(EntityKind::Token, "tok", Some(Relation::Alerted));
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].to_kind, EntityKind::Alert);
    assert_eq!(linked[0].to_id, alerts[0].id.to_string());
}
