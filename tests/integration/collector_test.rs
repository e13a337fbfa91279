//! Resumable pagination across restarts

use crate::common::{endpoints, fetcher, gamma_market, markets_endpoint, serve_markets};
use poly_harvest::checkpoint::{CheckpointStore, Cursor};
use poly_harvest::collector::{CollectOptions, CollectStatus, Collector, Endpoint, TradeFilter};
use poly_harvest::fetch::mock::ScriptedTransport;
use poly_harvest::fetch::RawResponse;
use poly_harvest::record::Record;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn key(record: &Record) -> String {
    let (kind, id) = record.identity();
    format!("{}:{}", kind, id)
}

/// One process lifetime: fresh store handle, fresh collector
async fn run_once(
    transport: &Arc<ScriptedTransport>,
    dir: &Path,
    endpoint: &Endpoint,
    limit: Option<u64>,
) -> (Vec<Record>, Option<CollectStatus>) {
    let store = CheckpointStore::open(dir).unwrap();
    let collector = Collector::new(fetcher(transport.clone()), store);
    let mut collection = collector.collect(
        endpoint.stream_id(),
        endpoint.descriptor.clone(),
        endpoint.mapper.clone(),
        CollectOptions {
            limit,
            cancel: None,
        },
    );
    let mut records = Vec::new();
    while let Some(item) = collection.next().await {
        records.push(item.unwrap());
    }
    (records, collection.status())
}

#[tokio::test]
async fn test_interrupted_runs_equal_one_full_run() {
    let transport = Arc::new(ScriptedTransport::new());
    serve_markets(&transport, 10);
    let endpoint = markets_endpoint(3);

    let full_dir = TempDir::new().unwrap();
    let (full, status) = run_once(&transport, full_dir.path(), &endpoint, None).await;
    assert_eq!(status, Some(CollectStatus::Exhausted));
    // market + two tokens each
    assert_eq!(full.len(), 30);
    let expected: Vec<_> = full.iter().map(key).collect();

    for limits in [vec![1], vec![2, 5], vec![4, 4, 4, 100], vec![7, 1, 3], vec![9]] {
        let dir = TempDir::new().unwrap();
        let mut yielded = Vec::new();
        let mut runs = 0;
        loop {
            let limit = limits[runs.min(limits.len() - 1)];
            let (records, status) = run_once(&transport, dir.path(), &endpoint, Some(limit)).await;
            assert!(records.len() as u64 <= limit);
            yielded.extend(records.iter().map(key));
            runs += 1;
            if status == Some(CollectStatus::Exhausted) {
                break;
            }
            assert_eq!(status, Some(CollectStatus::LimitReached));
            assert!(runs < 100, "limits {:?} never finished", limits);
        }

        assert_eq!(yielded, expected, "limits {:?}", limits);
        let unique: HashSet<_> = yielded.iter().collect();
        assert_eq!(unique.len(), yielded.len());
    }
}

#[tokio::test]
async fn test_finished_stream_yields_only_new_items() {
    let transport = Arc::new(ScriptedTransport::new());
    serve_markets(&transport, 4);
    let endpoint = markets_endpoint(3);
    let dir = TempDir::new().unwrap();

    let (first, _) = run_once(&transport, dir.path(), &endpoint, None).await;
    assert_eq!(first.len(), 12);

    let (again, status) = run_once(&transport, dir.path(), &endpoint, None).await;
    assert!(again.is_empty());
    assert_eq!(status, Some(CollectStatus::Exhausted));

    // The venue lists one more market
    serve_markets(&transport, 5);
    let (new, _) = run_once(&transport, dir.path(), &endpoint, None).await;
    let keys: Vec<_> = new.iter().map(key).collect();
    assert_eq!(keys, vec!["market:0xm4", "token:t4y", "token:t4n"]);
}

#[tokio::test(start_paused = true)]
async fn test_outage_mid_stream_resumes_from_last_page() {
    let transport = Arc::new(ScriptedTransport::new());
    let down = Arc::new(AtomicBool::new(true));
    let flag = down.clone();
    transport.respond_with("/markets", move |req| {
        let offset: usize = req.param("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
        if offset >= 3 && flag.load(Ordering::SeqCst) {
            return Ok(RawResponse::new(503, "maintenance"));
        }
        let page: Vec<_> = (offset..6.min(offset + 3)).map(gamma_market).collect();
        Ok(RawResponse::new(200, serde_json::Value::Array(page).to_string()))
    });
    let endpoint = markets_endpoint(3);
    let dir = TempDir::new().unwrap();

    let store = CheckpointStore::open(dir.path()).unwrap();
    let collector = Collector::new(fetcher(transport.clone()), store.clone());
    let collection = collector.collect(
        endpoint.stream_id(),
        endpoint.descriptor.clone(),
        endpoint.mapper.clone(),
        CollectOptions::default(),
    );
    let err = collection.collect_all().await.unwrap_err();
    assert!(err.is_resumable());
    // One page served, then three attempts at offset 3
    assert_eq!(transport.call_count("/markets"), 4);

    let checkpoint = store.load(&endpoint.stream_id()).unwrap();
    assert_eq!(checkpoint.cursor, Cursor::Offset(3));
    assert_eq!(checkpoint.records_seen, 9);

    down.store(false, Ordering::SeqCst);
    let (rest, status) = run_once(&transport, dir.path(), &endpoint, None).await;
    assert_eq!(status, Some(CollectStatus::Exhausted));
    assert_eq!(rest.len(), 9);
    assert_eq!(key(&rest[0]), "market:0xm3");
}

#[tokio::test]
async fn test_trades_follow_cursor_to_end_marker() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_with("/trades", |req| {
        let body = match req.param("next_cursor") {
            None | Some("") => json!({
                "data": [
                    {"id": "x1", "market": "0xm1", "asset_id": "t1", "maker_address": "0xa", "taker_address": "0xb", "price": "0.5", "size": "10"},
                    {"id": "x2", "market": "0xm1", "asset_id": "t1", "maker_address": "0xa", "taker_address": "0xc", "price": "0.51", "size": "4"}
                ],
                "next_cursor": "MTA="
            }),
            Some("MTA=") => json!({
                "data": [{"id": "x3", "market": "0xm2", "asset_id": "t2", "price": "0.2", "size": "1"}],
                "next_cursor": "LTE="
            }),
            Some(other) => return Ok(RawResponse::new(400, format!("bad cursor {}", other))),
        };
        Ok(RawResponse::new(200, body.to_string()))
    });

    let endpoint = endpoints(100).trades(&TradeFilter::default());
    let dir = TempDir::new().unwrap();

    let (trades, status) = run_once(&transport, dir.path(), &endpoint, None).await;
    assert_eq!(status, Some(CollectStatus::Exhausted));
    let ids: Vec<_> = trades.iter().map(|r| r.primary_key()).collect();
    assert_eq!(ids, vec!["x1", "x2", "x3"]);
    assert_eq!(transport.call_count("/trades"), 2);

    let (again, _) = run_once(&transport, dir.path(), &endpoint, None).await;
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_positions_snapshot_is_reread_in_full() {
    let transport = Arc::new(ScriptedTransport::new());
    let position = |asset: &str| json!({"proxyWallet": "0xu", "asset": asset, "size": "5"});
    transport.push_json("/positions", 200, json!([position("A"), position("B")]));
    transport.push_json("/positions", 200, json!([position("C"), position("A"), position("B")]));

    let endpoint = endpoints(100).positions("0xu");
    let dir = TempDir::new().unwrap();

    let (first, status) = run_once(&transport, dir.path(), &endpoint, None).await;
    assert_eq!(status, Some(CollectStatus::Exhausted));
    let ids: Vec<_> = first.iter().map(|r| r.primary_key()).collect();
    assert_eq!(ids, vec!["0xu:A", "0xu:B"]);

    let (second, _) = run_once(&transport, dir.path(), &endpoint, None).await;
    let ids: Vec<_> = second.iter().map(|r| r.primary_key()).collect();
    assert_eq!(ids, vec!["0xu:C", "0xu:A", "0xu:B"]);

    let cp = CheckpointStore::open(dir.path()).unwrap().load(&endpoint.stream_id()).unwrap();
    assert_eq!(cp.cursor, Cursor::Offset(0));
    assert_eq!(cp.skip_in_page, 0);
}
