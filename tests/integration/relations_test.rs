//! Relationship graph built from collected records

use crate::common::{fetcher, markets_endpoint, serve_markets};
use poly_harvest::checkpoint::CheckpointStore;
use poly_harvest::collector::{CollectOptions, Collector};
use poly_harvest::data::{read_records, RecordWriter};
use poly_harvest::fetch::mock::ScriptedTransport;
use poly_harvest::record::EntityKind;
use poly_harvest::relations::{Relation, RelationshipEdge, RelationshipStore};
use std::sync::Arc;
use tempfile::TempDir;

fn has_token(market: &str, token: &str) -> RelationshipEdge {
    RelationshipEdge::new(EntityKind::Market, market, EntityKind::Token, token, Relation::HasToken)
}

#[test]
fn test_query_returns_exactly_the_inserted_edges() {
    let mut store = RelationshipStore::in_memory();
    store
        .upsert_edges([has_token("M1", "T1"), has_token("M1", "T2")])
        .unwrap();
    assert_eq!(store.upsert_edges([has_token("M1", "T1")]).unwrap(), 0);

    let edges = store.query(EntityKind::Market, "M1", None);
    assert_eq!(edges, vec![has_token("M1", "T1"), has_token("M1", "T2")]);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_collected_markets_link_to_tokens() {
    let transport = Arc::new(ScriptedTransport::new());
    serve_markets(&transport, 2);
    let endpoint = markets_endpoint(10);
    let dir = TempDir::new().unwrap();

    let collector = Collector::new(
        fetcher(transport),
        CheckpointStore::open(dir.path().join("checkpoints")).unwrap(),
    );
    let (records, _) = collector
        .collect(
            endpoint.stream_id(),
            endpoint.descriptor,
            endpoint.mapper,
            CollectOptions::default(),
        )
        .collect_all()
        .await
        .unwrap();

    let relations_dir = dir.path().join("relationships");
    {
        let mut store = RelationshipStore::open(&relations_dir).unwrap();
        let added = store.build_from_records(records.iter()).unwrap();
        assert!(added > 0);
        assert_eq!(store.build_from_records(records.iter()).unwrap(), 0);

        let mut writer = RecordWriter::with_output_dir(dir.path().join("records")).unwrap();
        for record in records {
            writer.write(record).unwrap();
        }
    }

    // Reopened store reflects everything upserted before
    let store = RelationshipStore::open(&relations_dir).unwrap();
    assert_eq!(
        store.query(EntityKind::Market, "0xm0", Some(Relation::HasToken)),
        vec![has_token("0xm0", "t0n"), has_token("0xm0", "t0y")]
    );
    let back = store.query(EntityKind::Token, "t1y", None);
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].relation, Relation::BelongsToMarket);
    assert_eq!(back[0].to_id, "0xm1");

    // Rebuilding from the record files gives the same graph
    let stored = read_records(dir.path().join("records")).unwrap();
    let mut rebuilt = RelationshipStore::in_memory();
    rebuilt.build_from_records(stored.iter()).unwrap();
    assert_eq!(rebuilt.stats(), store.stats());
}
