//! In-memory edge index with an optional append-only log

use super::derive::{edges_for_alert, edges_for_record};
use super::edge::{Relation, RelationshipEdge};
use crate::monitor::Alert;
use crate::record::{EntityKind, Record};
use crate::telemetry;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const EDGE_LOG_FILE: &str = "edges.jsonl";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("relationship log I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode edge: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Counts reported by `relations stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub edges: usize,
    /// Distinct `(kind, id)` sources
    pub entities: usize,
    pub by_relation: BTreeMap<Relation, usize>,
}

type EntityKey = (EntityKind, String);

/// Entity graph keyed by edge source.
///
/// Lookups by `(from_kind, from_id)` are a single hash lookup. When opened on a
/// directory, every new edge is appended to `edges.jsonl` before it becomes
/// visible, and the log is replayed on open.
#[derive(Debug, Default)]
pub struct RelationshipStore {
    index: HashMap<EntityKey, BTreeSet<RelationshipEdge>>,
    len: usize,
    log_path: Option<PathBuf>,
}

impl RelationshipStore {
    /// Store that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `<dir>/edges.jsonl`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(EDGE_LOG_FILE);

        let mut store = Self::default();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<RelationshipEdge>(&line) {
                    Ok(edge) => {
                        store.insert(edge);
                    }
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        line = lineno + 1,
                        error = %e,
                        "Skipping bad edge line"
                    ),
                }
            }
            tracing::debug!(path = %path.display(), edges = store.len, "Relationship log replayed");
        }
        store.log_path = Some(path);
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, edge: &RelationshipEdge) -> bool {
        self.index
            .get(&(edge.from_kind, edge.from_id.clone()))
            .is_some_and(|set| set.contains(edge))
    }

    /// Insert edges, ignoring ones already present. Returns how many were new.
    pub fn upsert_edges<I>(&mut self, edges: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = RelationshipEdge>,
    {
        let mut fresh = BTreeSet::new();
        for edge in edges {
            if !self.contains(&edge) {
                fresh.insert(edge);
            }
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        if let Some(path) = &self.log_path {
            let mut buf = Vec::new();
            for edge in &fresh {
                serde_json::to_writer(&mut buf, edge)?;
                buf.push(b'\n');
            }
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(&buf)?;
            file.flush()?;
        }

        let inserted = fresh.len();
        for edge in fresh {
            self.insert(edge);
        }
        telemetry::record_edges_inserted(inserted as u64);
        Ok(inserted)
    }

    /// Edges leaving `(from_kind, from_id)`, optionally of one relation only
    pub fn query(
        &self,
        from_kind: EntityKind,
        from_id: &str,
        relation: Option<Relation>,
    ) -> Vec<RelationshipEdge> {
        let Some(set) = self.index.get(&(from_kind, from_id.to_string())) else {
            return Vec::new();
        };
        set.iter()
            .filter(|edge| relation.map_or(true, |r| edge.relation == r))
            .cloned()
            .collect()
    }

    /// Derive and upsert edges for every record
    pub fn build_from_records<'a, I>(&mut self, records: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let edges: Vec<_> = records.into_iter().flat_map(edges_for_record).collect();
        self.upsert_edges(edges)
    }

    pub fn record_alert(&mut self, alert: &Alert) -> Result<usize, StoreError> {
        self.upsert_edges(edges_for_alert(alert))
    }

    /// Re-derive edges from records and alerts. Edges already present stay,
    /// including ones added directly through `upsert_edges`, unless `clean`
    /// empties the store first. Returns how many edges were added.
    pub fn rebuild<'a, R, A>(&mut self, records: R, alerts: A, clean: bool) -> Result<usize, StoreError>
    where
        R: IntoIterator<Item = &'a Record>,
        A: IntoIterator<Item = &'a Alert>,
    {
        if clean {
            self.clear()?;
        }
        let edges: Vec<_> = records
            .into_iter()
            .flat_map(edges_for_record)
            .chain(alerts.into_iter().flat_map(edges_for_alert))
            .collect();
        self.upsert_edges(edges)
    }

    pub fn stats(&self) -> StoreStats {
        let mut by_relation = BTreeMap::new();
        for edge in self.index.values().flatten() {
            *by_relation.entry(edge.relation).or_insert(0) += 1;
        }
        StoreStats {
            edges: self.len,
            entities: self.index.len(),
            by_relation,
        }
    }

    /// Drop every edge, truncating the log too
    pub fn clear(&mut self) -> Result<(), StoreError> {
        if let Some(path) = &self.log_path {
            File::create(path)?;
        }
        self.index.clear();
        self.len = 0;
        Ok(())
    }

    fn insert(&mut self, edge: RelationshipEdge) -> bool {
        let added = self
            .index
            .entry((edge.from_kind, edge.from_id.clone()))
            .or_default()
            .insert(edge);
        if added {
            self.len += 1;
        }
        added
    }
}
