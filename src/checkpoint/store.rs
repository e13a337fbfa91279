//! File-backed checkpoint store
//!
//! One JSON file per stream. Writes go to a temp file in the same directory
//! which is fsynced and renamed over the target, so a crash never leaves a
//! torn checkpoint behind. Unreadable files load as absent.

use super::Checkpoint;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Checkpoint persistence errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("records_seen for {stream_id} would go backwards ({stored} -> {attempted})")]
    Regression {
        stream_id: String,
        stored: u64,
        attempted: u64,
    },
}

/// Durable per-stream cursor state
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a stream's checkpoint. Missing, unreadable, or corrupt files are
    /// treated as absent so collection restarts from the beginning.
    pub fn load(&self, stream_id: &str) -> Option<Checkpoint> {
        let path = self.path_for(stream_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(stream_id, path = ?path, error = %e, "Unreadable checkpoint, starting over");
                return None;
            }
        };

        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(checkpoint) if checkpoint.stream_id == stream_id => Some(checkpoint),
            Ok(checkpoint) => {
                tracing::warn!(
                    stream_id,
                    found = %checkpoint.stream_id,
                    "Checkpoint belongs to a different stream, ignoring"
                );
                None
            }
            Err(e) => {
                tracing::warn!(stream_id, path = ?path, error = %e, "Corrupt checkpoint, starting over");
                None
            }
        }
    }

    /// Atomically replace the stream's checkpoint
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(stored) = self.load(&checkpoint.stream_id) {
            if checkpoint.records_seen < stored.records_seen {
                return Err(CheckpointError::Regression {
                    stream_id: checkpoint.stream_id.clone(),
                    stored: stored.records_seen,
                    attempted: checkpoint.records_seen,
                });
            }
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(&checkpoint.stream_id))
            .map_err(|e| e.error)?;

        tracing::trace!(
            stream_id = %checkpoint.stream_id,
            cursor = %checkpoint.cursor,
            records_seen = checkpoint.records_seen,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Delete a stream's checkpoint. Returns whether one existed.
    pub fn reset(&self, stream_id: &str) -> Result<bool, CheckpointError> {
        match fs::remove_file(self.path_for(stream_id)) {
            Ok(()) => {
                tracing::info!(stream_id, "Checkpoint reset");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All readable checkpoints, sorted by stream id
    pub fn list(&self) -> Result<Vec<Checkpoint>, CheckpointError> {
        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str::<Checkpoint>(&c).ok())
            {
                Some(checkpoint) => checkpoints.push(checkpoint),
                None => tracing::debug!(path = ?path, "Skipping unreadable checkpoint file"),
            }
        }
        checkpoints.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
        Ok(checkpoints)
    }

    fn path_for(&self, stream_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_stream_id(stream_id)))
    }
}

/// Injective, filesystem-safe encoding of a stream id
fn encode_stream_id(stream_id: &str) -> String {
    let mut out = String::with_capacity(stream_id.len());
    for byte in stream_id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
