//! Buffered JSONL writer, one file per entity kind

use crate::record::{EntityKind, Record};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Configuration for record writing
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Output directory for `<kind>.jsonl` files
    pub output_dir: PathBuf,
    /// Records buffered per kind before flushing
    pub buffer_size: usize,
}

impl WriterConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            buffer_size: 500,
        }
    }
}

/// Writing statistics
#[derive(Debug, Default, Clone)]
pub struct WriterStats {
    pub records_received: u64,
    pub records_written: u64,
    pub flushes: u64,
    pub last_flush: Option<DateTime<Utc>>,
}

/// Appends records to `<output_dir>/<kind>.jsonl`
pub struct RecordWriter {
    config: WriterConfig,
    buffers: BTreeMap<EntityKind, Vec<Record>>,
    stats: WriterStats,
}

impl RecordWriter {
    pub fn new(config: WriterConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            config,
            buffers: BTreeMap::new(),
            stats: WriterStats::default(),
        })
    }

    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> io::Result<Self> {
        Self::new(WriterConfig::new(output_dir))
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.config.output_dir.join(format!("{}.jsonl", kind))
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn write(&mut self, record: Record) -> io::Result<()> {
        self.stats.records_received += 1;
        let kind = record.kind();
        let buffer = self.buffers.entry(kind).or_default();
        buffer.push(record);
        if buffer.len() >= self.config.buffer_size {
            self.flush_kind(kind)?;
        }
        Ok(())
    }

    /// Flush every buffered record to disk
    pub fn flush(&mut self) -> io::Result<()> {
        let kinds: Vec<_> = self.buffers.keys().copied().collect();
        for kind in kinds {
            self.flush_kind(kind)?;
        }
        Ok(())
    }

    fn flush_kind(&mut self, kind: EntityKind) -> io::Result<()> {
        let Some(buffer) = self.buffers.get_mut(&kind) else {
            return Ok(());
        };
        if buffer.is_empty() {
            return Ok(());
        }

        let mut bytes = Vec::new();
        for record in buffer.iter() {
            serde_json::to_writer(&mut bytes, record)?;
            bytes.push(b'\n');
        }
        let count = buffer.len();
        buffer.clear();

        let path = self.path_for(kind);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&bytes)?;
        file.flush()?;

        self.stats.records_written += count as u64;
        self.stats.flushes += 1;
        self.stats.last_flush = Some(Utc::now());
        tracing::debug!(count, path = ?path, "Flushed records");
        Ok(())
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "Failed to flush records on drop");
        }
    }
}

/// Every record in the `*.jsonl` files under `dir`, file by file in name order.
/// Lines that do not parse are skipped with a warning.
pub fn read_records(dir: impl AsRef<Path>) -> io::Result<Vec<Record>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let reader = BufReader::new(File::open(&path)?);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = ?path,
                    line = lineno + 1,
                    error = %e,
                    "Skipping bad record line"
                ),
            }
        }
    }
    Ok(records)
}
