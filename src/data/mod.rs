//! Local record sink
//!
//! Stores collected records as JSON lines for later relationship rebuilds

mod writer;

pub use writer::{read_records, RecordWriter, WriterConfig, WriterStats};
