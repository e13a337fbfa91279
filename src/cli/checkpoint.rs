//! Checkpoint command implementation

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::Config;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct CheckpointArgs {
    #[command(subcommand)]
    pub action: CheckpointAction,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointAction {
    /// List every saved stream
    List,
    /// Show one stream's checkpoint
    Show { stream_id: String },
    /// Delete one stream's checkpoint so the next run starts over
    Reset { stream_id: String },
}

impl CheckpointArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = CheckpointStore::open(config.storage.checkpoints_dir())?;

        match &self.action {
            CheckpointAction::List => {
                let checkpoints = store.list()?;
                if checkpoints.is_empty() {
                    println!("No checkpoints in {}", store.dir().display());
                }
                for cp in checkpoints {
                    print_line(&cp);
                }
            }
            CheckpointAction::Show { stream_id } => match store.load(stream_id) {
                Some(cp) => println!("{}", serde_json::to_string_pretty(&cp)?),
                None => println!("No checkpoint for {}", stream_id),
            },
            CheckpointAction::Reset { stream_id } => {
                if store.reset(stream_id)? {
                    println!("Reset {}", stream_id);
                } else {
                    println!("No checkpoint for {}", stream_id);
                }
            }
        }
        Ok(())
    }
}

fn print_line(cp: &Checkpoint) {
    println!(
        "{}  cursor={} pages={} records={} updated={}",
        cp.stream_id,
        cp.cursor,
        cp.page_count,
        cp.records_seen,
        cp.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}
