//! CLI interface for poly-harvest
//!
//! Provides subcommands for:
//! - `collect`: Paginated, resumable collection of one stream
//! - `monitor`: Price fluctuation monitoring
//! - `checkpoint`: Inspect or reset stream checkpoints
//! - `relations`: Query or rebuild the entity graph
//! - `config`: Show the effective configuration

mod checkpoint;
mod collect;
mod context;
mod monitor;
mod relations;

pub use checkpoint::{CheckpointAction, CheckpointArgs};
pub use collect::{CollectArgs, CollectTarget};
pub use context::{build_fetcher, cancel_on_ctrl_c};
pub use monitor::MonitorArgs;
pub use relations::{RelationsAction, RelationsArgs};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-harvest")]
#[command(about = "Rate-limited, resumable data collector and price monitor for Polymarket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect one stream, resuming from its checkpoint
    Collect(CollectArgs),
    /// Watch token prices and alert on large moves
    Monitor(MonitorArgs),
    /// Inspect or reset checkpoints
    Checkpoint(CheckpointArgs),
    /// Query or rebuild relationships
    Relations(RelationsArgs),
    /// Show configuration
    Config,
}
