//! Collect command implementation

use super::context;
use crate::checkpoint::CheckpointStore;
use crate::collector::{
    CollectOptions, Collector, Endpoint, Endpoints, MarketFilter, PriceRange, TradeFilter,
    DEFAULT_WINDOW_SECS,
};
use crate::config::Config;
use crate::data::RecordWriter;
use crate::record::Record;
use crate::relations::RelationshipStore;
use chrono::Utc;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct CollectArgs {
    #[command(subcommand)]
    pub target: CollectTarget,

    /// Stop after this many records (resume later from the checkpoint)
    #[arg(long, global = true)]
    pub limit: Option<u64>,

    /// Forget the stream's checkpoint and start from the beginning
    #[arg(long, global = true)]
    pub reset: bool,
}

#[derive(Subcommand, Debug)]
pub enum CollectTarget {
    /// Gamma markets
    Markets(MarketArgs),
    /// Gamma events with their markets
    Events(MarketArgs),
    /// Price history of one token
    Prices(PriceArgs),
    /// CLOB orders
    Orders(TradeArgs),
    /// CLOB trades
    Trades(TradeArgs),
    /// Open positions of one wallet
    Positions {
        /// Wallet address
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug)]
pub struct MarketArgs {
    #[arg(long)]
    pub active: Option<bool>,
    #[arg(long)]
    pub closed: Option<bool>,
    /// Tag slug
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug)]
pub struct PriceArgs {
    /// CLOB token id
    #[arg(long)]
    pub token: String,
    /// Named interval (1d, 1w, max, ...); ignored when --start is given
    #[arg(long, default_value = "1d")]
    pub interval: String,
    /// Range start, unix seconds
    #[arg(long)]
    pub start: Option<i64>,
    /// Range end, unix seconds (defaults to now)
    #[arg(long)]
    pub end: Option<i64>,
    /// Window per request in seconds
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS)]
    pub step_secs: i64,
    /// Resolution in minutes
    #[arg(long, default_value_t = 60)]
    pub fidelity: u32,
}

#[derive(Args, Debug)]
pub struct TradeArgs {
    /// Market condition id
    #[arg(long)]
    pub market: Option<String>,
    #[arg(long)]
    pub maker: Option<String>,
    #[arg(long)]
    pub taker: Option<String>,
    /// Order status (orders only)
    #[arg(long)]
    pub status: Option<String>,
}

impl From<&MarketArgs> for MarketFilter {
    fn from(args: &MarketArgs) -> Self {
        Self {
            active: args.active,
            closed: args.closed,
            tag: args.tag.clone(),
        }
    }
}

impl From<&TradeArgs> for TradeFilter {
    fn from(args: &TradeArgs) -> Self {
        Self {
            market: args.market.clone(),
            maker: args.maker.clone(),
            taker: args.taker.clone(),
            status: args.status.clone(),
        }
    }
}

impl CollectTarget {
    fn endpoint(&self, endpoints: &Endpoints) -> anyhow::Result<Endpoint> {
        let endpoint = match self {
            CollectTarget::Markets(args) => endpoints.markets(&args.into()),
            CollectTarget::Events(args) => endpoints.events(&args.into()),
            CollectTarget::Prices(args) => {
                let range = match args.start {
                    Some(start) => {
                        let end = args.end.unwrap_or_else(|| Utc::now().timestamp());
                        anyhow::ensure!(start < end, "--start must be before --end");
                        PriceRange::Window {
                            start,
                            end,
                            step_secs: args.step_secs,
                        }
                    }
                    None => PriceRange::Interval(args.interval.clone()),
                };
                endpoints.price_history(&args.token, &range, args.fidelity)
            }
            CollectTarget::Orders(args) => endpoints.orders(&args.into()),
            CollectTarget::Trades(args) => endpoints.trades(&args.into()),
            CollectTarget::Positions { user } => endpoints.positions(user),
        };
        Ok(endpoint)
    }
}

impl CollectArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let endpoints = Endpoints::new(&config.api, &config.collector);
        let endpoint = self.target.endpoint(&endpoints)?;
        let stream_id = endpoint.stream_id();

        let store = CheckpointStore::open(config.storage.checkpoints_dir())?;
        if self.reset {
            store.reset(&stream_id)?;
        }

        let collector = Collector::new(context::build_fetcher(config)?, store);
        let options = CollectOptions {
            limit: self.limit.or(config.collector.limit),
            cancel: Some(context::cancel_on_ctrl_c()),
        };

        let mut writer = RecordWriter::with_output_dir(config.storage.records_dir())?;
        let mut relations = RelationshipStore::open(config.storage.relationships_dir())?;

        tracing::info!(stream_id = %stream_id, "Collecting");
        let mut collection =
            collector.collect(stream_id, endpoint.descriptor, endpoint.mapper, options);

        // A page's checkpoint is written by the following next_page call
        while let Some(page) = collection.next_page().await {
            match page {
                Ok(batch) => persist(batch, &mut writer, &mut relations)?,
                Err(e) => {
                    if e.is_resumable() {
                        tracing::error!(error = %e, "Collection interrupted; rerun to resume from the checkpoint");
                    }
                    return Err(e.into());
                }
            }
        }

        let summary = collection.summary();
        println!("Stream:  {}", summary.stream_id);
        println!(
            "Status:  {}",
            summary
                .status
                .map(|s| format!("{:?}", s))
                .unwrap_or_else(|| "incomplete".to_string())
        );
        println!("Records: {}", summary.records);
        println!("Pages:   {}", summary.pages);
        if summary.skipped > 0 {
            println!("Skipped: {} (unmappable items)", summary.skipped);
        }
        println!("Edges:   {} total", relations.len());
        Ok(())
    }
}

fn persist(
    batch: Vec<Record>,
    writer: &mut RecordWriter,
    relations: &mut RelationshipStore,
) -> anyhow::Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let added = relations.build_from_records(batch.iter())?;
    let count = batch.len();
    for record in batch {
        writer.write(record)?;
    }
    writer.flush()?;
    tracing::debug!(records = count, edges = added, "Persisted batch");
    Ok(())
}
