//! Relations command implementation

use crate::config::Config;
use crate::data::read_records;
use crate::monitor::AlertLog;
use crate::record::EntityKind;
use crate::relations::{Relation, RelationshipStore};
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct RelationsArgs {
    #[command(subcommand)]
    pub action: RelationsAction,
}

#[derive(Subcommand, Debug)]
pub enum RelationsAction {
    /// Everything linked from one entity
    Query {
        /// market, event, token, order, trade, user, alert
        kind: EntityKind,
        id: String,
        /// Only edges of this relation (has_token, placed_by, ...)
        #[arg(long)]
        relation: Option<Relation>,
    },
    /// Re-derive edges from stored records and the alert log
    Rebuild {
        /// Drop every edge first, including ones not derived from records or alerts
        #[arg(long)]
        clean: bool,
    },
    /// Edge counts by relation
    Stats,
}

impl RelationsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut store = RelationshipStore::open(config.storage.relationships_dir())?;

        match &self.action {
            RelationsAction::Query { kind, id, relation } => {
                let edges = store.query(*kind, id, *relation);
                if edges.is_empty() {
                    println!("No edges from {}:{}", kind, id);
                }
                for edge in edges {
                    println!("{}", edge);
                }
            }
            RelationsAction::Rebuild { clean } => {
                let records = read_records(config.storage.records_dir())?;
                let alerts = AlertLog::open(config.storage.alerts_dir())?.read_all()?;

                let added = store.rebuild(records.iter(), alerts.iter(), *clean)?;
                tracing::info!(
                    records = records.len(),
                    alerts = alerts.len(),
                    edges = added,
                    clean,
                    "Relationships rebuilt"
                );
                println!(
                    "Added {} edges from {} records and {} alerts ({} total)",
                    added,
                    records.len(),
                    alerts.len(),
                    store.len()
                );
            }
            RelationsAction::Stats => {
                let stats = store.stats();
                println!("Edges:    {}", stats.edges);
                println!("Entities: {}", stats.entities);
                for (relation, count) in &stats.by_relation {
                    println!("  {:<20} {}", relation, count);
                }
            }
        }
        Ok(())
    }
}
