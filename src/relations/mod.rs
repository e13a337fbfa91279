//! Entity relationship graph
//!
//! Edges are derived from collected records and monitor alerts, then kept in
//! an index keyed by the source entity so "everything related to market X"
//! is a single lookup.

mod derive;
mod edge;
mod store;

pub use derive::{edges_for_alert, edges_for_record};
pub use edge::{Relation, RelationshipEdge};
pub use store::{RelationshipStore, StoreError, StoreStats, EDGE_LOG_FILE};
