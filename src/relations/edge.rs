//! Relationship edge types

use crate::record::EntityKind;
use serde::{Deserialize, Serialize};

/// Kind of link between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    HasToken,
    BelongsToMarket,
    InEvent,
    HasMarket,
    HasOrder,
    HasTrade,
    ForToken,
    PlacedBy,
    Placed,
    TradedBy,
    Traded,
    HoldsPosition,
    HeldBy,
    Alerted,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::HasToken => "has_token",
            Relation::BelongsToMarket => "belongs_to_market",
            Relation::InEvent => "in_event",
            Relation::HasMarket => "has_market",
            Relation::HasOrder => "has_order",
            Relation::HasTrade => "has_trade",
            Relation::ForToken => "for_token",
            Relation::PlacedBy => "placed_by",
            Relation::Placed => "placed",
            Relation::TradedBy => "traded_by",
            Relation::Traded => "traded",
            Relation::HoldsPosition => "holds_position",
            Relation::HeldBy => "held_by",
            Relation::Alerted => "alerted",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown relation: {}", s))
    }
}

/// Directed link `(from_kind, from_id) --relation--> (to_kind, to_id)`.
/// Two edges are the same edge exactly when all five fields match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from_kind: EntityKind,
    pub from_id: String,
    pub to_kind: EntityKind,
    pub to_id: String,
    pub relation: Relation,
}

impl RelationshipEdge {
    pub fn new(
        from_kind: EntityKind,
        from_id: impl Into<String>,
        to_kind: EntityKind,
        to_id: impl Into<String>,
        relation: Relation,
    ) -> Self {
        Self {
            from_kind,
            from_id: from_id.into(),
            to_kind,
            to_id: to_id.into(),
            relation,
        }
    }
}

impl std::fmt::Display for RelationshipEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -[{}]-> {}:{}",
            self.from_kind, self.from_id, self.relation, self.to_kind, self.to_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_from_str() {
        assert_eq!("has_token".parse::<Relation>().unwrap(), Relation::HasToken);
        assert_eq!("belongs_to_market".parse::<Relation>().unwrap(), Relation::BelongsToMarket);
        assert!("likes".parse::<Relation>().is_err());
    }

    #[test]
    fn test_edge_display() {
        let edge = RelationshipEdge::new(EntityKind::Order, "o1", EntityKind::User, "0xu", Relation::PlacedBy);
        assert_eq!(edge.to_string(), "order:o1 -[placed_by]-> user:0xu");
    }
}
