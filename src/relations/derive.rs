//! Edge derivation from records and alerts
//!
//! Every link is emitted in both directions so that a lookup by
//! `(from_kind, from_id)` finds everything touching an entity.

use super::edge::{Relation, RelationshipEdge};
use crate::monitor::Alert;
use crate::record::{EntityKind, Record, RecordBody};

struct Edges(Vec<RelationshipEdge>);

impl Edges {
    fn link(
        &mut self,
        (a_kind, a_id): (EntityKind, &str),
        forward: Relation,
        (b_kind, b_id): (EntityKind, &str),
        backward: Relation,
    ) {
        if a_id.is_empty() || b_id.is_empty() {
            return;
        }
        self.0.push(RelationshipEdge::new(a_kind, a_id, b_kind, b_id, forward));
        self.0.push(RelationshipEdge::new(b_kind, b_id, a_kind, a_id, backward));
    }
}

/// Edges implied by one record's fields
pub fn edges_for_record(record: &Record) -> Vec<RelationshipEdge> {
    use EntityKind::{Event, Market, Order, Token, Trade, User};

    let mut edges = Edges(Vec::new());
    match &record.body {
        RecordBody::Market(m) => {
            for token in &m.token_ids {
                edges.link((Market, &m.id), Relation::HasToken, (Token, token), Relation::BelongsToMarket);
            }
            for event in &m.event_ids {
                edges.link((Market, &m.id), Relation::InEvent, (Event, event), Relation::HasMarket);
            }
        }
        RecordBody::Event(e) => {
            for market in &e.market_ids {
                edges.link((Event, &e.id), Relation::HasMarket, (Market, market), Relation::InEvent);
            }
        }
        RecordBody::Token(t) => {
            if let Some(market) = &t.market_id {
                edges.link((Token, &t.token_id), Relation::BelongsToMarket, (Market, market), Relation::HasToken);
            }
        }
        RecordBody::Order(o) => {
            if let Some(market) = &o.market_id {
                edges.link((Order, &o.id), Relation::BelongsToMarket, (Market, market), Relation::HasOrder);
            }
            if let Some(token) = &o.token_id {
                edges.link((Order, &o.id), Relation::ForToken, (Token, token), Relation::HasOrder);
            }
            if let Some(owner) = &o.owner {
                edges.link((Order, &o.id), Relation::PlacedBy, (User, owner), Relation::Placed);
            }
        }
        RecordBody::Trade(t) => {
            if let Some(market) = &t.market_id {
                edges.link((Trade, &t.id), Relation::BelongsToMarket, (Market, market), Relation::HasTrade);
            }
            if let Some(token) = &t.token_id {
                edges.link((Trade, &t.id), Relation::ForToken, (Token, token), Relation::HasTrade);
            }
            for user in [&t.maker, &t.taker].into_iter().flatten() {
                edges.link((Trade, &t.id), Relation::TradedBy, (User, user), Relation::Traded);
            }
        }
        RecordBody::UserPosition(p) => {
            edges.link((User, &p.user), Relation::HoldsPosition, (Token, &p.token_id), Relation::HeldBy);
        }
        // Price points would add one edge per sample without linking anything new
        RecordBody::PricePoint(_) => {}
    }
    edges.0
}

/// `(token, T) -alerted-> (alert, A)` and its inverse
pub fn edges_for_alert(alert: &Alert) -> Vec<RelationshipEdge> {
    let mut edges = Edges(Vec::new());
    let alert_id = alert.id.to_string();
    edges.link(
        (EntityKind::Token, &alert.token_id),
        Relation::Alerted,
        (EntityKind::Alert, &alert_id),
        Relation::ForToken,
    );
    edges.0
}
