//! Collected entities
//!
//! Responses are lifted into a tagged union of known entity kinds. Fields a
//! mapper does not recognise are kept verbatim in [`Record::extra`].

mod mapping;

pub use mapping::{
    ClobMarketMapper, EventMapper, GammaMarketMapper, MapError, OrderMapper, PositionMapper,
    PriceHistoryMapper, RecordMapper, TradeMapper,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds of entity the collector and relationship store know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Market,
    Event,
    Token,
    Order,
    Trade,
    User,
    UserPosition,
    PricePoint,
    Alert,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Market => "market",
            EntityKind::Event => "event",
            EntityKind::Token => "token",
            EntityKind::Order => "order",
            EntityKind::Trade => "trade",
            EntityKind::User => "user",
            EntityKind::UserPosition => "user_position",
            EntityKind::PricePoint => "price_point",
            EntityKind::Alert => "alert",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(EntityKind::Market),
            "event" => Ok(EntityKind::Event),
            "token" => Ok(EntityKind::Token),
            "order" => Ok(EntityKind::Order),
            "trade" => Ok(EntityKind::Trade),
            "user" => Ok(EntityKind::User),
            "user_position" => Ok(EntityKind::UserPosition),
            "price_point" => Ok(EntityKind::PricePoint),
            "alert" => Ok(EntityKind::Alert),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// A prediction market (one binary question)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Condition id when known, otherwise the venue's numeric id
    pub id: String,
    pub gamma_id: Option<String>,
    pub question: Option<String>,
    pub slug: Option<String>,
    pub event_ids: Vec<String>,
    pub token_ids: Vec<String>,
    pub active: Option<bool>,
    pub closed: Option<bool>,
}

/// A group of related markets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub market_ids: Vec<String>,
}

/// One outcome token of a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: String,
    pub market_id: Option<String>,
    pub outcome: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub market_id: Option<String>,
    pub token_id: Option<String>,
    /// Address that placed the order
    pub owner: Option<String>,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub market_id: Option<String>,
    pub token_id: Option<String>,
    pub maker: Option<String>,
    pub taker: Option<String>,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub user: String,
    pub token_id: String,
    pub market_id: Option<String>,
    pub size: Option<Decimal>,
    pub avg_price: Option<Decimal>,
}

/// One `(timestamp, price)` point of a token's price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePointRecord {
    pub token_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// Typed payload of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    Market(MarketRecord),
    Event(EventRecord),
    Token(TokenRecord),
    Order(OrderRecord),
    Trade(TradeRecord),
    UserPosition(PositionRecord),
    PricePoint(PricePointRecord),
}

/// An immutable fetched entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Endpoint the record came from (e.g. "clob:/trades")
    pub source_endpoint: String,
    pub body: RecordBody,
    /// Unrecognised fields, passed through untouched
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(source_endpoint: impl Into<String>, body: RecordBody) -> Self {
        Self {
            source_endpoint: source_endpoint.into(),
            body,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn kind(&self) -> EntityKind {
        match &self.body {
            RecordBody::Market(_) => EntityKind::Market,
            RecordBody::Event(_) => EntityKind::Event,
            RecordBody::Token(_) => EntityKind::Token,
            RecordBody::Order(_) => EntityKind::Order,
            RecordBody::Trade(_) => EntityKind::Trade,
            RecordBody::UserPosition(_) => EntityKind::UserPosition,
            RecordBody::PricePoint(_) => EntityKind::PricePoint,
        }
    }

    pub fn primary_key(&self) -> String {
        match &self.body {
            RecordBody::Market(m) => m.id.clone(),
            RecordBody::Event(e) => e.id.clone(),
            RecordBody::Token(t) => t.token_id.clone(),
            RecordBody::Order(o) => o.id.clone(),
            RecordBody::Trade(t) => t.id.clone(),
            RecordBody::UserPosition(p) => format!("{}:{}", p.user, p.token_id),
            RecordBody::PricePoint(p) => format!("{}@{}", p.token_id, p.timestamp.timestamp()),
        }
    }

    /// `(entity_kind, primary_key)`
    pub fn identity(&self) -> (EntityKind, String) {
        (self.kind(), self.primary_key())
    }
}
