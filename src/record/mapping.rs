//! Per-endpoint JSON to [`Record`] mappers
//!
//! Gamma and CLOB disagree on casing (`conditionId` vs `market`), encode some
//! arrays as JSON strings (`clobTokenIds`), and send numbers as strings. The
//! helpers here accept all of those shapes.

use super::{
    EventRecord, MarketRecord, OrderRecord, PositionRecord, PricePointRecord, Record, RecordBody,
    TokenRecord, TradeRecord,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Why a single item could not be mapped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Turns one item of a page into zero or more records
pub trait RecordMapper: Send + Sync {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError>;
}

/// Gamma `/markets` items
#[derive(Debug, Clone, Default)]
pub struct GammaMarketMapper;

impl RecordMapper for GammaMarketMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let market = gamma_market(obj)?;

        let outcomes = string_list(obj.get("outcomes"));
        let prices = string_list(obj.get("outcomePrices"));
        let tokens = market
            .token_ids
            .iter()
            .enumerate()
            .map(|(i, token_id)| {
                Record::new(
                    source,
                    RecordBody::Token(TokenRecord {
                        token_id: token_id.clone(),
                        market_id: Some(market.id.clone()),
                        outcome: outcomes.get(i).cloned(),
                        price: prices.get(i).and_then(|p| Decimal::from_str(p).ok()),
                    }),
                )
            })
            .collect::<Vec<_>>();

        let extra = leftover(
            obj,
            &[
                "id",
                "conditionId",
                "question",
                "slug",
                "clobTokenIds",
                "events",
                "active",
                "closed",
                "outcomes",
                "outcomePrices",
            ],
        );

        let mut records = vec![Record::new(source, RecordBody::Market(market)).with_extra(extra)];
        records.extend(tokens);
        Ok(records)
    }
}

/// Gamma `/events` items, including their nested markets
#[derive(Debug, Clone, Default)]
pub struct EventMapper;

impl RecordMapper for EventMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let id = required_str(obj, &["id"], "id")?;

        let mut nested = Vec::new();
        for market in obj.get("markets").and_then(Value::as_array).into_iter().flatten() {
            match market.as_object().map(gamma_market).transpose() {
                Ok(Some(mut m)) => {
                    if !m.event_ids.contains(&id) {
                        m.event_ids.push(id.clone());
                    }
                    nested.push(m);
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(event_id = %id, error = %e, "Skipping nested market"),
            }
        }

        let event = EventRecord {
            id: id.clone(),
            slug: opt_str(obj, &["slug"]),
            title: opt_str(obj, &["title"]),
            market_ids: nested.iter().map(|m| m.id.clone()).collect(),
        };
        let extra = leftover(obj, &["id", "slug", "title", "markets"]);

        let mut records = vec![Record::new(source, RecordBody::Event(event)).with_extra(extra)];
        records.extend(
            nested
                .into_iter()
                .map(|m| Record::new(source, RecordBody::Market(m))),
        );
        Ok(records)
    }
}

/// CLOB `/markets` and `/sampling-markets` items (`tokens[]` array form)
#[derive(Debug, Clone, Default)]
pub struct ClobMarketMapper;

impl RecordMapper for ClobMarketMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let id = required_str(obj, &["condition_id", "conditionId"], "condition_id")?;

        let mut tokens = Vec::new();
        for token in obj.get("tokens").and_then(Value::as_array).into_iter().flatten() {
            let Some(t) = token.as_object() else { continue };
            let Some(token_id) = opt_str(t, &["token_id", "tokenId"]) else {
                continue;
            };
            tokens.push(TokenRecord {
                token_id,
                market_id: Some(id.clone()),
                outcome: opt_str(t, &["outcome"]),
                price: opt_decimal(t, &["price"]),
            });
        }

        let market = MarketRecord {
            id,
            gamma_id: None,
            question: opt_str(obj, &["question"]),
            slug: opt_str(obj, &["market_slug"]),
            event_ids: Vec::new(),
            token_ids: tokens.iter().map(|t| t.token_id.clone()).collect(),
            active: opt_bool(obj, &["active"]),
            closed: opt_bool(obj, &["closed"]),
        };
        let extra = leftover(
            obj,
            &["condition_id", "conditionId", "question", "market_slug", "tokens", "active", "closed"],
        );

        let mut records = vec![Record::new(source, RecordBody::Market(market)).with_extra(extra)];
        records.extend(
            tokens
                .into_iter()
                .map(|t| Record::new(source, RecordBody::Token(t))),
        );
        Ok(records)
    }
}

/// CLOB `/trades` and data-api `/trades` items
#[derive(Debug, Clone, Default)]
pub struct TradeMapper;

impl RecordMapper for TradeMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let trade = TradeRecord {
            id: required_str(obj, &["id", "transactionHash"], "id")?,
            market_id: opt_str(obj, &["market", "conditionId"]),
            token_id: opt_str(obj, &["asset_id", "asset"]),
            maker: opt_str(obj, &["maker_address"]),
            taker: opt_str(obj, &["taker_address", "proxyWallet", "owner"]),
            side: opt_str(obj, &["side"]),
            price: opt_decimal(obj, &["price"]),
            size: opt_decimal(obj, &["size"]),
            timestamp: opt_timestamp(obj, &["match_time", "timestamp", "created_at"]),
        };
        let extra = leftover(
            obj,
            &[
                "id",
                "transactionHash",
                "market",
                "conditionId",
                "asset_id",
                "asset",
                "maker_address",
                "taker_address",
                "proxyWallet",
                "owner",
                "side",
                "price",
                "size",
                "match_time",
                "timestamp",
                "created_at",
            ],
        );
        Ok(vec![Record::new(source, RecordBody::Trade(trade)).with_extra(extra)])
    }
}

/// CLOB `/orders` items
#[derive(Debug, Clone, Default)]
pub struct OrderMapper;

impl RecordMapper for OrderMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let order = OrderRecord {
            id: required_str(obj, &["id", "order_id", "orderID"], "id")?,
            market_id: opt_str(obj, &["market", "conditionId"]),
            token_id: opt_str(obj, &["asset_id", "asset"]),
            owner: opt_str(obj, &["maker_address", "owner"]),
            side: opt_str(obj, &["side"]),
            price: opt_decimal(obj, &["price"]),
            size: opt_decimal(obj, &["original_size", "size"]),
            status: opt_str(obj, &["status"]),
        };
        let extra = leftover(
            obj,
            &[
                "id",
                "order_id",
                "orderID",
                "market",
                "conditionId",
                "asset_id",
                "asset",
                "maker_address",
                "owner",
                "side",
                "price",
                "original_size",
                "size",
                "status",
            ],
        );
        Ok(vec![Record::new(source, RecordBody::Order(order)).with_extra(extra)])
    }
}

/// Data-api `/positions` items for one user
#[derive(Debug, Clone)]
pub struct PositionMapper {
    /// Used when an item does not name its wallet
    pub user: String,
}

impl PositionMapper {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl RecordMapper for PositionMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let position = PositionRecord {
            user: opt_str(obj, &["proxyWallet", "user"]).unwrap_or_else(|| self.user.clone()),
            token_id: required_str(obj, &["asset", "asset_id", "token_id"], "asset")?,
            market_id: opt_str(obj, &["conditionId", "market"]),
            size: opt_decimal(obj, &["size"]),
            avg_price: opt_decimal(obj, &["avgPrice", "avg_price"]),
        };
        let extra = leftover(
            obj,
            &[
                "proxyWallet",
                "user",
                "asset",
                "asset_id",
                "token_id",
                "conditionId",
                "market",
                "size",
                "avgPrice",
                "avg_price",
            ],
        );
        Ok(vec![Record::new(source, RecordBody::UserPosition(position)).with_extra(extra)])
    }
}

/// CLOB `/prices-history` points (`{"t": <unix secs>, "p": <price>}`)
#[derive(Debug, Clone)]
pub struct PriceHistoryMapper {
    pub token_id: String,
}

impl PriceHistoryMapper {
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
        }
    }
}

impl RecordMapper for PriceHistoryMapper {
    fn map(&self, item: &Value, source: &str) -> Result<Vec<Record>, MapError> {
        let obj = item.as_object().ok_or(MapError::NotAnObject)?;
        let timestamp = opt_timestamp(obj, &["t"]).ok_or(MapError::MissingField("t"))?;
        let price = opt_decimal(obj, &["p"]).ok_or(MapError::MissingField("p"))?;
        Ok(vec![Record::new(
            source,
            RecordBody::PricePoint(PricePointRecord {
                token_id: self.token_id.clone(),
                timestamp,
                price,
            }),
        )])
    }
}

fn gamma_market(obj: &Map<String, Value>) -> Result<MarketRecord, MapError> {
    let gamma_id = opt_str(obj, &["id"]);
    let id = opt_str(obj, &["conditionId", "condition_id"])
        .or_else(|| gamma_id.clone())
        .ok_or(MapError::MissingField("conditionId"))?;

    let event_ids = obj
        .get("events")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|e| e.as_object().and_then(|e| opt_str(e, &["id"])))
        .collect();

    Ok(MarketRecord {
        id,
        gamma_id,
        question: opt_str(obj, &["question"]),
        slug: opt_str(obj, &["slug"]),
        event_ids,
        token_ids: string_list(obj.get("clobTokenIds")),
        active: opt_bool(obj, &["active"]),
        closed: opt_bool(obj, &["closed"]),
    })
}

/// First present key among `keys`, as a string. Numbers are stringified.
fn opt_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn required_str(
    obj: &Map<String, Value>,
    keys: &[&str],
    name: &'static str,
) -> Result<String, MapError> {
    opt_str(obj, keys).ok_or(MapError::MissingField(name))
}

fn opt_bool(obj: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn opt_decimal(obj: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        _ => None,
    })
}

/// Unix seconds, unix milliseconds, or RFC 3339
fn opt_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(parse_timestamp))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let numeric = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    if let Some(n) = numeric {
        // Millisecond timestamps are > 1e10
        let secs = if n > 10_000_000_000 { n / 1000 } else { n };
        return Utc.timestamp_opt(secs, 0).single();
    }

    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// A list given either as a JSON array or as a JSON-encoded string
/// (`"[\"a\", \"b\"]"`, as Gamma sends `clobTokenIds`)
fn string_list(value: Option<&Value>) -> Vec<String> {
    let parsed;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

fn leftover(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntityKind;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_gamma_market_decodes_token_string() {
        let item = json!({
            "id": "12345",
            "conditionId": "0xabc",
            "question": "Will it rain?",
            "clobTokenIds": "[\"111\", \"222\"]",
            "outcomes": "[\"Yes\", \"No\"]",
            "outcomePrices": "[\"0.52\", \"0.48\"]",
            "events": [{"id": "ev1"}],
            "volume": "1000.5",
            "active": true,
            "closed": false
        });

        let records = GammaMarketMapper.map(&item, "gamma:/markets").unwrap();
        assert_eq!(records.len(), 3);

        let RecordBody::Market(ref market) = records[0].body else {
            panic!("expected market");
        };
        assert_eq!(market.id, "0xabc");
        assert_eq!(market.gamma_id.as_deref(), Some("12345"));
        assert_eq!(market.token_ids, vec!["111", "222"]);
        assert_eq!(market.event_ids, vec!["ev1"]);
        assert_eq!(records[0].extra.get("volume"), Some(&json!("1000.5")));
        assert!(records[0].extra.get("clobTokenIds").is_none());

        let RecordBody::Token(ref yes) = records[1].body else {
            panic!("expected token");
        };
        assert_eq!(yes.token_id, "111");
        assert_eq!(yes.outcome.as_deref(), Some("Yes"));
        assert_eq!(yes.price, Some(dec!(0.52)));
        assert_eq!(yes.market_id.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_gamma_market_without_ids_fails() {
        let err = GammaMarketMapper
            .map(&json!({"question": "?"}), "gamma:/markets")
            .unwrap_err();
        assert_eq!(err, MapError::MissingField("conditionId"));
    }

    #[test]
    fn test_event_links_nested_markets() {
        let item = json!({
            "id": "ev9",
            "title": "Election",
            "markets": [
                {"id": "1", "conditionId": "0x1", "clobTokenIds": "[\"a\",\"b\"]"},
                {"id": "2", "conditionId": "0x2"}
            ]
        });
        let records = EventMapper.map(&item, "gamma:/events").unwrap();
        assert_eq!(records.len(), 3);

        let RecordBody::Event(ref event) = records[0].body else {
            panic!("expected event");
        };
        assert_eq!(event.market_ids, vec!["0x1", "0x2"]);

        let RecordBody::Market(ref m) = records[1].body else {
            panic!("expected market");
        };
        assert_eq!(m.event_ids, vec!["ev9"]);
    }

    #[test]
    fn test_clob_market_tokens_array() {
        let item = json!({
            "condition_id": "0xc",
            "question": "Q",
            "tokens": [
                {"token_id": "t1", "outcome": "Yes", "price": 0.6},
                {"token_id": "t2", "outcome": "No", "price": 0.4}
            ],
            "minimum_tick_size": 0.01
        });
        let records = ClobMarketMapper.map(&item, "clob:/markets").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind(), EntityKind::Market);
        assert_eq!(records[2].primary_key(), "t2");

        let RecordBody::Token(ref t) = records[1].body else {
            panic!("expected token");
        };
        assert_eq!(t.price, Some(dec!(0.6)));
    }

    #[test]
    fn test_trade_mapper_clob_shape() {
        let item = json!({
            "id": "trade-1",
            "market": "0xm",
            "asset_id": "tok",
            "side": "BUY",
            "size": "25",
            "price": "0.55",
            "match_time": "1700000000",
            "maker_address": "0xmaker",
            "owner": "0xtaker",
            "status": "CONFIRMED"
        });
        let records = TradeMapper.map(&item, "clob:/trades").unwrap();
        let RecordBody::Trade(ref t) = records[0].body else {
            panic!("expected trade");
        };
        assert_eq!(t.market_id.as_deref(), Some("0xm"));
        assert_eq!(t.maker.as_deref(), Some("0xmaker"));
        assert_eq!(t.taker.as_deref(), Some("0xtaker"));
        assert_eq!(t.price, Some(dec!(0.55)));
        assert_eq!(t.timestamp.map(|ts| ts.timestamp()), Some(1_700_000_000));
        assert_eq!(records[0].extra.get("status"), Some(&json!("CONFIRMED")));
    }

    #[test]
    fn test_trade_mapper_data_api_shape() {
        let item = json!({
            "transactionHash": "0xhash",
            "conditionId": "0xm",
            "asset": "tok",
            "proxyWallet": "0xuser",
            "size": 3.5,
            "price": 0.25,
            "timestamp": 1700000000123i64
        });
        let records = TradeMapper.map(&item, "data:/trades").unwrap();
        let RecordBody::Trade(ref t) = records[0].body else {
            panic!("expected trade");
        };
        assert_eq!(t.id, "0xhash");
        assert_eq!(t.taker.as_deref(), Some("0xuser"));
        assert_eq!(t.size, Some(dec!(3.5)));
        assert_eq!(t.timestamp.map(|ts| ts.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn test_order_mapper_requires_id() {
        assert_eq!(
            OrderMapper.map(&json!({"market": "0xm"}), "clob:/orders").unwrap_err(),
            MapError::MissingField("id")
        );
        assert_eq!(
            OrderMapper.map(&json!("not an object"), "clob:/orders").unwrap_err(),
            MapError::NotAnObject
        );
    }

    #[test]
    fn test_position_mapper_falls_back_to_user() {
        let mapper = PositionMapper::new("0xwallet");
        let records = mapper
            .map(&json!({"asset": "tok", "conditionId": "0xm", "size": "12"}), "data:/positions")
            .unwrap();
        assert_eq!(records[0].primary_key(), "0xwallet:tok");
    }

    #[test]
    fn test_price_history_point() {
        let mapper = PriceHistoryMapper::new("tok");
        let records = mapper
            .map(&json!({"t": 1700000060, "p": 0.515}), "clob:/prices-history")
            .unwrap();
        let RecordBody::PricePoint(ref p) = records[0].body else {
            panic!("expected price point");
        };
        assert_eq!(p.price, dec!(0.515));
        assert_eq!(p.timestamp.timestamp(), 1_700_000_060);

        assert_eq!(
            mapper.map(&json!({"t": 1}), "clob:/prices-history").unwrap_err(),
            MapError::MissingField("p")
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp(&json!("2024-01-15T10:00:00Z")).map(|t| t.timestamp()),
            Some(1_705_312_800)
        );
        assert_eq!(
            parse_timestamp(&json!(1_705_312_800_000i64)).map(|t| t.timestamp()),
            Some(1_705_312_800)
        );
        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_string_list_shapes() {
        assert_eq!(string_list(Some(&json!(["a", "b"]))), vec!["a", "b"]);
        assert_eq!(string_list(Some(&json!("[\"a\"]"))), vec!["a"]);
        assert!(string_list(Some(&json!("garbage"))).is_empty());
        assert!(string_list(None).is_empty());
    }
}
