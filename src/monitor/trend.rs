//! Short-run trend detection
//!
//! Each token keeps its last [`TREND_WINDOW`] prices. When at least
//! [`MIN_TREND_CHANGES`] of the moves in a full window exist and 80% or more
//! of them point the same way, a trend alert is raised and the window
//! restarts from the latest sample.

use super::tracker::{Alert, AlertKind, PriceSample, Severity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

pub const TREND_WINDOW: usize = 5;
pub const MIN_TREND_CHANGES: usize = 3;
const MIN_TREND_STRENGTH: Decimal = dec!(0.8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the moves across a run of prices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Share of moves in `direction`, 0.5 to 1
    pub strength: Decimal,
    pub rises: usize,
    pub falls: usize,
}

impl Trend {
    /// None when no price moved. A tie counts as down.
    pub fn detect(prices: &[Decimal]) -> Option<Self> {
        let (mut rises, mut falls) = (0usize, 0usize);
        for pair in prices.windows(2) {
            match pair[1].cmp(&pair[0]) {
                Ordering::Greater => rises += 1,
                Ordering::Less => falls += 1,
                Ordering::Equal => {}
            }
        }

        let changes = rises + falls;
        if changes == 0 {
            return None;
        }
        let (direction, dominant) = if rises > falls {
            (TrendDirection::Up, rises)
        } else {
            (TrendDirection::Down, falls)
        };
        Some(Self {
            direction,
            strength: Decimal::from(dominant) / Decimal::from(changes),
            rises,
            falls,
        })
    }

    pub fn is_significant(&self) -> bool {
        self.rises + self.falls >= MIN_TREND_CHANGES && self.strength >= MIN_TREND_STRENGTH
    }
}

/// Rolling price windows for every token being watched
#[derive(Debug, Default)]
pub struct TrendTracker {
    windows: HashMap<String, VecDeque<(DateTime<Utc>, Decimal)>>,
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prices currently in the token's window, oldest first
    pub fn window(&self, token_id: &str) -> Vec<Decimal> {
        self.windows
            .get(token_id)
            .map(|w| w.iter().map(|(_, price)| *price).collect())
            .unwrap_or_default()
    }

    /// Add one sample. Samples not newer than the previous one are ignored.
    pub fn observe(&mut self, sample: &PriceSample) -> Option<Alert> {
        let window = self.windows.entry(sample.token_id.clone()).or_default();
        if window
            .back()
            .is_some_and(|(at, _)| sample.observed_at <= *at)
        {
            return None;
        }

        window.push_back((sample.observed_at, sample.price));
        if window.len() > TREND_WINDOW {
            window.pop_front();
        }
        if window.len() < TREND_WINDOW {
            return None;
        }

        let prices: Vec<Decimal> = window.iter().map(|(_, price)| *price).collect();
        let trend = Trend::detect(&prices).filter(Trend::is_significant)?;
        let (start_at, start_price) = window.front().copied()?;

        let pct_change = if start_price.is_zero() {
            Decimal::ZERO
        } else {
            (sample.price - start_price).abs() / start_price
        };
        let alert = Alert {
            id: Uuid::new_v4(),
            token_id: sample.token_id.clone(),
            old_price: start_price,
            new_price: sample.price,
            pct_change,
            severity: Severity::classify(pct_change),
            baseline_at: start_at,
            triggered_at: sample.observed_at,
            kind: AlertKind::Trend {
                direction: trend.direction,
                strength: trend.strength,
            },
        };

        let keep_from = window.len() - 1;
        window.drain(..keep_from);
        Some(alert)
    }
}
