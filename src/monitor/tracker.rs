//! Per-token baseline state machine
//!
//! ```text
//! UNOBSERVED --sample--> BASELINED --below threshold--> BASELINED
//!                        BASELINED --at/above threshold--> ALERTED -> BASELINED (re-anchored)
//! ```

use super::trend::TrendDirection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub token_id: String,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(token_id: impl Into<String>, price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            token_id: token_id.into(),
            price,
            observed_at,
        }
    }
}

/// Reference price the next sample is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub token_id: String,
    pub reference_price: Decimal,
    pub reference_at: DateTime<Utc>,
}

/// Alert severity by absolute fractional move
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// `pct_change` is a fraction (0.12 = 12%)
    pub fn classify(pct_change: Decimal) -> Self {
        let pct = pct_change.abs();
        if pct >= dec!(0.20) {
            Severity::Critical
        } else if pct >= dec!(0.10) {
            Severity::High
        } else if pct >= dec!(0.05) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    /// Move from the baseline reached the threshold
    #[default]
    Threshold,
    /// A full window of samples moved mostly one way
    Trend {
        direction: TrendDirection,
        strength: Decimal,
    },
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Threshold => f.write_str("move"),
            AlertKind::Trend { direction, .. } => write!(f, "trend {}", direction),
        }
    }
}

/// A threshold crossing or a trend; immutable once raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub token_id: String,
    /// Baseline price the move is measured from
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// `|new - old| / old`
    pub pct_change: Decimal,
    pub severity: Severity,
    /// When the baseline was set; always before `triggered_at`
    pub baseline_at: DateTime<Utc>,
    pub triggered_at: DateTime<Utc>,
    #[serde(default)]
    pub kind: AlertKind,
}

impl Alert {
    /// Price went up
    pub fn is_rise(&self) -> bool {
        self.new_price > self.old_price
    }
}

/// What a sample did to its token's state
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First sample for the token
    Baselined,
    /// Below threshold; baseline untouched
    Unchanged { pct_change: Decimal },
    /// Threshold crossed; baseline moved to the alerting price
    Alerted(Alert),
    /// Baseline is zero so no percentage exists; baseline moved to the sample
    ZeroReference,
    /// Sample is not newer than the baseline; ignored
    Stale,
}

/// Baselines for every token being watched
#[derive(Debug, Default)]
pub struct BaselineTracker {
    baselines: HashMap<String, Baseline>,
}

impl BaselineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(&self, token_id: &str) -> Option<&Baseline> {
        self.baselines.get(token_id)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    /// Feed one sample through the token's state machine
    pub fn observe(&mut self, sample: &PriceSample, threshold: Decimal) -> Observation {
        let Some(baseline) = self.baselines.get_mut(&sample.token_id) else {
            self.baselines.insert(
                sample.token_id.clone(),
                Baseline {
                    token_id: sample.token_id.clone(),
                    reference_price: sample.price,
                    reference_at: sample.observed_at,
                },
            );
            return Observation::Baselined;
        };

        if sample.observed_at <= baseline.reference_at {
            return Observation::Stale;
        }

        if baseline.reference_price.is_zero() {
            baseline.reference_price = sample.price;
            baseline.reference_at = sample.observed_at;
            return Observation::ZeroReference;
        }

        let pct_change = (sample.price - baseline.reference_price).abs() / baseline.reference_price;
        if pct_change < threshold {
            return Observation::Unchanged { pct_change };
        }

        let alert = Alert {
            id: Uuid::new_v4(),
            token_id: sample.token_id.clone(),
            old_price: baseline.reference_price,
            new_price: sample.price,
            pct_change,
            severity: Severity::classify(pct_change),
            baseline_at: baseline.reference_at,
            triggered_at: sample.observed_at,
            kind: AlertKind::Threshold,
        };
        baseline.reference_price = sample.price;
        baseline.reference_at = sample.observed_at;
        Observation::Alerted(alert)
    }
}
