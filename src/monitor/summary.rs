//! End-of-run monitoring report

use super::tracker::{Alert, PriceSample};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Running statistics for one token
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenStats {
    pub samples: u64,
    pub failures: u64,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub alerts: u64,
    /// Tick-to-tick returns seen (zero previous prices excluded)
    #[serde(skip)]
    returns: u64,
    #[serde(skip)]
    mean_return: f64,
    #[serde(skip)]
    m2: f64,
}

impl TokenStats {
    pub fn record_sample(&mut self, price: Decimal) {
        if let Some(prev) = self.last_price {
            if !prev.is_zero() {
                if let Some(r) = ((price - prev) / prev).to_f64() {
                    // Welford update
                    self.returns += 1;
                    let delta = r - self.mean_return;
                    self.mean_return += delta / self.returns as f64;
                    self.m2 += delta * (r - self.mean_return);
                }
            }
        }

        self.samples += 1;
        self.min_price = Some(self.min_price.map_or(price, |m| m.min(price)));
        self.max_price = Some(self.max_price.map_or(price, |m| m.max(price)));
        self.last_price = Some(price);
    }

    /// Population standard deviation of tick-to-tick returns; 0 with fewer
    /// than one return
    pub fn volatility(&self) -> f64 {
        if self.returns == 0 {
            0.0
        } else {
            (self.m2 / self.returns as f64).sqrt()
        }
    }
}

/// Report produced when the monitor stops
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ticks: u64,
    pub tokens: BTreeMap<String, TokenStats>,
}

impl MonitorSummary {
    pub fn new(tokens: &[String]) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            ticks: 0,
            tokens: tokens
                .iter()
                .map(|t| (t.clone(), TokenStats::default()))
                .collect(),
        }
    }

    pub fn record_sample(&mut self, sample: &PriceSample) {
        self.tokens
            .entry(sample.token_id.clone())
            .or_default()
            .record_sample(sample.price);
    }

    pub fn record_failure(&mut self, token_id: &str) {
        self.tokens.entry(token_id.to_string()).or_default().failures += 1;
    }

    pub fn record_alert(&mut self, alert: &Alert) {
        self.tokens.entry(alert.token_id.clone()).or_default().alerts += 1;
    }

    pub fn total_alerts(&self) -> u64 {
        self.tokens.values().map(|s| s.alerts).sum()
    }

    pub fn total_samples(&self) -> u64 {
        self.tokens.values().map(|s| s.samples).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_min_max_last() {
        let mut stats = TokenStats::default();
        for p in [dec!(0.5), dec!(0.7), dec!(0.4), dec!(0.6)] {
            stats.record_sample(p);
        }
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.min_price, Some(dec!(0.4)));
        assert_eq!(stats.max_price, Some(dec!(0.7)));
        assert_eq!(stats.last_price, Some(dec!(0.6)));
    }

    #[test]
    fn test_volatility_of_returns() {
        let mut stats = TokenStats::default();
        assert_eq!(stats.volatility(), 0.0);

        // Returns +10%, -10%: mean 0, population std-dev 0.1
        for p in [dec!(1.0), dec!(1.1), dec!(0.99)] {
            stats.record_sample(p);
        }
        assert!((stats.volatility() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_skips_zero_previous_price() {
        let mut stats = TokenStats::default();
        for p in [dec!(0), dec!(1.0), dec!(1.0)] {
            stats.record_sample(p);
        }
        // Only the 1.0 -> 1.0 return counts
        assert_eq!(stats.volatility(), 0.0);
        assert_eq!(stats.samples, 3);
    }

    #[test]
    fn test_constant_prices_have_zero_volatility() {
        let mut stats = TokenStats::default();
        for _ in 0..5 {
            stats.record_sample(dec!(0.42));
        }
        assert_eq!(stats.volatility(), 0.0);
    }
}
