//! Price fluctuation monitoring
//!
//! Samples each token's midpoint on a fixed interval and compares it with a
//! per-token baseline. A move of at least the threshold raises an [`Alert`]
//! and re-anchors the baseline at the new price, so one large move produces
//! one alert rather than one per tick. A separate rolling window per token
//! raises trend alerts when several consecutive samples move the same way.

mod alert_log;
mod runner;
mod summary;
mod tracker;
mod trend;

pub use alert_log::{AlertLog, ALERT_LOG_FILE};
pub use runner::{FluctuationMonitor, MonitorHandle, MonitorSettings, SampleError};
pub use summary::{MonitorSummary, TokenStats};
pub use tracker::{Alert, AlertKind, Baseline, BaselineTracker, Observation, PriceSample, Severity};
pub use trend::{Trend, TrendDirection, TrendTracker, MIN_TREND_CHANGES, TREND_WINDOW};
