//! poly-harvest: Data collector and price monitor for Polymarket
//!
//! This library provides the core components for:
//! - Rate-limited, retrying access to the Gamma, CLOB and data APIs
//! - Checkpointed pagination that resumes without gaps or duplicates
//! - Mapping of API responses into typed records
//! - Interval price monitoring with threshold alerts
//! - An incrementally maintained entity relationship graph
//! - Local JSONL storage of collected records
//! - Structured logging and Prometheus metrics

pub mod checkpoint;
pub mod cli;
pub mod collector;
pub mod config;
pub mod data;
pub mod fetch;
pub mod monitor;
pub mod record;
pub mod relations;
pub mod schedule;
pub mod telemetry;
