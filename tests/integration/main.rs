//! Integration tests for poly-harvest

mod collector_test;
mod common;
mod fetch_test;
mod monitor_test;
mod relations_test;
