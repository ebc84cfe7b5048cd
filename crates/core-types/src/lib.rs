//! # Forecaster Core Types
//!
//! The shared vocabulary of the forecast service: the analytics data fetched on
//! every cycle, the forecast derived from it, and the alert kinds a cycle can raise.
//!
//! This crate has no workspace dependencies; every other crate builds on it.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AlertKind, ConfidenceLevel};
pub use error::CoreError;
pub use structs::{
    AnalyticsSnapshot, DATE_DIMENSION, Forecast, MetricRow, MetricSeries, metrics, series,
};
