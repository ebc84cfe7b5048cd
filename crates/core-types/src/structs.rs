use crate::enums::ConfidenceLevel;
use crate::error::CoreError;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names of the series carried by an `AnalyticsSnapshot`.
pub mod series {
    pub const CONVERSIONS: &str = "conversions";
    pub const TRAFFIC: &str = "traffic";
    pub const SEGMENTS: &str = "segments";
    /// Sessions and bounce rate, one row per day.
    pub const DAILY: &str = "daily";
}

/// Names of the metrics the forecast is derived from.
pub mod metrics {
    pub const CONVERSIONS: &str = "conversions";
    pub const SESSIONS: &str = "sessions";
    pub const USERS: &str = "users";
    /// Share of sessions that bounced, as a fraction between 0 and 1.
    pub const BOUNCE_RATE: &str = "bounce_rate";
}

/// The dimension naming the day of a daily row, formatted as `YYYYMMDD`.
pub const DATE_DIMENSION: &str = "date";
const DATE_FORMAT: &str = "%Y%m%d";

/// A single report row: dimension values plus metric values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub dimensions: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

impl MetricRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions.get(name).map(String::as_str)
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// An ordered list of report rows, e.g. one row per day or per traffic source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub rows: Vec<MetricRow>,
}

impl MetricSeries {
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows }
    }

    /// Builds a series with one row per value, each carrying only `metric`.
    pub fn from_values(metric: &str, values: &[f64]) -> Self {
        Self {
            rows: values
                .iter()
                .map(|v| MetricRow::new().with_metric(metric, *v))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns exactly one row per day from `first` to `last` inclusive, oldest
    /// first. A day without a row gets one with every metric in `metrics` set
    /// to zero; rows dated outside the range, or not dated at all, are dropped.
    pub fn fill_days(self, first: NaiveDate, last: NaiveDate, metrics: &[&str]) -> Self {
        let mut by_day: BTreeMap<String, MetricRow> = self
            .rows
            .into_iter()
            .filter_map(|row| {
                let day = row.dimension(DATE_DIMENSION)?.to_string();
                Some((day, row))
            })
            .collect();

        let rows = first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| {
                let key = day.format(DATE_FORMAT).to_string();
                by_day.remove(&key).unwrap_or_else(|| {
                    metrics.iter().fold(
                        MetricRow::new().with_dimension(DATE_DIMENSION, key),
                        |row, metric| row.with_metric(*metric, 0.0),
                    )
                })
            })
            .collect();
        Self { rows }
    }

    /// The row dated `day`, if any.
    pub fn row_on(&self, day: NaiveDate) -> Option<&MetricRow> {
        let key = day.format(DATE_FORMAT).to_string();
        self.rows
            .iter()
            .find(|row| row.dimension(DATE_DIMENSION) == Some(key.as_str()))
    }

    /// The value of `metric` in every row. Rows without the metric count as zero.
    pub fn values(&self, metric: &str) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.metric(metric).unwrap_or(0.0))
            .collect()
    }
}

/// The raw analytics data fetched for one cycle.
///
/// Produced fresh by every fetch and owned by the cycle that fetched it; it is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub series: BTreeMap<String, MetricSeries>,
}

impl AnalyticsSnapshot {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            series: BTreeMap::new(),
        }
    }

    pub fn with_series(mut self, name: impl Into<String>, series: MetricSeries) -> Self {
        self.series.insert(name.into(), series);
        self
    }

    pub fn series(&self, name: &str) -> Option<&MetricSeries> {
        self.series.get(name)
    }

    /// The values of `metric` across the named series; empty when the series is missing.
    pub fn metric_values(&self, series: &str, metric: &str) -> Vec<f64> {
        self.series(series)
            .map(|s| s.values(metric))
            .unwrap_or_default()
    }

    /// Total number of rows across all series.
    pub fn record_count(&self) -> usize {
        self.series.values().map(MetricSeries::len).sum()
    }
}

/// A one-day-ahead forecast, persisted once as a snapshot file and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// The calendar date the forecast applies to: the day after `generated_at`.
    pub forecast_date: NaiveDate,
    pub predicted_conversions: f64,
    pub predicted_sessions: f64,
    pub confidence_level: ConfidenceLevel,
    /// Number of conversion records the prediction was computed from.
    pub data_points_used: usize,
    /// Derivation instant, expressed in the pipeline's configured timezone.
    pub generated_at: DateTime<FixedOffset>,
}

impl Forecast {
    /// Creates a forecast for the day after `generated_at`'s local date.
    ///
    /// Predictions must be finite and non-negative.
    pub fn new(
        generated_at: DateTime<FixedOffset>,
        predicted_conversions: f64,
        predicted_sessions: f64,
        confidence_level: ConfidenceLevel,
        data_points_used: usize,
    ) -> Result<Self, CoreError> {
        check_prediction("predicted_conversions", predicted_conversions)?;
        check_prediction("predicted_sessions", predicted_sessions)?;

        let forecast_date = generated_at.date_naive().succ_opt().ok_or_else(|| {
            CoreError::Calculation(format!(
                "no calendar day follows {}",
                generated_at.date_naive()
            ))
        })?;

        Ok(Self {
            forecast_date,
            predicted_conversions,
            predicted_sessions,
            confidence_level,
            data_points_used,
            generated_at,
        })
    }
}

fn check_prediction(field: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::InvalidInput(field.to_string(), value.to_string()));
    }
    Ok(())
}
