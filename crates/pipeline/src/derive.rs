//! Turns a fetched analytics snapshot into a one-day-ahead forecast.

use crate::error::DeriveError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use core_types::{AnalyticsSnapshot, ConfidenceLevel, Forecast, metrics, series};

/// Derives the forecast for the day after `now`'s local date in `tz`.
///
/// Each prediction is the mean of its series, rounded to two decimals. A
/// missing or empty series predicts 0. `data_points_used` counts the
/// conversion records.
pub fn derive_forecast(
    snapshot: &AnalyticsSnapshot,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Forecast, DeriveError> {
    let conversions = snapshot.metric_values(series::CONVERSIONS, metrics::CONVERSIONS);
    let sessions = snapshot.metric_values(series::TRAFFIC, metrics::SESSIONS);

    let predicted_conversions = round_to_cents(mean(series::CONVERSIONS, &conversions)?);
    let predicted_sessions = round_to_cents(mean(series::TRAFFIC, &sessions)?);

    let generated_at = now.with_timezone(&tz).fixed_offset();

    let forecast = Forecast::new(
        generated_at,
        predicted_conversions,
        predicted_sessions,
        ConfidenceLevel::Medium,
        conversions.len(),
    )?;
    Ok(forecast)
}

fn mean(series: &'static str, values: &[f64]) -> Result<f64, DeriveError> {
    if let Some(&value) = values.iter().find(|v| !v.is_finite()) {
        return Err(DeriveError::NonFinite { series, value });
    }
    if values.is_empty() {
        return Ok(0.0);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
