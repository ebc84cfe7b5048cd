//! Threshold rules over daily analytics metrics.
//!
//! Each rule compares one reading against a limit and, when breached, yields a
//! `TriggeredAlert`. A rule whose readings are unavailable is skipped.

use chrono::NaiveDate;
use configuration::ThresholdConfig;
use core_types::{AnalyticsSnapshot, metrics, series};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => f.write_str("MEDIUM"),
            Severity::High => f.write_str("HIGH"),
        }
    }
}

/// The current values the rules are evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricReadings {
    pub sessions_today: Option<f64>,
    pub avg_weekly_sessions: Option<f64>,
    pub bounce_rate_pct: Option<f64>,
    pub conversions_today: Option<f64>,
    pub avg_daily_conversions: Option<f64>,
}

impl MetricReadings {
    /// Derives readings for `today` from the snapshot's date-keyed series.
    ///
    /// "Today" values come from the row dated `today`; a series with no such
    /// row counts today as zero, since GA4 leaves out days without activity.
    /// Averages run over every day in the series, today included. Bounce rate
    /// is reported as a percentage.
    pub fn from_snapshot(snapshot: &AnalyticsSnapshot, today: NaiveDate) -> Self {
        let conversions = DailyMetric::read(snapshot, series::CONVERSIONS, metrics::CONVERSIONS, today);
        let sessions = DailyMetric::read(snapshot, series::DAILY, metrics::SESSIONS, today);
        let bounce = DailyMetric::read(snapshot, series::DAILY, metrics::BOUNCE_RATE, today);

        Self {
            sessions_today: sessions.map(|m| m.today),
            avg_weekly_sessions: sessions.map(|m| m.average),
            bounce_rate_pct: bounce.map(|m| m.today * 100.0),
            conversions_today: conversions.map(|m| m.today),
            avg_daily_conversions: conversions.map(|m| m.average),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DailyMetric {
    today: f64,
    average: f64,
}

impl DailyMetric {
    /// `None` when the snapshot does not carry the series at all.
    fn read(snapshot: &AnalyticsSnapshot, name: &str, metric: &str, today: NaiveDate) -> Option<Self> {
        let series = snapshot.series(name)?;
        let today_value = series.row_on(today).and_then(|row| row.metric(metric));

        let mut values = series.values(metric);
        if today_value.is_none() {
            values.push(0.0);
        }
        let average = values.iter().sum::<f64>() / values.len() as f64;

        Some(Self {
            today: today_value.unwrap_or(0.0),
            average,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdRule {
    /// Today's sessions below `ratio` times the weekly average.
    TrafficDrop { ratio: f64 },
    /// Bounce rate above `max_pct` percent.
    HighBounceRate { max_pct: f64 },
    /// No conversions today.
    ZeroConversions,
    /// Today's conversions above `ratio` times the daily average.
    ConversionSpike { ratio: f64 },
}

/// A rule that fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub alert: String,
    pub severity: Severity,
    pub value: f64,
    pub message: String,
}

impl TriggeredAlert {
    pub fn subject(&self) -> String {
        format!("[GA4 Alert] {} - {}", self.alert, self.severity)
    }
}

impl ThresholdRule {
    /// The standard rule set with limits from the configuration.
    pub fn defaults(config: &ThresholdConfig) -> Vec<ThresholdRule> {
        vec![
            ThresholdRule::TrafficDrop { ratio: config.traffic_drop_ratio },
            ThresholdRule::HighBounceRate { max_pct: config.max_bounce_rate_pct },
            ThresholdRule::ZeroConversions,
            ThresholdRule::ConversionSpike { ratio: config.conversion_spike_ratio },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThresholdRule::TrafficDrop { .. } => "Traffic Drop Alert",
            ThresholdRule::HighBounceRate { .. } => "High Bounce Rate Alert",
            ThresholdRule::ZeroConversions => "Zero Conversions Alert",
            ThresholdRule::ConversionSpike { .. } => "Conversion Spike Alert",
        }
    }

    pub fn check(&self, readings: &MetricReadings) -> Option<TriggeredAlert> {
        let (severity, value, message) = match *self {
            ThresholdRule::TrafficDrop { ratio } => {
                let today = readings.sessions_today?;
                let average = readings.avg_weekly_sessions?;
                if today >= average * ratio {
                    return None;
                }
                (Severity::High, today, format!("Traffic drop detected. Sessions: {} (weekly average {:.2})", today, average))
            }
            ThresholdRule::HighBounceRate { max_pct } => {
                let rate = readings.bounce_rate_pct?;
                if rate <= max_pct {
                    return None;
                }
                (Severity::Medium, rate, format!("High bounce rate: {}%", rate))
            }
            ThresholdRule::ZeroConversions => {
                let today = readings.conversions_today?;
                if today != 0.0 {
                    return None;
                }
                (Severity::High, 0.0, "No conversions recorded today".to_string())
            }
            ThresholdRule::ConversionSpike { ratio } => {
                let today = readings.conversions_today?;
                let average = readings.avg_daily_conversions?;
                if average <= 0.0 || today <= average * ratio {
                    return None;
                }
                (Severity::Medium, today, format!("Conversion spike: {} today (daily average {:.2})", today, average))
            }
        };

        Some(TriggeredAlert {
            alert: self.name().to_string(),
            severity,
            value,
            message,
        })
    }
}

/// Evaluates every rule, returning the ones that fired in rule order.
pub fn evaluate(rules: &[ThresholdRule], readings: &MetricReadings) -> Vec<TriggeredAlert> {
    rules.iter().filter_map(|rule| rule.check(readings)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{DATE_DIMENSION, MetricRow, MetricSeries};

    fn rules() -> Vec<ThresholdRule> {
        ThresholdRule::defaults(&ThresholdConfig::default())
    }

    #[test]
    fn healthy_readings_trigger_nothing() {
        let readings = MetricReadings {
            sessions_today: Some(125.0),
            avg_weekly_sessions: Some(120.0),
            bounce_rate_pct: Some(35.0),
            conversions_today: Some(5.0),
            avg_daily_conversions: Some(5.0),
        };
        assert!(evaluate(&rules(), &readings).is_empty());
    }

    #[test]
    fn traffic_below_seventy_percent_of_average_fires() {
        let readings = MetricReadings {
            sessions_today: Some(60.0),
            avg_weekly_sessions: Some(100.0),
            ..MetricReadings::default()
        };
        let fired = evaluate(&rules(), &readings);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert, "Traffic Drop Alert");
        assert_eq!(fired[0].severity, Severity::High);
        assert_eq!(fired[0].subject(), "[GA4 Alert] Traffic Drop Alert - HIGH");
    }

    #[test]
    fn bounce_rate_limit_is_exclusive() {
        let at_limit = MetricReadings { bounce_rate_pct: Some(60.0), ..MetricReadings::default() };
        let above = MetricReadings { bounce_rate_pct: Some(61.0), ..MetricReadings::default() };
        assert!(evaluate(&rules(), &at_limit).is_empty());
        assert_eq!(evaluate(&rules(), &above)[0].severity, Severity::Medium);
    }

    #[test]
    fn zero_conversions_fires_without_a_spike() {
        let readings = MetricReadings {
            conversions_today: Some(0.0),
            avg_daily_conversions: Some(4.0),
            ..MetricReadings::default()
        };
        let fired = evaluate(&rules(), &readings);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert, "Zero Conversions Alert");
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn conversions_on(days: &[(&str, f64)]) -> MetricSeries {
        MetricSeries::new(
            days.iter()
                .map(|(date, v)| MetricRow::new().with_dimension(DATE_DIMENSION, *date).with_metric(metrics::CONVERSIONS, *v))
                .collect(),
        )
    }

    #[test]
    fn readings_come_from_todays_row() {
        let snapshot = AnalyticsSnapshot::new(Utc::now()).with_series(
            series::CONVERSIONS,
            conversions_on(&[("20250309", 12.0), ("20250307", 3.0), ("20250308", 3.0)]),
        );

        let readings = MetricReadings::from_snapshot(&snapshot, day(9));
        assert_eq!(readings.conversions_today, Some(12.0));
        assert_eq!(readings.avg_daily_conversions, Some(6.0));
        assert_eq!(readings.sessions_today, None);

        let fired = evaluate(&rules(), &readings);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert, "Conversion Spike Alert");
    }

    #[test]
    fn a_day_missing_from_the_report_counts_as_zero_conversions() {
        let snapshot = AnalyticsSnapshot::new(Utc::now()).with_series(
            series::CONVERSIONS,
            conversions_on(&[("20250307", 4.0), ("20250308", 8.0)]),
        );

        let readings = MetricReadings::from_snapshot(&snapshot, day(9));
        assert_eq!(readings.conversions_today, Some(0.0));
        assert_eq!(readings.avg_daily_conversions, Some(4.0));

        let fired = evaluate(&rules(), &readings);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert, "Zero Conversions Alert");
    }

    #[test]
    fn daily_sessions_and_bounce_rate_feed_the_traffic_rules() {
        let daily = MetricSeries::new(
            [("20250306", 100.0, 0.30), ("20250307", 110.0, 0.35), ("20250308", 120.0, 0.40), ("20250309", 30.0, 0.75)]
                .iter()
                .map(|(date, sessions, bounce)| {
                    MetricRow::new()
                        .with_dimension(DATE_DIMENSION, *date)
                        .with_metric(metrics::SESSIONS, *sessions)
                        .with_metric(metrics::BOUNCE_RATE, *bounce)
                })
                .collect(),
        );
        let snapshot = AnalyticsSnapshot::new(Utc::now())
            .with_series(series::DAILY, daily)
            .with_series(series::CONVERSIONS, conversions_on(&[("20250308", 2.0), ("20250309", 2.0)]));

        let readings = MetricReadings::from_snapshot(&snapshot, day(9));
        assert_eq!(readings.sessions_today, Some(30.0));
        assert_eq!(readings.avg_weekly_sessions, Some(90.0));
        assert_eq!(readings.bounce_rate_pct, Some(75.0));

        let names: Vec<_> = evaluate(&rules(), &readings).into_iter().map(|a| a.alert).collect();
        assert_eq!(names, vec!["Traffic Drop Alert", "High Bounce Rate Alert"]);
    }
}
