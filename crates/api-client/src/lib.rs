use crate::auth::bearer_headers;
use crate::error::ApiError;
use crate::requests::{ReportDefinition, Segment};
use async_trait::async_trait;
use chrono::{Days, Utc};
use chrono_tz::Tz;
use configuration::AnalyticsConfig;
use core_types::{AnalyticsSnapshot, MetricSeries};
use reqwest::header::HeaderMap;

mod auth;
pub mod error;
pub mod requests;
pub mod responses;
// --- Public API ---
pub use responses::{ApiErrorResponse, RunReportResponse};

/// The abstract source of analytics data for a forecast cycle.
/// The pipeline depends only on this trait, so the GA4 client can be swapped
/// for a fake in tests or for another provider.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Fetches the named metric series covering the trailing `days_back` days.
    ///
    /// Either every report succeeds and a complete snapshot is returned, or
    /// the call fails; a partial snapshot is never produced. Series keyed by
    /// date hold one row per day of the window, today included, even for
    /// days with no activity.
    async fn fetch_analytics(
        &self,
        property_id: &str,
        days_back: u32,
    ) -> Result<AnalyticsSnapshot, ApiError>;
}

/// A concrete implementation of `AnalyticsSource` for the GA4 Data API.
#[derive(Clone)]
pub struct Ga4Client {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    conversion_event: String,
    segment: Segment,
    /// The property's reporting timezone, which decides what "today" is.
    timezone: Tz,
}

impl Ga4Client {
    /// Credentials are checked on each fetch, so a client without a token
    /// can still be built and fails its cycles instead of the process.
    pub fn new(config: &AnalyticsConfig, timezone: Tz) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            conversion_event: config.conversion_event.clone(),
            segment: config.segment.parse()?,
            timezone,
        })
    }

    /// Runs one report and converts it into a snapshot series.
    async fn run_report(
        &self,
        property_id: &str,
        auth: &HeaderMap,
        report: ReportDefinition,
    ) -> Result<MetricSeries, ApiError> {
        let url = format!("{}/properties/{}:runReport", self.base_url, property_id);

        let response = self
            .client
            .post(&url)
            .headers(auth.clone())
            .json(&report.request)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| format!("{} {}", e.error.status, e.error.message))
                .unwrap_or(text);
            return Err(ApiError::Provider(status.as_u16(), message));
        }

        let parsed: RunReportResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let series = parsed.into_series(&report.metric_aliases)?;

        tracing::debug!(series = report.series, rows = series.len(), "Report received.");
        Ok(series)
    }
}

#[async_trait]
impl AnalyticsSource for Ga4Client {
    async fn fetch_analytics(
        &self,
        property_id: &str,
        days_back: u32,
    ) -> Result<AnalyticsSnapshot, ApiError> {
        if property_id.trim().is_empty() {
            return Err(ApiError::NotConfigured("missing GA4 property id".to_string()));
        }
        let auth = bearer_headers(&self.access_token)?;

        // GA4 omits days without activity, so date-keyed series are padded
        // to the full `daysAgo..today` window in the property's timezone.
        let captured_at = Utc::now();
        let today = captured_at.with_timezone(&self.timezone).date_naive();
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .ok_or_else(|| ApiError::NotConfigured(format!("lookback of {} days is out of range", days_back)))?;

        let conversions = requests::conversion_report(days_back, &self.conversion_event);
        let daily = requests::daily_report(days_back);
        let traffic = requests::traffic_report(days_back);
        let segments = requests::segments_report(days_back, &self.segment, &self.conversion_event);
        let names = (conversions.series, daily.series, traffic.series, segments.series);
        let conversion_metrics = conversions.metric_names();
        let daily_metrics = daily.metric_names();

        // All four reports must succeed; the first failure aborts the fetch.
        let (conversions, daily, traffic, segments) = tokio::try_join!(
            self.run_report(property_id, &auth, conversions),
            self.run_report(property_id, &auth, daily),
            self.run_report(property_id, &auth, traffic),
            self.run_report(property_id, &auth, segments),
        )?;

        Ok(AnalyticsSnapshot::new(captured_at)
            .with_series(names.0, conversions.fill_days(first_day, today, &conversion_metrics))
            .with_series(names.1, daily.fill_days(first_day, today, &daily_metrics))
            .with_series(names.2, traffic)
            .with_series(names.3, segments))
    }
}
