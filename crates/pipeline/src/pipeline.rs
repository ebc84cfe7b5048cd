use crate::clock::{Clock, SystemClock};
use crate::derive::derive_forecast;
use crate::error::CycleError;
use alerter::AlertSink;
use api_client::AnalyticsSource;
use chrono_tz::Tz;
use configuration::Config;
use core_types::{AlertKind, AnalyticsSnapshot, Forecast};
use forecast_store::{PruneReport, RetentionManager, SnapshotId, SnapshotStore};
use std::sync::Arc;
use std::time::Duration;

/// The typed inputs of a forecast cycle.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub property_id: String,
    pub lookback_days: u32,
    /// Total fetch attempts, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timezone: Tz,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            property_id: config.analytics.property_id.clone(),
            lookback_days: config.analytics.lookback_days,
            max_retries: config.pipeline.max_retries,
            retry_delay: config.pipeline.retry_delay(),
            timezone: config.pipeline.timezone,
        }
    }
}

/// The result of a successful cycle.
#[derive(Debug, Clone)]
pub struct CycleSuccess {
    pub snapshot: SnapshotId,
    pub forecast: Forecast,
    pub fetch_attempts: u32,
    /// `None` when retention could not list the store; the write still stands.
    pub pruned: Option<PruneReport>,
}

/// Fetches, derives and persists one forecast per call to `run_cycle`.
pub struct ForecastPipeline {
    settings: PipelineSettings,
    source: Arc<dyn AnalyticsSource>,
    store: Arc<dyn SnapshotStore>,
    alerter: Arc<dyn AlertSink>,
    retention: RetentionManager,
    clock: Arc<dyn Clock>,
}

impl ForecastPipeline {
    pub fn new(
        settings: PipelineSettings,
        source: Arc<dyn AnalyticsSource>,
        store: Arc<dyn SnapshotStore>,
        alerter: Arc<dyn AlertSink>,
        retention: RetentionManager,
    ) -> Self {
        Self {
            settings,
            source,
            store,
            alerter,
            retention,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the wall clock used to stamp forecasts.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Runs one fetch, derive, persist cycle and raises exactly one alert
    /// describing its outcome.
    pub async fn run_cycle(&self) -> Result<CycleSuccess, CycleError> {
        tracing::info!(
            property_id = %self.settings.property_id,
            lookback_days = self.settings.lookback_days,
            "[CYCLE] Starting forecast cycle."
        );

        let outcome = self.execute().await;

        match &outcome {
            Ok(success) => {
                tracing::info!(
                    snapshot = %success.snapshot,
                    forecast_date = %success.forecast.forecast_date,
                    "[CYCLE] Forecast cycle completed."
                );
                let message = format!(
                    "New forecast saved: {}\nForecast for {}: {} conversions, {} sessions ({} data points).",
                    success.snapshot,
                    success.forecast.forecast_date,
                    success.forecast.predicted_conversions,
                    success.forecast.predicted_sessions,
                    success.forecast.data_points_used,
                );
                self.notify(AlertKind::ForecastUpdated, "Forecast Updated", &message).await;
            }
            Err(e) => {
                tracing::error!(error = %e, kind = %e.alert_kind(), "[CYCLE] Forecast cycle failed.");
                let subject = match e.alert_kind() {
                    AlertKind::FetchFailed => "Forecast Fetch Failed",
                    AlertKind::PersistFailed => "Forecast Persist Failed",
                    _ => "Forecast Cycle Failed",
                };
                self.notify(e.alert_kind(), subject, &e.to_string()).await;
            }
        }

        outcome
    }

    async fn execute(&self) -> Result<CycleSuccess, CycleError> {
        let (snapshot, fetch_attempts) = self.fetch_with_retry().await?;

        tracing::info!("[DERIVE] Deriving forecast.");
        let forecast = derive_forecast(&snapshot, self.clock.now(), self.settings.timezone)?;
        tracing::info!(
            predicted_conversions = forecast.predicted_conversions,
            predicted_sessions = forecast.predicted_sessions,
            data_points_used = forecast.data_points_used,
            "[DERIVE] Forecast derived."
        );

        tracing::info!("[PERSIST] Writing forecast snapshot.");
        let id = self.store.write(&forecast).await.map_err(CycleError::Persist)?;
        tracing::info!(snapshot = %id, "[PERSIST] Forecast snapshot written.");

        let pruned = match self.retention.prune_after_write(self.store.as_ref(), &id).await {
            Ok(report) => {
                tracing::info!(
                    removed = report.removed.len(),
                    failed = report.failed.len(),
                    retained = report.retained,
                    "[CLEANUP] Retention pass finished."
                );
                Some(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "[CLEANUP] Could not list snapshots; retention skipped.");
                None
            }
        };

        Ok(CycleSuccess {
            snapshot: id,
            forecast,
            fetch_attempts,
            pruned,
        })
    }

    /// Calls the analytics source up to `max_retries` times, sleeping
    /// `retry_delay` between attempts but not after the last one.
    async fn fetch_with_retry(&self) -> Result<(AnalyticsSnapshot, u32), CycleError> {
        let max_attempts = self.settings.max_retries.max(1);
        let mut attempt = 1;

        loop {
            tracing::info!(attempt, max_attempts, "[FETCH] Fetching analytics data.");
            match self
                .source
                .fetch_analytics(&self.settings.property_id, self.settings.lookback_days)
                .await
            {
                Ok(snapshot) => {
                    tracing::info!(
                        attempt,
                        records = snapshot.record_count(),
                        "[FETCH] Analytics data fetched."
                    );
                    return Ok((snapshot, attempt));
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        retry_in_secs = self.settings.retry_delay.as_secs_f64(),
                        "[FETCH] Attempt failed; retrying."
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "[FETCH] All attempts failed.");
                    return Err(CycleError::Fetch { attempts: attempt, source: e });
                }
            }
        }
    }

    async fn notify(&self, kind: AlertKind, subject: &str, message: &str) {
        if let Err(e) = self.alerter.send_alert(kind, subject, message).await {
            tracing::warn!(kind = %kind, error = %e, "[ALERT] Failed to deliver alert.");
        }
    }
}
