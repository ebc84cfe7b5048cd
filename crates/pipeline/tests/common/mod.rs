#![allow(dead_code)]

use alerter::AlertSink;
use alerter::error::AlertError;
use api_client::AnalyticsSource;
use api_client::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use core_types::{AlertKind, AnalyticsSnapshot, MetricSeries, metrics, series};
use forecast_store::{FileStore, RetentionManager, SnapshotStore};
use pipeline::{Clock, ForecastPipeline, PipelineSettings};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

pub fn reference_snapshot() -> AnalyticsSnapshot {
    AnalyticsSnapshot::new(Utc::now())
        .with_series(
            series::CONVERSIONS,
            MetricSeries::from_values(metrics::CONVERSIONS, &[4.0, 6.0, 5.0]),
        )
        .with_series(
            series::TRAFFIC,
            MetricSeries::from_values(metrics::SESSIONS, &[120.0, 130.0, 125.0]),
        )
}

/// Fails the first `failures` calls, then returns `snapshot`.
/// Every call is recorded with its (virtual) instant.
pub struct ScriptedSource {
    failures: u32,
    snapshot: AnalyticsSnapshot,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures,
            snapshot: reference_snapshot(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(snapshot: AnalyticsSnapshot) -> Self {
        Self {
            failures: 0,
            snapshot,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSource for ScriptedSource {
    async fn fetch_analytics(&self, _property_id: &str, _days_back: u32) -> Result<AnalyticsSnapshot, ApiError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Instant::now());
        if calls.len() as u32 <= self.failures {
            return Err(ApiError::Provider(503, "UNAVAILABLE".to_string()));
        }
        Ok(self.snapshot.clone())
    }
}

/// Blocks inside `fetch_analytics` until released.
#[derive(Default)]
pub struct BlockingSource {
    pub started: Notify,
    pub release: Notify,
    pub calls: AtomicU32,
}

#[async_trait]
impl AnalyticsSource for BlockingSource {
    async fn fetch_analytics(&self, _property_id: &str, _days_back: u32) -> Result<AnalyticsSnapshot, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(reference_snapshot())
    }
}

#[derive(Default)]
pub struct RecordingAlerter {
    pub sent: Mutex<Vec<(AlertKind, String, String)>>,
    pub fail: bool,
}

impl RecordingAlerter {
    pub fn broken() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn kinds(&self) -> Vec<AlertKind> {
        self.sent.lock().unwrap().iter().map(|(kind, _, _)| *kind).collect()
    }
}

#[async_trait]
impl AlertSink for RecordingAlerter {
    async fn send_alert(&self, kind: AlertKind, subject: &str, message: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push((kind, subject.to_string(), message.to_string()));
        if self.fail {
            return Err(AlertError::ApiError("chat not found".to_string()));
        }
        Ok(())
    }
}

/// Starts at `start` and moves forward one minute on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    next_millis: AtomicI64,
}

impl SteppingClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { next_millis: AtomicI64::new(start.timestamp_millis()) }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self
            .next_millis
            .fetch_add(Duration::minutes(1).num_milliseconds(), Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).unwrap()
    }
}

pub fn reference_instant() -> DateTime<Utc> {
    // 2025-03-09T17:30:00+01:00
    Utc.with_ymd_and_hms(2025, 3, 9, 16, 30, 0).unwrap()
}

pub fn settings(max_retries: u32) -> PipelineSettings {
    PipelineSettings {
        property_id: "properties/123".to_string(),
        lookback_days: 7,
        max_retries,
        retry_delay: std::time::Duration::from_secs(30),
        timezone: chrono_tz::Europe::Rome,
    }
}

pub async fn file_store(dir: &tempfile::TempDir) -> Arc<dyn SnapshotStore> {
    Arc::new(FileStore::open(dir.path()).await.unwrap())
}

pub fn build_pipeline(
    source: Arc<dyn AnalyticsSource>,
    store: Arc<dyn SnapshotStore>,
    alerter: Arc<RecordingAlerter>,
) -> ForecastPipeline {
    ForecastPipeline::new(settings(3), source, store, alerter, RetentionManager::default())
        .with_clock(Arc::new(SteppingClock::starting_at(reference_instant())))
}
