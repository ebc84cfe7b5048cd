mod common;

use async_trait::async_trait;
use common::*;
use core_types::{AlertKind, Forecast, MetricSeries, metrics, series};
use forecast_store::{RetentionManager, SnapshotId, SnapshotStore, StoreError};
use pipeline::{CycleError, ForecastPipeline};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn reference_cycle_persists_the_expected_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let alerter = Arc::new(RecordingAlerter::default());
    let pipeline = build_pipeline(Arc::new(ScriptedSource::failing(0)), store.clone(), alerter.clone());

    let success = pipeline.run_cycle().await.unwrap();

    assert_eq!(success.fetch_attempts, 1);
    assert_eq!(success.snapshot.as_str(), "forecast_2025-03-09_16-30-00_000Z.json");
    let raw = std::fs::read_to_string(dir.path().join(success.snapshot.as_str())).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["forecast_date"], "2025-03-10");
    assert_eq!(json["predicted_conversions"], 5.0);
    assert_eq!(json["predicted_sessions"], 125.0);
    assert_eq!(json["confidence_level"], "MEDIUM");
    assert_eq!(json["data_points_used"], 3);
    assert_eq!(json["generated_at"], "2025-03-09T17:30:00+01:00");

    let sent = alerter.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, AlertKind::ForecastUpdated);
    assert!(sent[0].2.contains(success.snapshot.as_str()));
}

#[tokio::test(start_paused = true)]
async fn transient_fetch_failures_are_retried_with_the_configured_delay() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::failing(2));
    let alerter = Arc::new(RecordingAlerter::default());
    let pipeline = build_pipeline(source.clone(), file_store(&dir).await, alerter.clone());

    let success = pipeline.run_cycle().await.unwrap();

    assert_eq!(success.fetch_attempts, 3);
    let calls = source.calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(30) && gap < Duration::from_secs(31), "gap was {:?}", gap);
    }
    assert_eq!(alerter.kinds(), vec![AlertKind::ForecastUpdated]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_cycle_without_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let source = Arc::new(ScriptedSource::failing(u32::MAX));
    let alerter = Arc::new(RecordingAlerter::default());
    let pipeline = build_pipeline(source.clone(), store.clone(), alerter.clone());
    let started = tokio::time::Instant::now();

    let err = pipeline.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Fetch { attempts: 3, .. }));
    assert_eq!(source.calls().len(), 3);
    // Two delays between three attempts, none after the last.
    assert!(started.elapsed() < Duration::from_secs(61));
    assert_eq!(alerter.kinds(), vec![AlertKind::FetchFailed]);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn a_single_attempt_never_sleeps() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::failing(u32::MAX));
    let alerter = Arc::new(RecordingAlerter::default());
    let pipeline = ForecastPipeline::new(
        settings(1),
        source.clone(),
        file_store(&dir).await,
        alerter.clone(),
        RetentionManager::default(),
    );
    let started = tokio::time::Instant::now();

    let err = pipeline.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Fetch { attempts: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn store_never_exceeds_its_cap_and_keeps_the_newest() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let alerter = Arc::new(RecordingAlerter::default());
    let pipeline = build_pipeline(Arc::new(ScriptedSource::failing(0)), store.clone(), alerter.clone());

    let mut last = None;
    for _ in 0..32 {
        let success = pipeline.run_cycle().await.unwrap();
        let listed = store.list().await.unwrap();
        assert!(listed.len() <= 30);
        assert_eq!(listed.last(), Some(&success.snapshot));
        last = Some(success);
    }

    let last = last.unwrap();
    assert_eq!(last.pruned.unwrap().retained, 30);
    assert_eq!(store.list().await.unwrap().len(), 30);
    assert_eq!(alerter.kinds().len(), 32);
}

#[tokio::test]
async fn non_finite_data_fails_the_cycle_with_a_generic_alert() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let alerter = Arc::new(RecordingAlerter::default());
    let snapshot = reference_snapshot().with_series(
        series::CONVERSIONS,
        MetricSeries::from_values(metrics::CONVERSIONS, &[f64::INFINITY]),
    );
    let pipeline = build_pipeline(Arc::new(ScriptedSource::returning(snapshot)), store.clone(), alerter.clone());

    let err = pipeline.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Derive(_)));
    assert_eq!(alerter.kinds(), vec![AlertKind::CycleFailed]);
    assert!(store.list().await.unwrap().is_empty());
}

/// A store whose writes always fail. Listing or removing would be a bug.
struct ReadOnlyStore;

#[async_trait]
impl SnapshotStore for ReadOnlyStore {
    async fn write(&self, _forecast: &Forecast) -> Result<SnapshotId, StoreError> {
        Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only file system")))
    }

    async fn list(&self) -> Result<Vec<SnapshotId>, StoreError> {
        panic!("retention must not run after a failed write");
    }

    async fn read(&self, id: &SnapshotId) -> Result<Forecast, StoreError> {
        Err(StoreError::NotFound(id.to_string()))
    }

    async fn remove(&self, _id: &SnapshotId) -> Result<(), StoreError> {
        panic!("retention must not run after a failed write");
    }
}

#[tokio::test]
async fn persist_failure_skips_retention_and_alerts_once() {
    let alerter = Arc::new(RecordingAlerter::default());
    let pipeline = build_pipeline(Arc::new(ScriptedSource::failing(0)), Arc::new(ReadOnlyStore), alerter.clone());

    let err = pipeline.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Persist(StoreError::Io(_))));
    assert_eq!(alerter.kinds(), vec![AlertKind::PersistFailed]);
}

#[tokio::test]
async fn alert_delivery_failure_does_not_change_the_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let alerter = Arc::new(RecordingAlerter::broken());
    let pipeline = build_pipeline(Arc::new(ScriptedSource::failing(0)), file_store(&dir).await, alerter.clone());

    assert!(pipeline.run_cycle().await.is_ok());
    assert_eq!(alerter.kinds(), vec![AlertKind::ForecastUpdated]);
}
