use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use core_types::Forecast;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const PREFIX: &str = "forecast_";
const SUFFIX: &str = ".json";
const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S_%3fZ";

/// The name of a persisted snapshot, e.g. `forecast_2025-03-09_16-30-00_000Z.json`.
///
/// Names encode the generation instant in UTC with millisecond resolution, so
/// sorting names sorts snapshots by creation time, even across DST changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// The deterministic name of the snapshot holding `forecast`.
    pub fn for_forecast(forecast: &Forecast) -> Self {
        let utc = forecast.generated_at.with_timezone(&Utc);
        Self(format!("{}{}{}", PREFIX, utc.format(STAMP_FORMAT), SUFFIX))
    }

    /// Accepts only names that `for_forecast` could have produced.
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        let is_snapshot = name
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .and_then(|stamp| {
                // Round-trip so only the canonical spelling of an instant sorts.
                let parsed = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
                (parsed.format(STAMP_FORMAT).to_string() == stamp).then_some(())
            })
            .is_some();
        if is_snapshot {
            Ok(Self(name.to_string()))
        } else {
            Err(StoreError::InvalidName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable storage for forecast snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists `forecast` as a new snapshot. Never overwrites an existing one.
    async fn write(&self, forecast: &Forecast) -> Result<SnapshotId, StoreError>;

    /// All snapshots, oldest first.
    async fn list(&self) -> Result<Vec<SnapshotId>, StoreError>;

    async fn read(&self, id: &SnapshotId) -> Result<Forecast, StoreError>;

    async fn remove(&self, id: &SnapshotId) -> Result<(), StoreError>;

    /// The most recent snapshot, if any.
    async fn latest(&self) -> Result<Option<(SnapshotId, Forecast)>, StoreError> {
        match self.list().await?.pop() {
            Some(id) => {
                let forecast = self.read(&id).await?;
                Ok(Some((id, forecast)))
            }
            None => Ok(None),
        }
    }
}

/// Stores each snapshot as a JSON file in a single directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(id.as_str())
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn write(&self, forecast: &Forecast) -> Result<SnapshotId, StoreError> {
        let id = SnapshotId::for_forecast(forecast);
        let path = self.path_of(&id);
        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        let body = serde_json::to_vec_pretty(forecast)?;

        // Write to a hidden temporary file first so a failed write never leaves
        // a truncated snapshot behind; the rename publishes it in one step.
        let tmp = self.dir.join(format!(".{}.tmp", id));
        let result = async {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)
                .await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Io(e));
        }

        tracing::debug!(snapshot = %id, bytes = body.len(), "Snapshot written.");
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<SnapshotId>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = SnapshotId::parse(name) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read(&self, id: &SnapshotId) -> Result<Forecast, StoreError> {
        let body = match fs::read(self.path_of(id)).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&body)?)
    }

    async fn remove(&self, id: &SnapshotId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_of(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
