use crate::error::StoreError;
use crate::store::{SnapshotId, SnapshotStore};

/// The default number of snapshots kept in the store.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 30;

/// What a pruning pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    pub removed: Vec<SnapshotId>,
    /// Deletions that failed, with the reason. These snapshots are still present.
    pub failed: Vec<(SnapshotId, String)>,
    /// Snapshots left in the store.
    pub retained: usize,
}

/// Enforces the store's maximum snapshot count.
#[derive(Debug, Clone, Copy)]
pub struct RetentionManager {
    max_count: usize,
}

impl Default for RetentionManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS)
    }
}

impl RetentionManager {
    pub fn new(max_count: usize) -> Self {
        Self { max_count }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Deletes the oldest snapshots until at most `max_count` remain.
    pub async fn prune(&self, store: &dyn SnapshotStore) -> Result<PruneReport, StoreError> {
        self.prune_inner(store, None).await
    }

    /// Like `prune`, but `written` is never chosen for deletion, even when
    /// clock skew makes it sort before older snapshots.
    pub async fn prune_after_write(
        &self,
        store: &dyn SnapshotStore,
        written: &SnapshotId,
    ) -> Result<PruneReport, StoreError> {
        self.prune_inner(store, Some(written)).await
    }

    async fn prune_inner(
        &self,
        store: &dyn SnapshotStore,
        protected: Option<&SnapshotId>,
    ) -> Result<PruneReport, StoreError> {
        let snapshots = store.list().await?;
        let total = snapshots.len();
        let excess = total.saturating_sub(self.max_count);

        let mut report = PruneReport { retained: total, ..PruneReport::default() };
        if excess == 0 {
            return Ok(report);
        }

        let victims = snapshots
            .into_iter()
            .filter(|id| Some(id) != protected)
            .take(excess);

        for id in victims {
            match store.remove(&id).await {
                Ok(()) => {
                    tracing::info!(snapshot = %id, "[CLEANUP] Removed old forecast.");
                    report.removed.push(id);
                }
                Err(e) => {
                    tracing::warn!(snapshot = %id, error = %e, "[CLEANUP] Failed to remove old forecast; skipping.");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        report.retained = total - report.removed.len();
        Ok(report)
    }
}
