//! Batch result aggregation.
//!
//! A batch starts when an item is admitted into an idle queue and ends the
//! next time the queue is idle again. Finished items are sorted into
//! completed, failed and skipped as they arrive. An item retried within the
//! batch is counted by its final outcome only.

use crate::types::{BatchSummary, DownloadItem, ItemId, Status};

#[derive(Debug, Default)]
pub(crate) struct BatchTracker {
    summary: BatchSummary,
}

impl BatchTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Called before admitting an item; `queue_idle` is the state before admission
    pub(crate) fn on_admit(&mut self, queue_idle: bool) {
        if queue_idle {
            self.reset();
        }
    }

    /// Drop the earlier failure of an item that is admitted again
    pub(crate) fn on_retry(&mut self, id: ItemId) {
        self.summary.failed_items.retain(|item| item.id != id);
    }

    /// Record a finished item
    pub(crate) fn record(&mut self, item: &DownloadItem) {
        match item.status {
            Status::Completed if item.result.as_ref().is_some_and(|r| r.is_skipped()) => {
                self.summary.skipped_items.push(item.clone())
            }
            Status::Completed => self.summary.completed_items.push(item.clone()),
            Status::Failed => self.summary.failed_items.push(item.clone()),
            Status::Queued | Status::Downloading => {}
        }
    }

    /// Hand out the summary once the queue is idle
    ///
    /// Returns `None` when nothing finished since the last summary.
    pub(crate) fn take_summary(&mut self) -> Option<BatchSummary> {
        if self.summary.total() == 0 {
            return None;
        }
        Some(std::mem::take(&mut self.summary))
    }

    pub(crate) fn reset(&mut self) {
        self.summary = BatchSummary::default();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IngestReport, SkippedArtifact};

    fn finished(id: u64, status: Status, report: Option<IngestReport>) -> DownloadItem {
        let mut item = DownloadItem::new(ItemId(id), format!("Game {id}"), id);
        item.status = status;
        item.result = report;
        item
    }

    #[test]
    fn sorts_items_by_outcome() {
        let mut tracker = BatchTracker::new();
        tracker.on_admit(true);

        let installed = IngestReport {
            installed: vec!["1.lua".into()],
            ..IngestReport::default()
        };
        let skipped = IngestReport {
            skipped: vec![SkippedArtifact {
                file_name: "3.lua".into(),
                reason: "missing addappid directive".into(),
            }],
            ..IngestReport::default()
        };
        tracker.record(&finished(1, Status::Completed, Some(installed)));
        tracker.record(&finished(2, Status::Failed, None));
        tracker.record(&finished(3, Status::Completed, Some(skipped)));

        let summary = tracker.take_summary().expect("summary");
        assert_eq!(summary.completed_items.len(), 1);
        assert_eq!(summary.failed_items.len(), 1);
        assert_eq!(summary.skipped_items.len(), 1);
        assert_eq!(summary.skipped_items[0].id, ItemId(3));

        assert!(tracker.take_summary().is_none(), "summary is handed out once");
    }

    #[test]
    fn admitting_into_busy_queue_keeps_results() {
        let mut tracker = BatchTracker::new();
        tracker.record(&finished(1, Status::Failed, None));

        tracker.on_admit(false);
        assert_eq!(tracker.take_summary().map(|s| s.total()), Some(1));

        tracker.record(&finished(2, Status::Failed, None));
        tracker.on_admit(true);
        assert!(tracker.take_summary().is_none());
    }

    #[test]
    fn retried_failure_is_replaced_by_final_outcome() {
        let mut tracker = BatchTracker::new();
        tracker.on_admit(true);
        tracker.record(&finished(1, Status::Failed, None));
        tracker.record(&finished(2, Status::Failed, None));

        tracker.on_admit(false);
        tracker.on_retry(ItemId(1));
        tracker.record(&finished(1, Status::Completed, None));

        let summary = tracker.take_summary().expect("summary");
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.completed_items[0].id, ItemId(1));
        assert_eq!(summary.failed_items.len(), 1);
        assert_eq!(summary.failed_items[0].id, ItemId(2));
    }
}
