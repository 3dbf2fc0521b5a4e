//! Core types for manifest-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an item (the application id a manifest script belongs to)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Label used when no display name is known
    pub fn fallback_label(&self) -> String {
        format!("ID: {}", self.0)
    }

    /// File name of the installed artifact for this item (`<id>.lua`)
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.0, crate::patch::ARTIFACT_EXTENSION)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for u64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Item status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in the pending queue
    Queued,
    /// A worker is acquiring and installing the artifact
    Downloading,
    /// Finished (installed, or every artifact skipped)
    Completed,
    /// Finished with an error
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Downloading => "downloading",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Transfer statistics for a successful acquisition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferStats {
    /// Bytes written to temporary storage
    pub bytes: u64,
    /// Seconds spent streaming the body (connection setup excluded)
    pub elapsed_seconds: f64,
    /// Bytes per second over the streaming window
    pub throughput_bps: f64,
    /// Name of the source that supplied the payload
    pub source_used: String,
    /// File name of the payload as stored
    pub artifact_name: String,
}

impl TransferStats {
    pub(crate) fn new(
        bytes: u64,
        elapsed_seconds: f64,
        source_used: String,
        artifact_name: String,
    ) -> Self {
        let throughput_bps = if elapsed_seconds > 0.0 {
            bytes as f64 / elapsed_seconds
        } else {
            0.0
        };
        Self {
            bytes,
            elapsed_seconds,
            throughput_bps,
            source_used,
            artifact_name,
        }
    }
}

/// An artifact that was acquired but could not be used
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedArtifact {
    /// File name of the candidate artifact
    pub file_name: String,
    /// The structural defect that prevented installation
    pub reason: String,
}

/// Result of ingesting one payload into the target directory
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// File names of installed artifacts
    pub installed: Vec<String>,
    /// Artifacts that were classified as unpatchable
    pub skipped: Vec<SkippedArtifact>,
    /// Human-readable summary
    pub message: String,
}

impl IngestReport {
    /// True when nothing was installed and at least one artifact was skipped
    pub fn is_skipped(&self) -> bool {
        self.installed.is_empty() && !self.skipped.is_empty()
    }
}

/// One unit of work tracked by the queue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadItem {
    /// Item identifier
    pub id: ItemId,
    /// Human-readable name
    pub display_name: String,
    /// Current status
    pub status: Status,
    /// Admission order (monotonic, assigned on enqueue and on retry)
    pub queued_order: u64,
    /// When the item was (re)queued
    pub queued_at: DateTime<Utc>,
    /// Transfer statistics once the payload was acquired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TransferStats>,
    /// Ingest result once the item completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IngestReport>,
    /// Error message when the item failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadItem {
    pub(crate) fn new(id: ItemId, display_name: String, queued_order: u64) -> Self {
        Self {
            id,
            display_name,
            status: Status::Queued,
            queued_order,
            queued_at: Utc::now(),
            stats: None,
            result: None,
            error: None,
        }
    }

    /// One-line message describing the terminal outcome of the item
    pub fn outcome_message(&self) -> Option<String> {
        match self.status {
            Status::Completed => {
                let result = self.result.as_ref()?;
                if result.is_skipped() {
                    let reasons: Vec<_> = result
                        .skipped
                        .iter()
                        .map(|s| format!("{}: {}", s.file_name, s.reason))
                        .collect();
                    return Some(format!(
                        "{} skipped ({})",
                        self.display_name,
                        reasons.join(", ")
                    ));
                }
                match &self.stats {
                    Some(stats) => Some(format!(
                        "{} installed {} from {} ({} bytes in {:.2}s, {})",
                        self.display_name,
                        result.installed.join(", "),
                        stats.source_used,
                        stats.bytes,
                        stats.elapsed_seconds,
                        crate::utils::format_throughput(stats.throughput_bps)
                    )),
                    None => Some(format!("{}: {}", self.display_name, result.message)),
                }
            }
            Status::Failed => Some(format!(
                "{} failed: {}",
                self.display_name,
                self.error.as_deref().unwrap_or("unknown error")
            )),
            Status::Queued | Status::Downloading => None,
        }
    }
}

/// Snapshot of the queue state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Pending items in admission order
    pub pending: Vec<DownloadItem>,
    /// Downloading items, ordered by admission order
    pub active: Vec<DownloadItem>,
    /// Completed items (oldest first)
    pub completed: Vec<DownloadItem>,
    /// Failed items (oldest first)
    pub failed: Vec<DownloadItem>,
    /// Whether dispatching is currently allowed (always true in immediate mode)
    pub started: bool,
    /// Current concurrency limit
    pub max_concurrent: usize,
}

impl QueueSnapshot {
    /// True when there is nothing pending or downloading
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }
}

/// Summary emitted once per batch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items that installed at least one artifact
    pub completed_items: Vec<DownloadItem>,
    /// Items that failed
    pub failed_items: Vec<DownloadItem>,
    /// Items whose every artifact was skipped as unpatchable
    pub skipped_items: Vec<DownloadItem>,
}

impl BatchSummary {
    /// Total number of items in the batch
    pub fn total(&self) -> usize {
        self.completed_items.len() + self.failed_items.len() + self.skipped_items.len()
    }
}

/// Event emitted during the item lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item added to the pending queue
    Queued {
        /// Item ID
        id: ItemId,
        /// Display name
        name: String,
    },

    /// Display name resolved after enqueue
    Renamed {
        /// Item ID
        id: ItemId,
        /// New display name
        name: String,
    },

    /// Item removed from the pending queue before dispatch
    Removed {
        /// Item ID
        id: ItemId,
    },

    /// Worker dispatched
    Downloading {
        /// Item ID
        id: ItemId,
    },

    /// Item finished (installed or skipped)
    Completed {
        /// Item ID
        id: ItemId,
        /// Transfer statistics
        stats: TransferStats,
        /// Ingest result
        report: IngestReport,
    },

    /// Item failed
    Failed {
        /// Item ID
        id: ItemId,
        /// Error message
        error: String,
    },

    /// Failed item re-admitted through retry
    Retried {
        /// Item ID
        id: ItemId,
    },

    /// Queue cleared
    Cleared {
        /// Number of pending items discarded
        pending_discarded: usize,
        /// Number of in-flight items forgotten
        active_forgotten: usize,
    },

    /// Every item of a batch reached a terminal state
    BatchComplete(BatchSummary),
}
