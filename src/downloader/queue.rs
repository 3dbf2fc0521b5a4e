//! Queue state machine.
//!
//! `SchedulerState` is plain data owned by the coordinator task; nothing in
//! here is async or shared. Items move `Queued -> Downloading -> Completed |
//! Failed`, and only `retry` moves a failed item back to `Queued`.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;

use crate::config::MAX_CONCURRENCY_LIMIT;
use crate::error::{Error, Result};
use crate::types::{DownloadItem, IngestReport, ItemId, QueueSnapshot, Status, TransferStats};

/// Identifies one dispatch of an item
///
/// Reports carrying a ticket that no longer matches the active entry come
/// from workers whose item was cleared and are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Ticket(pub(crate) u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a worker reports back for one dispatch
#[derive(Clone, Debug)]
pub(crate) enum WorkerOutcome {
    Completed {
        stats: TransferStats,
        report: IngestReport,
    },
    Failed {
        error: String,
        stats: Option<TransferStats>,
    },
}

#[derive(Debug)]
struct ActiveEntry {
    item: DownloadItem,
    ticket: Ticket,
}

/// Counts returned by [`SchedulerState::clear_all`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cleared {
    pub(crate) pending: usize,
    pub(crate) active: usize,
}

#[derive(Debug)]
pub(crate) struct SchedulerState {
    pending: VecDeque<DownloadItem>,
    active: HashMap<ItemId, ActiveEntry>,
    completed: Vec<DownloadItem>,
    failed: Vec<DownloadItem>,
    /// Ids that are queued or downloading
    tracked: HashSet<ItemId>,
    next_order: u64,
    next_ticket: u64,
    limit: usize,
    deferred: bool,
    started: bool,
}

impl SchedulerState {
    pub(crate) fn new(limit: usize, deferred: bool) -> Self {
        Self {
            pending: VecDeque::new(),
            active: HashMap::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            tracked: HashSet::new(),
            next_order: 0,
            next_ticket: 0,
            limit,
            deferred,
            started: !deferred,
        }
    }

    /// True when nothing is pending or downloading
    pub(crate) fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Append a new item to the tail of the pending queue
    pub(crate) fn enqueue(&mut self, id: ItemId, display_name: String) -> Result<DownloadItem> {
        if self.tracked.contains(&id) {
            return Err(Error::Duplicate(id));
        }

        let item = DownloadItem::new(id, display_name, self.take_order());
        self.tracked.insert(id);
        self.pending.push_back(item.clone());
        Ok(item)
    }

    /// Move a failed item back to the tail of the pending queue
    pub(crate) fn retry(&mut self, id: ItemId) -> Result<DownloadItem> {
        if self.tracked.contains(&id) {
            return Err(Error::Duplicate(id));
        }
        let index = self
            .failed
            .iter()
            .rposition(|item| item.id == id)
            .ok_or(Error::NotFound(id))?;

        let mut item = self.failed.remove(index);
        item.status = Status::Queued;
        item.error = None;
        item.stats = None;
        item.result = None;
        item.queued_order = self.take_order();
        item.queued_at = Utc::now();

        self.tracked.insert(id);
        self.pending.push_back(item.clone());
        Ok(item)
    }

    /// Drop a pending item before it is dispatched
    pub(crate) fn remove(&mut self, id: ItemId) -> Result<DownloadItem> {
        if let Some(index) = self.pending.iter().position(|item| item.id == id) {
            self.tracked.remove(&id);
            let item = self.pending.remove(index).ok_or(Error::NotFound(id))?;
            if self.deferred && self.is_idle() {
                self.started = false;
            }
            return Ok(item);
        }
        match self.active.get(&id) {
            Some(entry) => Err(Error::InvalidState {
                id,
                operation: "remove".to_string(),
                current_state: entry.item.status.to_string(),
            }),
            None => Err(Error::NotFound(id)),
        }
    }

    /// Promote the front of the pending queue if a slot is free
    pub(crate) fn next_dispatch(&mut self) -> Option<(DownloadItem, Ticket)> {
        if !self.started || self.active.len() >= self.limit {
            return None;
        }

        let mut item = self.pending.pop_front()?;
        item.status = Status::Downloading;

        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.active.insert(
            item.id,
            ActiveEntry {
                item: item.clone(),
                ticket,
            },
        );
        Some((item, ticket))
    }

    /// Apply a worker report
    ///
    /// Returns the finished item, or `None` when the ticket is stale.
    pub(crate) fn finish(
        &mut self,
        id: ItemId,
        ticket: Ticket,
        outcome: WorkerOutcome,
    ) -> Option<DownloadItem> {
        if self.active.get(&id).is_none_or(|entry| entry.ticket != ticket) {
            return None;
        }
        let mut item = self.active.remove(&id)?.item;
        self.tracked.remove(&id);

        match outcome {
            WorkerOutcome::Completed { stats, report } => {
                item.status = Status::Completed;
                item.stats = Some(stats);
                item.result = Some(report);
                self.completed.push(item.clone());
            }
            WorkerOutcome::Failed { error, stats } => {
                item.status = Status::Failed;
                item.stats = stats;
                item.error = Some(error);
                self.failed.push(item.clone());
            }
        }

        if self.deferred && self.is_idle() {
            self.started = false;
        }
        Some(item)
    }

    /// Allow dispatching in deferred mode
    pub(crate) fn start(&mut self) {
        self.started = true;
    }

    pub(crate) fn set_limit(&mut self, limit: usize) -> Result<()> {
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&limit) {
            return Err(Error::config(
                format!(
                    "max_concurrent_downloads must be between 1 and {}",
                    MAX_CONCURRENCY_LIMIT
                ),
                "download.max_concurrent_downloads",
            ));
        }
        self.limit = limit;
        Ok(())
    }

    /// Update the display name of a tracked or finished item
    pub(crate) fn rename(&mut self, id: ItemId, name: &str) -> bool {
        let mut renamed = false;
        let items = self
            .pending
            .iter_mut()
            .chain(self.active.values_mut().map(|entry| &mut entry.item))
            .chain(self.completed.iter_mut())
            .chain(self.failed.iter_mut())
            .filter(|item| item.id == id);
        for item in items {
            item.display_name = name.to_string();
            renamed = true;
        }
        renamed
    }

    /// Discard pending and finished items and forget active ones
    pub(crate) fn clear_all(&mut self) -> Cleared {
        let cleared = Cleared {
            pending: self.pending.len(),
            active: self.active.len(),
        };
        self.pending.clear();
        self.active.clear();
        self.completed.clear();
        self.failed.clear();
        self.tracked.clear();
        if self.deferred {
            self.started = false;
        }
        cleared
    }

    /// Forget completed and failed history
    pub(crate) fn clear_finished(&mut self) -> usize {
        let count = self.completed.len() + self.failed.len();
        self.completed.clear();
        self.failed.clear();
        count
    }

    /// Drop everything still pending (used during shutdown)
    pub(crate) fn drain_pending(&mut self) -> usize {
        let count = self.pending.len();
        for item in self.pending.drain(..) {
            self.tracked.remove(&item.id);
        }
        count
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        let mut active: Vec<_> = self.active.values().map(|e| e.item.clone()).collect();
        active.sort_by_key(|item| item.queued_order);

        QueueSnapshot {
            pending: self.pending.iter().cloned().collect(),
            active,
            completed: self.completed.clone(),
            failed: self.failed.clone(),
            started: self.started,
            max_concurrent: self.limit,
        }
    }

    fn take_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }
}
