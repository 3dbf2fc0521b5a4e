//! Coordinator task.
//!
//! The only place queue state is mutated. Caller commands arrive over a
//! bounded channel with `oneshot` replies; worker reports and name lookups
//! arrive over an internal unbounded channel. Dispatching is re-checked after
//! every state change.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::collaborators::NameResolver;
use crate::error::{Error, Result};
use crate::types::{Event, ItemId, QueueSnapshot};

use super::batch::BatchTracker;
use super::queue::{SchedulerState, WorkerOutcome};
use super::worker::{self, WorkerContext, WorkerReport};

/// How long shutdown waits for in-flight workers
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Caller requests
#[derive(Debug)]
pub(crate) enum Command {
    Enqueue {
        id: ItemId,
        name: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Retry {
        id: ItemId,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        id: ItemId,
        reply: oneshot::Sender<Result<()>>,
    },
    ClearAll {
        reply: oneshot::Sender<Result<()>>,
    },
    ClearFinished {
        reply: oneshot::Sender<Result<usize>>,
    },
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    SetMaxConcurrent {
        limit: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Result<QueueSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Messages from tasks the coordinator spawned itself
#[derive(Debug)]
pub(crate) enum Internal {
    WorkerDone(WorkerReport),
    NameResolved { id: ItemId, name: String },
}

struct Draining {
    reply: oneshot::Sender<Result<()>>,
    deadline: Instant,
}

pub(crate) struct Coordinator {
    state: SchedulerState,
    batch: BatchTracker,
    commands: mpsc::Receiver<Command>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    event_tx: broadcast::Sender<Event>,
    workers: Arc<WorkerContext>,
    names: Arc<dyn NameResolver>,
    draining: Option<Draining>,
    stopped: bool,
}

impl Coordinator {
    pub(crate) fn new(
        state: SchedulerState,
        commands: mpsc::Receiver<Command>,
        event_tx: broadcast::Sender<Event>,
        workers: Arc<WorkerContext>,
        names: Arc<dyn NameResolver>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            state,
            batch: BatchTracker::new(),
            commands,
            internal_rx,
            internal_tx,
            event_tx,
            workers,
            names,
            draining: None,
            stopped: false,
        }
    }

    /// Process messages until shutdown completes or every handle is dropped
    pub(crate) async fn run(mut self) {
        tracing::debug!("coordinator started");
        let mut commands_open = true;

        while !self.stopped {
            let deadline = self.draining.as_ref().map(|d| d.deadline);

            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None if self.draining.is_none() => {
                        tracing::debug!("all handles dropped, coordinator exiting");
                        break;
                    }
                    None => commands_open = false,
                },
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    tracing::warn!(
                        active = self.state.active_count(),
                        "timeout waiting for workers, proceeding with shutdown"
                    );
                    self.finish_shutdown();
                }
            }
        }

        tracing::debug!("coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        if self.draining.is_some() {
            reject_shutting_down(command);
            return;
        }

        match command {
            Command::Enqueue { id, name, reply } => {
                let _ = reply.send(self.enqueue(id, name));
            }
            Command::Retry { id, reply } => {
                let _ = reply.send(self.retry(id));
            }
            Command::Remove { id, reply } => {
                let result = self.state.remove(id).map(|item| {
                    tracing::info!(item_id = %item.id, "removed pending item");
                    self.emit(Event::Removed { id });
                });
                let _ = reply.send(result);
                self.finish_batch_if_idle();
            }
            Command::ClearAll { reply } => {
                let cleared = self.state.clear_all();
                self.batch.reset();
                tracing::info!(
                    pending_discarded = cleared.pending,
                    active_forgotten = cleared.active,
                    "queue cleared"
                );
                self.emit(Event::Cleared {
                    pending_discarded: cleared.pending,
                    active_forgotten: cleared.active,
                });
                let _ = reply.send(Ok(()));
            }
            Command::ClearFinished { reply } => {
                let _ = reply.send(Ok(self.state.clear_finished()));
            }
            Command::Start { reply } => {
                self.state.start();
                tracing::info!("dispatching started");
                self.dispatch();
                let _ = reply.send(Ok(()));
            }
            Command::SetMaxConcurrent { limit, reply } => {
                let result = self.state.set_limit(limit);
                if result.is_ok() {
                    tracing::info!(max_concurrent = limit, "concurrency limit changed");
                    self.dispatch();
                }
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            Command::Shutdown { reply } => self.begin_shutdown(reply),
        }
    }

    fn enqueue(&mut self, id: ItemId, name: Option<String>) -> Result<()> {
        let was_idle = self.state.is_idle();
        let needs_lookup = name.is_none();
        let display_name = name.unwrap_or_else(|| id.fallback_label());

        let item = self.state.enqueue(id, display_name)?;
        self.batch.on_admit(was_idle);

        tracing::info!(item_id = %id, name = %item.display_name, "item queued");
        self.emit(Event::Queued {
            id,
            name: item.display_name,
        });

        if needs_lookup {
            self.resolve_name(id);
        }
        self.dispatch();
        Ok(())
    }

    fn retry(&mut self, id: ItemId) -> Result<()> {
        let was_idle = self.state.is_idle();
        self.state.retry(id)?;
        self.batch.on_admit(was_idle);
        self.batch.on_retry(id);

        tracing::info!(item_id = %id, "item re-queued for retry");
        self.emit(Event::Retried { id });
        self.dispatch();
        Ok(())
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::WorkerDone(report) => self.on_report(report),
            Internal::NameResolved { id, name } => {
                if self.state.rename(id, &name) {
                    tracing::debug!(item_id = %id, name = %name, "display name resolved");
                    self.emit(Event::Renamed { id, name });
                }
            }
        }
    }

    fn on_report(&mut self, report: WorkerReport) {
        let WorkerReport {
            id,
            ticket,
            outcome,
        } = report;

        let event = match &outcome {
            WorkerOutcome::Completed { stats, report } => Event::Completed {
                id,
                stats: stats.clone(),
                report: report.clone(),
            },
            WorkerOutcome::Failed { error, .. } => Event::Failed {
                id,
                error: error.clone(),
            },
        };

        let Some(item) = self.state.finish(id, ticket, outcome) else {
            tracing::debug!(item_id = %id, %ticket, "dropping report for cleared dispatch");
            return;
        };

        match item.outcome_message() {
            Some(message) if event_is_failure(&event) => {
                tracing::warn!(item_id = %id, "{}", message)
            }
            Some(message) => tracing::info!(item_id = %id, "{}", message),
            None => {}
        }
        self.emit(event);
        self.batch.record(&item);

        if self.draining.is_some() {
            if self.state.active_count() == 0 {
                self.finish_shutdown();
            }
            return;
        }

        self.dispatch();
        self.finish_batch_if_idle();
    }

    /// Promote pending items into free slots
    fn dispatch(&mut self) {
        while let Some((item, ticket)) = self.state.next_dispatch() {
            tracing::info!(
                item_id = %item.id,
                %ticket,
                active = self.state.active_count(),
                "dispatching worker"
            );
            self.emit(Event::Downloading { id: item.id });

            tokio::spawn(worker::run(
                Arc::clone(&self.workers),
                item.id,
                item.display_name,
                ticket,
                self.internal_tx.clone(),
            ));
        }
    }

    fn finish_batch_if_idle(&mut self) {
        if !self.state.is_idle() {
            return;
        }
        if let Some(summary) = self.batch.take_summary() {
            tracing::info!(
                completed = summary.completed_items.len(),
                failed = summary.failed_items.len(),
                skipped = summary.skipped_items.len(),
                "batch complete"
            );
            self.emit(Event::BatchComplete(summary));
        }
    }

    fn resolve_name(&self, id: ItemId) {
        let names = Arc::clone(&self.names);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            if let Some(name) = names.resolve(id).await {
                let _ = tx.send(Internal::NameResolved { id, name });
            }
        });
    }

    fn begin_shutdown(&mut self, reply: oneshot::Sender<Result<()>>) {
        tracing::info!("initiating shutdown");
        let discarded = self.state.drain_pending();
        if discarded > 0 {
            tracing::info!(pending_discarded = discarded, "discarded pending items");
        }

        self.draining = Some(Draining {
            reply,
            deadline: Instant::now() + SHUTDOWN_GRACE,
        });
        self.commands.close();

        if self.state.active_count() == 0 {
            self.finish_shutdown();
        } else {
            tracing::info!(
                active = self.state.active_count(),
                "waiting for active workers"
            );
        }
    }

    fn finish_shutdown(&mut self) {
        self.stopped = true;
        if let Some(draining) = self.draining.take() {
            tracing::info!("shutdown complete");
            let _ = draining.reply.send(Ok(()));
        }
    }

    fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }
}

fn event_is_failure(event: &Event) -> bool {
    matches!(event, Event::Failed { .. })
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn reject_shutting_down(command: Command) {
    match command {
        Command::Enqueue { reply, .. }
        | Command::Retry { reply, .. }
        | Command::Remove { reply, .. }
        | Command::ClearAll { reply }
        | Command::Start { reply }
        | Command::SetMaxConcurrent { reply, .. }
        | Command::Shutdown { reply } => {
            let _ = reply.send(Err(Error::ShuttingDown));
        }
        Command::ClearFinished { reply } => {
            let _ = reply.send(Err(Error::ShuttingDown));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(Err(Error::ShuttingDown));
        }
    }
}
