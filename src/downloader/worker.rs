//! Worker task: acquire one item, ingest it, report back exactly once.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::acquisition::{AcquisitionChain, Payload};
use crate::extraction::ArchiveExtractor;
use crate::ingest;
use crate::sources::SourceRegistry;
use crate::types::ItemId;

use super::coordinator::Internal;
use super::queue::{Ticket, WorkerOutcome};

/// Everything a worker needs, shared read-only across workers
pub(crate) struct WorkerContext {
    pub(crate) chain: AcquisitionChain,
    pub(crate) sources: Arc<SourceRegistry>,
    pub(crate) extractor: Arc<dyn ArchiveExtractor>,
    pub(crate) temp_dir: PathBuf,
    pub(crate) target_dir: PathBuf,
    pub(crate) keep_payloads: bool,
    pub(crate) payload_dir: PathBuf,
}

/// A finished dispatch, sent to the coordinator
#[derive(Debug)]
pub(crate) struct WorkerReport {
    pub(crate) id: ItemId,
    pub(crate) ticket: Ticket,
    pub(crate) outcome: WorkerOutcome,
}

/// Run one dispatch to completion
///
/// Panics anywhere in acquisition or ingest are caught here and reported as
/// a failure, so the coordinator always hears back.
pub(crate) async fn run(
    ctx: Arc<WorkerContext>,
    id: ItemId,
    display_name: String,
    ticket: Ticket,
    reports: mpsc::UnboundedSender<Internal>,
) {
    let outcome = AssertUnwindSafe(execute(&ctx, id, &display_name, ticket))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            tracing::error!(item_id = %id, %ticket, panic = %message, "worker panicked");
            WorkerOutcome::Failed {
                error: format!("worker panicked: {}", message),
                stats: None,
            }
        });

    if reports
        .send(Internal::WorkerDone(WorkerReport {
            id,
            ticket,
            outcome,
        }))
        .is_err()
    {
        tracing::debug!(item_id = %id, "coordinator gone, dropping worker report");
    }
}

async fn execute(
    ctx: &WorkerContext,
    id: ItemId,
    display_name: &str,
    ticket: Ticket,
) -> WorkerOutcome {
    let work_dir = ctx.temp_dir.join(format!("{}-{}", id, ticket));

    let payload = match ctx.chain.acquire(id, &ctx.sources, &work_dir).await {
        Ok(payload) => payload,
        Err(e) => {
            remove_work_dir(&work_dir).await;
            return WorkerOutcome::Failed {
                error: e.to_string(),
                stats: None,
            };
        }
    };
    let stats = payload.stats.clone();

    let ingest_result = {
        let extractor = Arc::clone(&ctx.extractor);
        let target_dir = ctx.target_dir.clone();
        let display_name = display_name.to_string();
        let payload = payload.clone();
        tokio::task::spawn_blocking(move || {
            ingest::ingest(&payload, id, &display_name, &target_dir, extractor.as_ref())
        })
        .await
    };

    let ingest_result = match ingest_result {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            remove_work_dir(&work_dir).await;
            std::panic::resume_unwind(join_error.into_panic());
        }
        Err(join_error) => {
            remove_work_dir(&work_dir).await;
            return WorkerOutcome::Failed {
                error: format!("ingest task aborted: {}", join_error),
                stats: Some(stats),
            };
        }
    };

    if ctx.keep_payloads {
        retain_payload(&payload, &ctx.payload_dir).await;
    }
    remove_work_dir(&work_dir).await;

    match ingest_result {
        Ok(report) => WorkerOutcome::Completed { stats, report },
        Err(e) => WorkerOutcome::Failed {
            error: e.to_string(),
            stats: Some(stats),
        },
    }
}

/// Move the payload out of temporary storage before it is cleaned up
async fn retain_payload(payload: &Payload, payload_dir: &Path) {
    let Some(file_name) = payload.path.file_name() else {
        return;
    };
    let destination = payload_dir.join(file_name);

    let result = async {
        tokio::fs::create_dir_all(payload_dir).await?;
        if tokio::fs::rename(&payload.path, &destination).await.is_err() {
            // rename fails across filesystems
            tokio::fs::copy(&payload.path, &destination).await?;
        }
        Ok::<_, std::io::Error>(())
    }
    .await;

    match result {
        Ok(()) => tracing::debug!(path = ?destination, "kept payload"),
        Err(e) => tracing::warn!(path = ?destination, error = %e, "failed to keep payload"),
    }
}

async fn remove_work_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?dir, error = %e, "failed to remove temporary files"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
