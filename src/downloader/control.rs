//! Queue control: admission, retry, removal and dispatch settings.

use crate::error::Result;
use crate::types::{ItemId, QueueSnapshot};

use super::ManifestDownloader;
use super::coordinator::Command;

impl ManifestDownloader {
    /// Queue an item for acquisition
    ///
    /// Without a name the item is labelled `ID: <id>` and the name resolver is
    /// asked in the background; an [`Event::Renamed`](crate::Event::Renamed)
    /// follows if it answers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`](crate::Error::Duplicate) if the id is
    /// already queued or downloading.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use manifest_dl::*;
    /// # async fn example(downloader: ManifestDownloader) -> Result<()> {
    /// downloader.enqueue(ItemId(730), None).await?;
    /// downloader.enqueue(ItemId(440), Some("Team Fortress 2".to_string())).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn enqueue(&self, id: ItemId, name: Option<String>) -> Result<()> {
        self.request(|reply| Command::Enqueue { id, name, reply })
            .await
    }

    /// Re-queue a failed item at the tail of the pending queue
    ///
    /// # Errors
    ///
    /// - [`Error::Duplicate`](crate::Error::Duplicate) if the id is queued or downloading
    /// - [`Error::NotFound`](crate::Error::NotFound) if the id is not among the failed items
    pub async fn retry(&self, id: ItemId) -> Result<()> {
        self.request(|reply| Command::Retry { id, reply }).await
    }

    /// Remove an item that has not been dispatched yet
    pub async fn remove(&self, id: ItemId) -> Result<()> {
        self.request(|reply| Command::Remove { id, reply }).await
    }

    /// Discard pending and finished items and forget in-flight ones
    ///
    /// Running workers are not interrupted; whatever they report afterwards is
    /// ignored.
    pub async fn clear_all(&self) -> Result<()> {
        self.request(|reply| Command::ClearAll { reply }).await
    }

    /// Forget completed and failed items, returning how many were dropped
    pub async fn clear_finished(&self) -> Result<usize> {
        self.request(|reply| Command::ClearFinished { reply }).await
    }

    /// Begin dispatching in deferred mode (no-op in immediate mode)
    pub async fn start(&self) -> Result<()> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Change the concurrency limit (1..=10)
    ///
    /// Raising the limit dispatches waiting items right away. Lowering it
    /// never interrupts running workers.
    pub async fn set_max_concurrent(&self, limit: usize) -> Result<()> {
        self.request(|reply| Command::SetMaxConcurrent { limit, reply })
            .await
    }

    /// Current queue state
    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
