//! Shutdown coordination.

use crate::error::Result;

use super::ManifestDownloader;
use super::coordinator::Command;

impl ManifestDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting commands (they fail with `Error::ShuttingDown`)
    /// 2. Discards pending items
    /// 3. Waits up to 30 seconds for active workers to report
    ///
    /// Every clone of the handle is affected. Calling it twice returns
    /// `Error::ShuttingDown` the second time.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("requesting shutdown");
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
