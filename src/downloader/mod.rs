//! Core downloader implementation split into focused submodules.
//!
//! The `ManifestDownloader` handle and its methods are organized by domain:
//! - [`queue`] - Queue state machine (pending, active, finished)
//! - [`batch`] - Batch result aggregation
//! - [`coordinator`] - Task owning all queue state
//! - [`worker`] - Acquire-then-ingest execution for one item
//! - [`control`] - Caller operations (enqueue, retry, clear, ...)
//! - [`lifecycle`] - Shutdown coordination

mod batch;
mod control;
mod coordinator;
mod lifecycle;
mod queue;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::acquisition::AcquisitionChain;
use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sources::SourceRegistry;
use crate::types::Event;

use coordinator::{Command, Coordinator};
use queue::SchedulerState;
use worker::WorkerContext;

/// Buffered caller commands before `send` waits
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader handle (cloneable - clones talk to the same coordinator)
#[derive(Clone)]
pub struct ManifestDownloader {
    commands: mpsc::Sender<Command>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    config: Arc<Config>,
    target_dir: std::path::PathBuf,
}

impl ManifestDownloader {
    /// Create a downloader with the default collaborators
    ///
    /// Validates the configuration, creates the temp and target directories
    /// and spawns the coordinator task. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the configuration is invalid
    /// - [`Error::InstallPathNotFound`] when `download.target_dir` is unset
    pub async fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(config, collaborators).await
    }

    /// Create a downloader with caller-supplied collaborators
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use manifest_dl::{
    ///     Collaborators, Config, ConfiguredInstallPath, ItemId, ManifestDownloader, SourceConfig,
    /// };
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let mut config = Config::default();
    ///     config.sources = vec![SourceConfig::new("primary", "https://example.com/{id}.lua")];
    ///
    ///     let collaborators = Collaborators::from_config(&config)
    ///         .with_install_path(ConfiguredInstallPath::new("/opt/plugin/scripts"));
    ///     let downloader = ManifestDownloader::with_collaborators(config, collaborators).await?;
    ///
    ///     downloader.enqueue(ItemId(730), Some("Counter-Strike 2".into())).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let target_dir = collaborators
            .install_path
            .resolve()
            .ok_or(Error::InstallPathNotFound)?;

        for (label, dir) in [
            ("temp", &config.download.temp_dir),
            ("target", &target_dir),
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                ))
            })?;
        }

        let workers = Arc::new(WorkerContext {
            chain: AcquisitionChain::new(&config.network)?,
            sources: Arc::new(SourceRegistry::from_config(&config.sources)),
            extractor: Arc::clone(&collaborators.extractor),
            temp_dir: config.download.temp_dir.clone(),
            target_dir: target_dir.clone(),
            keep_payloads: config.download.keep_payloads,
            payload_dir: config.download.payload_dir.clone(),
        });

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (commands, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let state = SchedulerState::new(
            config.download.max_concurrent_downloads,
            config.download.deferred_start,
        );
        let coordinator = Coordinator::new(
            state,
            commands_rx,
            event_tx.clone(),
            workers,
            Arc::clone(&collaborators.names),
        );
        tokio::spawn(coordinator.run());

        tracing::info!(
            sources = config.sources.len(),
            max_concurrent = config.download.max_concurrent_downloads,
            deferred_start = config.download.deferred_start,
            target_dir = ?target_dir,
            "downloader initialized"
        );

        Ok(Self {
            commands,
            event_tx,
            config: Arc::new(config),
            target_dir,
        })
    }

    /// Subscribe to queue events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events it receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration the downloader was built with
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Directory scripts are installed into
    pub fn target_dir(&self) -> &std::path::Path {
        &self.target_dir
    }

    /// Send a command and wait for the coordinator's reply
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::ShuttingDown)?;
        rx.await.map_err(|_| Error::ShuttingDown)?
    }
}
