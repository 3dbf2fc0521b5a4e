//! # manifest-dl
//!
//! Backend library that fetches per-application Lua manifest scripts from an
//! ordered list of mirrors, patches them and installs them into a plugin
//! directory.
//!
//! ## Design Philosophy
//!
//! manifest-dl is designed to be:
//! - **Source-agnostic** - Mirrors are plain URL templates tried in order until one delivers
//! - **Bounded** - At most `max_concurrent_downloads` items are in flight at once
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use manifest_dl::{Config, Event, ItemId, ManifestDownloader, SourceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.sources = vec![
//!         SourceConfig::new("primary", "https://mirror-a.example.com/{id}.lua"),
//!         SourceConfig::new("fallback", "https://mirror-b.example.com/files/{id}.zip"),
//!     ];
//!     config.download.target_dir = Some("/opt/plugin/scripts".into());
//!
//!     let downloader = ManifestDownloader::new(config).await?;
//!
//!     // Subscribe before enqueueing so no event is missed
//!     let mut events = downloader.subscribe();
//!
//!     downloader.enqueue(ItemId(730), None).await?;
//!     downloader.enqueue(ItemId(570), Some("Dota 2".into())).await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let Event::BatchComplete(summary) = event {
//!             println!("{} item(s) finished", summary.total());
//!             break;
//!         }
//!     }
//!
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Multi-source acquisition chain
pub mod acquisition;
/// Pluggable collaborators (install path, archive extraction, display names)
pub mod collaborators;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Payload ingest into the target directory
pub mod ingest;
/// Management of already installed scripts
pub mod library;
/// Manifest script patch engine
pub mod patch;
/// Source registry built from configuration
pub mod sources;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use acquisition::{AcquisitionChain, Payload, PayloadFormat};
pub use collaborators::{
    Collaborators, ConfiguredInstallPath, InstallPathResolver, NameResolver, NoNameResolver,
};
pub use config::{Config, DownloadConfig, NetworkConfig, SourceConfig};
pub use downloader::ManifestDownloader;
pub use error::{
    AcquisitionError, Error, ExtractionError, IngestError, Result, SourceFailure,
    SourceFailureReason,
};
pub use extraction::{ArchiveExtractor, BuiltinExtractor, Extracted};
pub use patch::{PatchOutcome, ScriptFile, ScriptState};
pub use types::{
    BatchSummary, DownloadItem, Event, IngestReport, ItemId, QueueSnapshot, SkippedArtifact,
    Status, TransferStats,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use manifest_dl::{Config, ManifestDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut config = Config::default();
///     config.download.target_dir = Some("/opt/plugin/scripts".into());
///     let downloader = ManifestDownloader::new(config).await?;
///
///     // Keep processing until the process is asked to stop
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: ManifestDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "no SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "no SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "no signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
