//! Error types for manifest-dl
//!
//! Errors are layered the same way failures are absorbed:
//! - [`SourceFailureReason`] - one failed attempt against one source, recovered by the chain
//! - [`AcquisitionError`] - the chain as a whole could not produce a payload
//! - [`ExtractionError`] / [`IngestError`] - a payload could not be turned into artifacts
//! - [`Error`] - crate-wide error returned by the public API

use crate::types::ItemId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manifest-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manifest-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources[0].url_template")
        key: Option<String>,
    },

    /// Acquisition chain failure
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Payload ingestion failure
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Item is already queued or downloading
    #[error("item {0} is already queued or downloading")]
    Duplicate(ItemId),

    /// Item not found in the queue
    #[error("item {0} not found")]
    NotFound(ItemId),

    /// Cannot perform operation in current state
    #[error("cannot {operation} item {id} in state {current_state}")]
    InvalidState {
        /// The item that is in an invalid state for the operation
        id: ItemId,
        /// The operation that was attempted (e.g., "retry", "remove")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// The install path resolver could not locate the target directory
    #[error("target directory not found")]
    InstallPathNotFound,

    /// Shutdown in progress - not accepting commands
    #[error("shutdown in progress: not accepting commands")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Why a single source attempt did not produce a payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailureReason {
    /// The source answered with its configured "not available" status
    #[error("not available (HTTP {status})")]
    NotAvailable {
        /// Status code returned by the source
        status: u16,
    },

    /// The source answered with a status that is neither success nor "not available"
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// Status code returned by the source
        status: u16,
    },

    /// Connect, read or write timed out
    #[error("timed out while {stage}")]
    Timeout {
        /// Which phase timed out ("connecting", "reading body", "writing payload")
        stage: &'static str,
    },

    /// Connection could not be established or was dropped
    #[error("connection failed: {0}")]
    Connection(String),

    /// The payload was received but is not a supported artifact
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Local temporary storage failed
    #[error("temporary storage error: {0}")]
    Io(String),
}

/// One failed source attempt, kept for the aggregated chain failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Source name
    pub source: String,
    /// 1-based position of the source in the configured list
    pub position: usize,
    /// What went wrong
    pub reason: SourceFailureReason,
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{}): {}", self.source, self.position, self.reason)
    }
}

/// Acquisition chain errors
#[derive(Debug, Clone, Error)]
pub enum AcquisitionError {
    /// No source is enabled, nothing was attempted
    #[error("no enabled sources configured")]
    NoEnabledSources,

    /// Every enabled source was tried and none produced a valid payload
    #[error("all {} source(s) failed: {}", .attempts.len(), join_failures(.attempts))]
    ChainExhausted {
        /// Per-source failure reasons, in attempt order
        attempts: Vec<SourceFailure>,
    },
}

fn join_failures(attempts: &[SourceFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Archive format is recognized but not supported by this build
    #[error("unsupported archive format {format} for {archive}")]
    UnsupportedFormat {
        /// The archive that could not be opened
        archive: PathBuf,
        /// Format name (e.g. "7z", "rar")
        format: String,
    },

    /// Archive could not be read or unpacked
    #[error("extraction failed for {archive}: {reason}")]
    Failed {
        /// The archive that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },
}

/// Ingest errors (payload to installed artifacts)
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload format cannot be ingested
    #[error("unsupported payload format: {0}")]
    UnsupportedFormat(String),

    /// Archive extraction failed
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// No candidate file named after the item was found
    #[error("no installable artifacts found for item {id}")]
    NoInstallableArtifacts {
        /// The item being ingested
        id: ItemId,
    },

    /// Writing an artifact into the target directory failed
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// The artifact path that could not be written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Reading a candidate artifact failed
    #[error("failed to read {path}: {reason}")]
    ReadFailed {
        /// The candidate path that could not be read
        path: PathBuf,
        /// The reason the read failed
        reason: String,
    },
}
