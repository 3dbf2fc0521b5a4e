//! Archive extraction
//!
//! Payloads that arrive as archives are unpacked into a scratch directory
//! whose lifetime is tied to the returned [`Extracted`] handle. ZIP is always
//! supported; 7z requires the `sevenz` feature and RAR is recognized only to
//! report it as unsupported.

#[cfg(feature = "sevenz")]
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
#[cfg(feature = "sevenz")]
pub use sevenz::SevenZipExtractor;
pub use shared::{ArchiveType, detect_archive_type, detect_archive_type_of_file, sniff_archive_type};
pub use zip::ZipExtractor;

use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Files extracted from one archive plus the scratch directory holding them
///
/// Dropping the handle deletes the scratch directory and every extracted file.
#[derive(Debug)]
pub struct Extracted {
    /// Extracted files (directories excluded), sorted by path
    pub files: Vec<PathBuf>,
    scratch: TempDir,
}

impl Extracted {
    /// Wrap extracted files and the scratch directory that owns them
    pub fn new(files: Vec<PathBuf>, scratch: TempDir) -> Self {
        Self { files, scratch }
    }

    /// Directory the files were extracted into
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }

    /// Delete the scratch directory now, reporting any failure
    pub fn cleanup(self) -> std::io::Result<()> {
        self.scratch.close()
    }
}

/// Archive extraction collaborator
///
/// Implementations report formats they cannot open as
/// [`ExtractionError::UnsupportedFormat`] rather than failing generically.
pub trait ArchiveExtractor: Send + Sync {
    /// Unpack `archive_path` and return the extracted files with their cleanup handle
    fn extract(&self, archive_path: &Path) -> Result<Extracted, ExtractionError>;
}

/// Default extractor backed by the `zip` crate (and `sevenz-rust` when enabled)
#[derive(Clone, Debug, Default)]
pub struct BuiltinExtractor {
    scratch_parent: Option<PathBuf>,
}

impl BuiltinExtractor {
    /// Create an extractor that places scratch directories in the system temp dir
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor that places scratch directories below `dir`
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_parent: Some(dir.into()),
        }
    }

    fn scratch_dir(&self, archive_path: &Path) -> Result<TempDir, ExtractionError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("extract-");
        let result = match &self.scratch_parent {
            Some(parent) => {
                std::fs::create_dir_all(parent).and_then(|_| builder.tempdir_in(parent))
            }
            None => builder.tempdir(),
        };
        result.map_err(|e| {
            shared::failed(
                archive_path,
                format!("failed to create scratch directory: {}", e),
            )
        })
    }
}

impl ArchiveExtractor for BuiltinExtractor {
    fn extract(&self, archive_path: &Path) -> Result<Extracted, ExtractionError> {
        let archive_type = detect_archive_type_of_file(archive_path)
            .map_err(|e| shared::failed(archive_path, format!("failed to read archive: {}", e)))?
            .ok_or_else(|| ExtractionError::UnsupportedFormat {
                archive: archive_path.to_path_buf(),
                format: "unknown".to_string(),
            })?;

        info!(?archive_path, ?archive_type, "dispatching extraction");

        let scratch = self.scratch_dir(archive_path)?;
        let files = match archive_type {
            ArchiveType::Zip => ZipExtractor::try_extract(archive_path, scratch.path())?,
            #[cfg(feature = "sevenz")]
            ArchiveType::SevenZip => SevenZipExtractor::try_extract(archive_path, scratch.path())?,
            #[cfg(not(feature = "sevenz"))]
            ArchiveType::SevenZip => {
                return Err(ExtractionError::UnsupportedFormat {
                    archive: archive_path.to_path_buf(),
                    format: archive_type.name().to_string(),
                });
            }
            ArchiveType::Rar => {
                return Err(ExtractionError::UnsupportedFormat {
                    archive: archive_path.to_path_buf(),
                    format: archive_type.name().to_string(),
                });
            }
        };

        debug!(?archive_path, count = files.len(), "extracted files");
        Ok(Extracted::new(files, scratch))
    }
}

/// Whether this build can extract the given archive type
pub fn is_supported(archive_type: ArchiveType) -> bool {
    match archive_type {
        ArchiveType::Zip => true,
        ArchiveType::SevenZip => cfg!(feature = "sevenz"),
        ArchiveType::Rar => false,
    }
}
