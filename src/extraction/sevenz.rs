use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::shared::{collect_files, failed, validate_extracted_paths};

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract a 7z archive into `dest_path`
    pub fn try_extract(
        archive_path: &Path,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        debug!(?archive_path, ?dest_path, "attempting 7z extraction");

        std::fs::create_dir_all(dest_path)
            .map_err(|e| failed(archive_path, format!("failed to create destination: {}", e)))?;

        sevenz_rust::decompress_file(archive_path, dest_path).map_err(|e| {
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("password") || err_str.contains("encrypted") {
                failed(archive_path, "archive is password protected")
            } else {
                failed(archive_path, format!("failed to extract 7z archive: {}", e))
            }
        })?;

        // sevenz-rust writes entries itself, so containment is checked afterwards
        validate_extracted_paths(dest_path, archive_path)?;

        let extracted_files = collect_files(dest_path, archive_path)?;

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );
        Ok(extracted_files)
    }
}
