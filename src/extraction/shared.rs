use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Archive type detected by signature or file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// ZIP archive (.zip), always supported
    Zip,
    /// 7-Zip archive (.7z), supported with the `sevenz` feature
    SevenZip,
    /// RAR archive (.rar), recognized but never extracted
    Rar,
}

impl ArchiveType {
    /// Short format name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveType::Zip => "zip",
            ArchiveType::SevenZip => "7z",
            ArchiveType::Rar => "rar",
        }
    }
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const SEVENZ_MAGIC: &[u8] = b"7z\xBC\xAF\x27\x1C";
const RAR_MAGIC: &[u8] = b"Rar!\x1A\x07";

/// Detect an archive type from the first bytes of a file
pub fn sniff_archive_type(head: &[u8]) -> Option<ArchiveType> {
    if head.starts_with(ZIP_MAGIC) || head.starts_with(ZIP_EMPTY_MAGIC) {
        Some(ArchiveType::Zip)
    } else if head.starts_with(SEVENZ_MAGIC) {
        Some(ArchiveType::SevenZip)
    } else if head.starts_with(RAR_MAGIC) {
        Some(ArchiveType::Rar)
    } else {
        None
    }
}

/// Detect archive type by file extension
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "zip" => Some(ArchiveType::Zip),
        "7z" => Some(ArchiveType::SevenZip),
        "rar" => Some(ArchiveType::Rar),
        _ => None,
    }
}

/// Detect archive type by signature, falling back to the extension
pub fn detect_archive_type_of_file(path: &Path) -> std::io::Result<Option<ArchiveType>> {
    let mut head = [0u8; 8];
    let mut file = std::fs::File::open(path)?;
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff_archive_type(&head[..filled]).or_else(|| detect_archive_type(path)))
}

/// Recursively collect all files (not directories) below `dir`
pub(crate) fn collect_files(dir: &Path, archive: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                visit_dir(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(dir, &mut files)
        .map_err(|e| failed(archive, format!("failed to list files: {}", e)))?;
    files.sort();
    Ok(files)
}

/// Check that every extracted entry resolved inside `dest_path`
pub(crate) fn validate_extracted_paths(
    dest_path: &Path,
    archive: &Path,
) -> Result<(), ExtractionError> {
    let canonical_dest = dest_path
        .canonicalize()
        .map_err(|e| failed(archive, format!("failed to canonicalize destination: {}", e)))?;

    for file in collect_files(dest_path, archive)? {
        let canonical = file
            .canonicalize()
            .map_err(|e| failed(archive, format!("failed to canonicalize extracted path: {}", e)))?;
        if !canonical.starts_with(&canonical_dest) {
            return Err(failed(
                archive,
                format!(
                    "path traversal detected: extracted file {:?} is outside destination",
                    canonical
                ),
            ));
        }
    }
    Ok(())
}

pub(crate) fn failed(archive: &Path, reason: impl Into<String>) -> ExtractionError {
    ExtractionError::Failed {
        archive: archive.to_path_buf(),
        reason: reason.into(),
    }
}
