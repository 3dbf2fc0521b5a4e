use crate::error::SourceFailureReason;
use crate::extraction::{ArchiveType, detect_archive_type, sniff_archive_type};
use crate::patch::ARTIFACT_EXTENSION;
use crate::types::TransferStats;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What kind of payload a source delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// A bare Lua manifest script
    Script,
    /// An archive expected to contain the script
    Archive(ArchiveType),
}

impl PayloadFormat {
    /// File extension the payload is stored under
    pub fn extension(&self) -> &'static str {
        match self {
            PayloadFormat::Script => ARTIFACT_EXTENSION,
            PayloadFormat::Archive(kind) => kind.name(),
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A validated payload sitting in temporary storage
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    /// Location of the payload (`<temp>/<id>.<ext>`)
    pub path: PathBuf,
    /// Detected format
    pub format: PayloadFormat,
    /// Transfer statistics of the successful attempt
    pub stats: TransferStats,
}

/// Classify a downloaded body
///
/// Archives are recognized by magic bytes only; a body named like an archive
/// without a signature is rejected. A name with an extension outside the
/// allowlist is rejected; a body with no usable name is treated as a script
/// and must therefore be UTF-8.
pub(crate) fn classify(
    head: &[u8],
    advertised_name: Option<&str>,
) -> Result<PayloadFormat, SourceFailureReason> {
    if let Some(kind) = sniff_archive_type(head) {
        return archive_format(kind);
    }

    let extension = advertised_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        None => Ok(PayloadFormat::Script),
        Some(ext) if ext == ARTIFACT_EXTENSION => Ok(PayloadFormat::Script),
        Some(ext) => match advertised_name.and_then(|n| detect_archive_type(Path::new(n))) {
            // archive bodies always carry a signature, checked above
            Some(kind) => Err(SourceFailureReason::InvalidPayload(format!(
                "body of {} payload has no archive signature",
                kind.name()
            ))),
            None => Err(SourceFailureReason::InvalidPayload(format!(
                "unsupported payload format .{}",
                ext
            ))),
        },
    }
}

fn archive_format(kind: ArchiveType) -> Result<PayloadFormat, SourceFailureReason> {
    match kind {
        ArchiveType::Zip | ArchiveType::SevenZip => Ok(PayloadFormat::Archive(kind)),
        ArchiveType::Rar => Err(SourceFailureReason::InvalidPayload(
            "unsupported payload format rar".to_string(),
        )),
    }
}
