//! Payload ingest
//!
//! Turns an acquired payload into installed scripts: archives are extracted,
//! candidates named after the item are patched, unpatchable ones are skipped
//! and the rest are written into the target directory.

use crate::acquisition::{Payload, PayloadFormat};
use crate::error::IngestError;
use crate::extraction::{ArchiveExtractor, Extracted};
use crate::patch::{self, ARTIFACT_EXTENSION, DISABLED_SUFFIX, PatchOutcome};
use crate::types::{IngestReport, ItemId, SkippedArtifact};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Install the artifacts contained in `payload` into `target_dir`
///
/// Runs synchronously; callers on the async runtime use `spawn_blocking`.
/// Extraction scratch space is released on every return path.
pub fn ingest(
    payload: &Payload,
    id: ItemId,
    display_name: &str,
    target_dir: &Path,
    extractor: &dyn ArchiveExtractor,
) -> Result<IngestReport, IngestError> {
    let (candidates, extracted) = match payload.format {
        PayloadFormat::Script => (vec![payload.path.clone()], None),
        PayloadFormat::Archive(_) => {
            let extracted = extractor.extract(&payload.path)?;
            let candidates = extracted
                .files
                .iter()
                .filter(|f| is_candidate(f, id))
                .cloned()
                .collect::<Vec<_>>();
            (candidates, Some(extracted))
        }
    };

    if candidates.is_empty() {
        warn!(item_id = %id, payload = ?payload.path, "payload contains no script for item");
        return Err(IngestError::NoInstallableArtifacts { id });
    }

    let mut report = IngestReport::default();
    let mut outcome = None;

    for candidate in &candidates {
        let label = candidate_label(candidate, extracted.as_ref());
        let text = std::fs::read_to_string(candidate).map_err(|e| IngestError::ReadFailed {
            path: candidate.clone(),
            reason: e.to_string(),
        })?;

        let patched = patch::patch_text(id, &text);
        if !patched.outcome.is_installable() {
            warn!(item_id = %id, artifact = %label, "skipping unpatchable artifact");
            report.skipped.push(SkippedArtifact {
                file_name: label,
                reason: patch::unpatchable_reason(),
            });
            continue;
        }

        if outcome.is_some() {
            debug!(item_id = %id, artifact = %label, "script already installed, ignoring");
            continue;
        }

        let installed = install_script(target_dir, id, &patched.text)?;
        debug!(item_id = %id, path = ?installed, outcome = %patched.outcome, "installed script");
        report.installed.push(id.artifact_file_name());
        outcome = Some(patched.outcome);
    }

    if let Some(extracted) = extracted
        && let Err(e) = extracted.cleanup()
    {
        warn!(item_id = %id, error = %e, "failed to remove extraction scratch directory");
    }

    report.message = summarize(display_name, &report, outcome);
    info!(
        item_id = %id,
        installed = report.installed.len(),
        skipped = report.skipped.len(),
        "ingest finished"
    );
    Ok(report)
}

/// Atomically write `text` as `<target_dir>/<id>.lua`
///
/// The content goes to a temporary sibling first and is renamed into place;
/// a same-named disabled variant is removed afterwards.
pub(crate) fn install_script(
    target_dir: &Path,
    id: ItemId,
    text: &str,
) -> Result<PathBuf, IngestError> {
    let target = target_dir.join(id.artifact_file_name());
    let write_failed = |reason: String| IngestError::WriteFailed {
        path: target.clone(),
        reason,
    };

    std::fs::create_dir_all(target_dir)
        .and_then(|_| write_atomic(&target, text))
        .map_err(|e| write_failed(e.to_string()))?;

    let disabled = disabled_variant(&target);
    match std::fs::remove_file(&disabled) {
        Ok(()) => debug!(path = ?disabled, "removed disabled variant"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?disabled, error = %e, "failed to remove disabled variant"),
    }

    Ok(target)
}

/// Replace `path` with `text` through a temporary sibling and a rename
pub(crate) fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropping the temp file on any error below removes the partial write
    let mut staged = tempfile::Builder::new()
        .prefix(".manifest-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    staged.write_all(text.as_bytes())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `<path>.disabled`
pub(crate) fn disabled_variant(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(DISABLED_SUFFIX);
    PathBuf::from(name)
}

fn is_candidate(path: &Path, id: ItemId) -> bool {
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s == id.to_string());
    let ext_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARTIFACT_EXTENSION));
    stem_matches && ext_matches
}

fn candidate_label(path: &Path, extracted: Option<&Extracted>) -> String {
    match extracted.and_then(|e| path.strip_prefix(e.root()).ok()) {
        Some(relative) => relative.to_string_lossy().replace('\\', "/"),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn summarize(display_name: &str, report: &IngestReport, outcome: Option<PatchOutcome>) -> String {
    match outcome {
        Some(outcome) => format!(
            "{}: installed {} ({})",
            display_name,
            report.installed.join(", "),
            outcome
        ),
        None => {
            let defects: Vec<_> = report
                .skipped
                .iter()
                .map(|s| format!("{} ({})", s.file_name, s.reason))
                .collect();
            format!("{}: skipped {}", display_name, defects.join(", "))
        }
    }
}
