//! Operations over scripts already installed in the target directory
//!
//! A script is enabled as `<id>.lua` and disabled as `<id>.lua.disabled`.
//! Everything here is synchronous file I/O; call it from `spawn_blocking`
//! when on the async runtime.

use crate::error::{Error, Result};
use crate::ingest::{disabled_variant, write_atomic};
use crate::patch::{
    self, ARTIFACT_EXTENSION, DISABLED_SUFFIX, PatchOutcome, ScriptFile, ScriptState,
};
use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A script found in the target directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledScript {
    /// Item the script belongs to
    pub id: ItemId,
    /// Current location
    pub path: PathBuf,
    /// False for the `.disabled` variant
    pub enabled: bool,
    /// State derived from the content
    pub state: ScriptState,
}

/// Result of re-applying the patch engine to one installed script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepatchEntry {
    /// Item the script belongs to
    pub id: ItemId,
    /// Script location
    pub path: PathBuf,
    /// Patch outcome, or the I/O error that prevented patching
    pub outcome: std::result::Result<PatchOutcome, String>,
}

/// List every installed script, enabled or not, ordered by id
///
/// A missing target directory is treated as empty.
pub fn list_installed(target_dir: &Path) -> Result<Vec<InstalledScript>> {
    let entries = match std::fs::read_dir(target_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut scripts = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some((id, enabled)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_script_name)
        else {
            continue;
        };

        let state = match std::fs::read_to_string(&path) {
            Ok(text) => ScriptFile::parse(id, &text).state(),
            Err(e) => {
                warn!(path = ?path, error = %e, "skipping unreadable script");
                continue;
            }
        };
        scripts.push(InstalledScript {
            id,
            path,
            enabled,
            state,
        });
    }

    scripts.sort_by(|a, b| a.id.cmp(&b.id).then(b.enabled.cmp(&a.enabled)));
    Ok(scripts)
}

/// Enable or disable an installed script by renaming it
///
/// Returns the script's new location. Asking for the state the script is
/// already in is a no-op.
pub fn set_enabled(target_dir: &Path, id: ItemId, enabled: bool) -> Result<PathBuf> {
    let active = target_dir.join(id.artifact_file_name());
    let disabled = disabled_variant(&active);

    let (from, to) = if enabled {
        (disabled, active)
    } else {
        (active, disabled)
    };

    if to.exists() {
        debug!(item_id = %id, enabled, "script already in requested state");
        return Ok(to);
    }
    if !from.exists() {
        return Err(Error::NotFound(id));
    }

    std::fs::rename(&from, &to)?;
    info!(item_id = %id, enabled, "toggled script");
    Ok(to)
}

/// Remove both variants of a script; returns false when nothing was installed
pub fn uninstall(target_dir: &Path, id: ItemId) -> Result<bool> {
    let active = target_dir.join(id.artifact_file_name());
    let mut removed = false;

    for path in [disabled_variant(&active), active] {
        match std::fs::remove_file(&path) {
            Ok(()) => removed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    if removed {
        info!(item_id = %id, "uninstalled script");
    }
    Ok(removed)
}

/// Add or remove the updates-disabled marker and re-patch the script
///
/// Works on whichever variant is installed. Unpatchable scripts are left
/// untouched and reported as an invalid state.
pub fn set_updates_disabled(target_dir: &Path, id: ItemId, disabled: bool) -> Result<PatchOutcome> {
    let path = locate(target_dir, id).ok_or(Error::NotFound(id))?;
    let original = std::fs::read_to_string(&path)?;
    let mut script = ScriptFile::parse(id, &original);

    if script.state() == ScriptState::Unpatchable {
        return Err(Error::InvalidState {
            id,
            operation: "toggle updates for".to_string(),
            current_state: "unpatchable".to_string(),
        });
    }

    script.set_updates_disabled(disabled);
    let outcome = script.apply();
    let rendered = script.render();
    if rendered != original {
        write_atomic(&path, &rendered)?;
    }

    info!(item_id = %id, updates_disabled = disabled, %outcome, "updated script");
    Ok(outcome)
}

/// Re-apply the patch engine to every installed script
///
/// One failing file does not stop the others; its error is kept in the entry.
pub fn repatch_all(target_dir: &Path) -> Result<Vec<RepatchEntry>> {
    let scripts = list_installed(target_dir)?;
    let mut entries = Vec::with_capacity(scripts.len());

    for script in scripts {
        let outcome = patch::patch_file(script.id, &script.path).map_err(|e| {
            warn!(path = ?script.path, error = %e, "failed to re-patch script");
            e.to_string()
        });
        if let Ok(outcome) = &outcome {
            debug!(item_id = %script.id, %outcome, "re-patched script");
        }
        entries.push(RepatchEntry {
            id: script.id,
            path: script.path,
            outcome,
        });
    }

    let modified = entries
        .iter()
        .filter(|e| e.outcome.as_ref().is_ok_and(|o| o.is_modified()))
        .count();
    info!(scripts = entries.len(), modified, "re-patched installed scripts");
    Ok(entries)
}

fn locate(target_dir: &Path, id: ItemId) -> Option<PathBuf> {
    let active = target_dir.join(id.artifact_file_name());
    if active.is_file() {
        return Some(active);
    }
    let disabled = disabled_variant(&active);
    disabled.is_file().then_some(disabled)
}

/// `730.lua` -> (730, true), `730.lua.disabled` -> (730, false)
fn parse_script_name(name: &str) -> Option<(ItemId, bool)> {
    let (name, enabled) = match name
        .strip_suffix(DISABLED_SUFFIX)
        .and_then(|n| n.strip_suffix('.'))
    {
        Some(stripped) => (stripped, false),
        None => (name, true),
    };
    let stem = name
        .strip_suffix(ARTIFACT_EXTENSION)
        .and_then(|n| n.strip_suffix('.'))?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().map(|id| (ItemId(id), enabled))
}
