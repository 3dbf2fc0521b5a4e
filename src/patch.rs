//! Manifest script patch engine
//!
//! A script's state is derived from its content every time, never stored:
//! - no `addappid` line at all: [`ScriptState::Unpatchable`]
//! - the updates-disabled marker is present: [`ScriptState::UpdatesDisabled`],
//!   every `setManifestid` line must be active
//! - otherwise [`ScriptState::Normal`], every `setManifestid` line must be
//!   commented out so the manifest version is not pinned
//!
//! Both transforms only touch lines that are not already in the target form,
//! so applying them repeatedly is stable.

use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Keyword of the line that must exist for a script to be usable
pub const REQUIRED_DIRECTIVE: &str = "addappid";

/// Keyword of the manifest pinning directive
pub const PIN_DIRECTIVE: &str = "setManifestid";

/// Lua line comment prefix
pub const COMMENT_PREFIX: &str = "--";

/// Sentinel line that keeps pinning directives active
pub const UPDATES_DISABLED_MARKER: &str = "--LUATOOLS: UPDATES DISABLED!";

/// Extension of installed scripts
pub const ARTIFACT_EXTENSION: &str = "lua";

/// Suffix appended to a script's file name to disable it
pub const DISABLED_SUFFIX: &str = "disabled";

/// State of a script, derived from its content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptState {
    /// Required directive missing
    Unpatchable,
    /// Disable marker present
    UpdatesDisabled,
    /// Regular script
    Normal,
}

/// Result of applying the patch engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOutcome {
    /// Required directive missing, nothing changed
    Unpatchable,
    /// Updates disabled and pin lines already active
    DisabledNoop,
    /// Updates disabled and commented pin lines were re-activated
    DisabledModified,
    /// Pin lines were commented out
    NormalModified,
    /// No active pin lines to comment out
    NormalNoChange,
}

impl PatchOutcome {
    /// True when the content was rewritten
    pub fn is_modified(&self) -> bool {
        matches!(self, Self::DisabledModified | Self::NormalModified)
    }

    /// True when the script may be installed
    pub fn is_installable(&self) -> bool {
        !matches!(self, Self::Unpatchable)
    }
}

impl std::fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unpatchable => "unpatchable",
            Self::DisabledNoop => "disabled-noop",
            Self::DisabledModified => "disabled-modified",
            Self::NormalModified => "normal-modified",
            Self::NormalNoChange => "normal-nochange",
        };
        f.write_str(s)
    }
}

/// Defect reported for unpatchable scripts
pub fn unpatchable_reason() -> String {
    format!("missing {} directive", REQUIRED_DIRECTIVE)
}

/// One manifest script as an ordered list of lines
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptFile {
    /// Item the script belongs to
    pub id: ItemId,
    lines: Vec<String>,
    crlf: bool,
    trailing_newline: bool,
}

impl ScriptFile {
    /// Split script text into lines, remembering line ending style
    pub fn parse(id: ItemId, text: &str) -> Self {
        Self {
            id,
            lines: text.lines().map(str::to_string).collect(),
            crlf: text.contains("\r\n"),
            trailing_newline: text.ends_with('\n'),
        }
    }

    /// Script lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Render back to text with the original line ending style
    pub fn render(&self) -> String {
        let ending = if self.crlf { "\r\n" } else { "\n" };
        let mut text = self.lines.join(ending);
        if self.trailing_newline && !self.lines.is_empty() {
            text.push_str(ending);
        }
        text
    }

    /// Whether any line is an `addappid` directive
    pub fn has_required_directive(&self) -> bool {
        self.lines
            .iter()
            .any(|l| l.trim_start().starts_with(REQUIRED_DIRECTIVE))
    }

    /// Whether the updates-disabled marker is present
    pub fn updates_disabled(&self) -> bool {
        self.lines.iter().any(|l| l.trim() == UPDATES_DISABLED_MARKER)
    }

    /// Whether any `setManifestid` line is active (not commented out)
    pub fn has_active_pin_lines(&self) -> bool {
        self.lines.iter().any(|l| is_active_pin(l))
    }

    /// Classify the script from its current content
    pub fn state(&self) -> ScriptState {
        if !self.has_required_directive() {
            ScriptState::Unpatchable
        } else if self.updates_disabled() {
            ScriptState::UpdatesDisabled
        } else {
            ScriptState::Normal
        }
    }

    /// Apply the transform for the current state in place
    pub fn apply(&mut self) -> PatchOutcome {
        match self.state() {
            ScriptState::Unpatchable => PatchOutcome::Unpatchable,
            ScriptState::UpdatesDisabled => {
                let changed = self.rewrite(|line| {
                    is_commented_pin(line).then(|| uncomment(line))
                });
                if changed > 0 {
                    debug!(item_id = %self.id, lines = changed, "re-activated pin lines");
                    PatchOutcome::DisabledModified
                } else {
                    PatchOutcome::DisabledNoop
                }
            }
            ScriptState::Normal => {
                let changed = self.rewrite(|line| is_active_pin(line).then(|| comment(line)));
                if changed > 0 {
                    debug!(item_id = %self.id, lines = changed, "commented out pin lines");
                    PatchOutcome::NormalModified
                } else {
                    PatchOutcome::NormalNoChange
                }
            }
        }
    }

    /// Add or remove the updates-disabled marker
    ///
    /// The marker is inserted as the first line. Returns true when the content
    /// changed. The caller re-applies the patch afterwards.
    pub fn set_updates_disabled(&mut self, disabled: bool) -> bool {
        let present = self.updates_disabled();
        if disabled && !present {
            self.lines.insert(0, UPDATES_DISABLED_MARKER.to_string());
            if self.lines.len() == 1 {
                self.trailing_newline = true;
            }
            true
        } else if !disabled && present {
            self.lines.retain(|l| l.trim() != UPDATES_DISABLED_MARKER);
            true
        } else {
            false
        }
    }

    fn rewrite(&mut self, f: impl Fn(&str) -> Option<String>) -> usize {
        let mut changed = 0;
        for line in &mut self.lines {
            if let Some(new_line) = f(line.as_str()) {
                *line = new_line;
                changed += 1;
            }
        }
        changed
    }
}

/// Rewritten script text plus the classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patched {
    /// Outcome tag
    pub outcome: PatchOutcome,
    /// Script text after the transform (unchanged when not modified)
    pub text: String,
}

/// Apply the patch engine to script text
pub fn patch_text(id: ItemId, text: &str) -> Patched {
    let mut script = ScriptFile::parse(id, text);
    let outcome = script.apply();
    let text = if outcome.is_modified() {
        script.render()
    } else {
        text.to_string()
    };
    Patched { outcome, text }
}

/// Patch a script on disk, writing it back only when the content changed
pub fn patch_file(id: ItemId, path: &Path) -> std::io::Result<PatchOutcome> {
    let original = std::fs::read_to_string(path)?;
    let patched = patch_text(id, &original);
    if patched.text != original {
        std::fs::write(path, &patched.text)?;
    }
    Ok(patched.outcome)
}

fn split_indent(line: &str) -> (&str, &str) {
    let body = line.trim_start();
    (&line[..line.len() - body.len()], body)
}

fn is_active_pin(line: &str) -> bool {
    line.trim_start().starts_with(PIN_DIRECTIVE)
}

fn is_commented_pin(line: &str) -> bool {
    line.trim_start()
        .strip_prefix(COMMENT_PREFIX)
        .is_some_and(|rest| rest.trim_start().starts_with(PIN_DIRECTIVE))
}

fn comment(line: &str) -> String {
    let (indent, body) = split_indent(line);
    format!("{}{}{}", indent, COMMENT_PREFIX, body)
}

fn uncomment(line: &str) -> String {
    let (indent, body) = split_indent(line);
    let rest = body.strip_prefix(COMMENT_PREFIX).unwrap_or(body);
    format!("{}{}", indent, rest.trim_start())
}
