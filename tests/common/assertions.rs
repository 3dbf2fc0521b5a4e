//! Custom test assertions for integration tests

use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use manifest_dl::{BatchSummary, Event, ItemId};

/// Default time a test waits for a batch to finish
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Collect events until the next batch summary
///
/// Panics on timeout or when the event channel closes.
pub async fn wait_for_batch(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
) -> (Vec<Event>, BatchSummary) {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::BatchComplete(summary)) => return summary,
                Ok(other) => seen.push(other),
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await;

    match result {
        Ok(summary) => (seen, summary),
        Err(_) => panic!("timed out after {timeout:?} waiting for batch completion"),
    }
}

/// Assert the installed script for `id` has exactly `expected` as content
pub fn assert_installed(target_dir: &Path, id: ItemId, expected: &str) {
    let path = target_dir.join(id.artifact_file_name());
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("{} not installed: {e}", path.display()));
    assert_eq!(content, expected, "unexpected content in {}", path.display());
}

/// Assert nothing is installed for `id`
pub fn assert_not_installed(target_dir: &Path, id: ItemId) {
    let path = target_dir.join(id.artifact_file_name());
    assert!(!path.exists(), "{} should not exist", path.display());
}

/// Assert temporary storage holds nothing but the (empty) extraction scratch parent
pub fn assert_temp_clean(temp_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(temp_dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_name() == "extract" {
            let leftovers = std::fs::read_dir(&path).map(|d| d.count()).unwrap_or(0);
            assert_eq!(leftovers, 0, "scratch directories left in {}", path.display());
        } else {
            panic!("leftover in temporary storage: {}", path.display());
        }
    }
}
