//! Shared test helpers for creating ManifestDownloader instances in tests.

use crate::collaborators::Collaborators;
use crate::config::{Config, SourceConfig};
use crate::downloader::ManifestDownloader;
use crate::types::{BatchSummary, Event, ItemId};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// How long a test waits for a single event before failing
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// A patchable script with one pin line
pub(crate) fn script_for(id: u64) -> String {
    format!("addappid({id})\nsetManifestid({id}, \"5\")\n")
}

/// Config pointing at a single mock source, with every directory inside `root`
pub(crate) fn test_config(server: &MockServer, root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.sources = vec![SourceConfig::new(
        "mock",
        format!("{}/scripts/{{id}}.lua", server.uri()),
    )];
    config.download.temp_dir = root.join("temp");
    config.download.target_dir = Some(root.join("plugin"));
    config.download.payload_dir = root.join("payloads");
    config.download.max_concurrent_downloads = 3;
    config
}

/// Helper to create a test ManifestDownloader backed by `server`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    server: &MockServer,
    tweak: impl FnOnce(&mut Config),
) -> (ManifestDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(server, temp_dir.path());
    tweak(&mut config);
    let downloader = ManifestDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Same as [`create_test_downloader`] but with custom collaborators
pub(crate) async fn create_test_downloader_with(
    server: &MockServer,
    collaborators: impl FnOnce(Collaborators) -> Collaborators,
) -> (ManifestDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(server, temp_dir.path());
    let collaborators = collaborators(Collaborators::from_config(&config));
    let downloader = ManifestDownloader::with_collaborators(config, collaborators)
        .await
        .unwrap();
    (downloader, temp_dir)
}

/// Serve `body` for `id`, optionally after a delay
pub(crate) async fn mount_script(
    server: &MockServer,
    id: u64,
    body: &str,
    delay: Option<Duration>,
) {
    let mut template = ResponseTemplate::new(200).set_body_string(body);
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path(format!("/scripts/{id}.lua")))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Answer requests for `id` with a bare status code
pub(crate) async fn mount_status(server: &MockServer, id: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/scripts/{id}.lua")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Wait for the first event matching `pred`, failing the test on timeout
pub(crate) async fn wait_for(
    rx: &mut broadcast::Receiver<Event>,
    mut pred: impl FnMut(&Event) -> bool,
) -> Event {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Collect every event up to and including the next batch summary
pub(crate) async fn collect_batch(
    rx: &mut broadcast::Receiver<Event>,
) -> (Vec<Event>, BatchSummary) {
    let mut events = Vec::new();
    tokio::time::timeout(EVENT_TIMEOUT, async move {
        loop {
            match rx.recv().await.unwrap() {
                Event::BatchComplete(summary) => return (events, summary),
                other => events.push(other),
            }
        }
    })
    .await
    .expect("timed out waiting for batch completion")
}

/// Ids of the `Downloading` events in order
pub(crate) fn dispatch_order(events: &[Event]) -> Vec<ItemId> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Downloading { id } => Some(*id),
            _ => None,
        })
        .collect()
}
