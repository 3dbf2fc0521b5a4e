//! Managing scripts after they were installed by the queue

mod common;

use common::{
    BATCH_TIMEOUT, PRIMARY, create_mirror_downloader, patched_script, pinned_script, serve_bytes,
    wait_for_batch,
};
use manifest_dl::library;
use manifest_dl::{Error, ItemId, PatchOutcome, ScriptState};
use wiremock::MockServer;

const MARKER: &str = "--LUATOOLS: UPDATES DISABLED!";

#[tokio::test]
async fn installed_scripts_can_be_toggled_and_repatched() {
    let server = MockServer::start().await;
    for id in [10, 20] {
        serve_bytes(&server, &PRIMARY.path_for(id), pinned_script(id).into_bytes()).await;
    }
    let (downloader, _temp) = create_mirror_downloader(&server, &[&PRIMARY], |_| {}).await;
    let mut events = downloader.subscribe();

    downloader.enqueue(ItemId(10), None).await.unwrap();
    downloader.enqueue(ItemId(20), None).await.unwrap();
    let (_, summary) = wait_for_batch(&mut events, BATCH_TIMEOUT).await;
    assert_eq!(summary.completed_items.len(), 2);

    let target = downloader.target_dir().to_path_buf();
    let installed = library::list_installed(&target).unwrap();
    let ids: Vec<_> = installed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![ItemId(10), ItemId(20)]);
    assert!(installed.iter().all(|s| s.enabled && s.state == ScriptState::Normal));

    // disable 20, then pin its manifests again
    let moved = library::set_enabled(&target, ItemId(20), false).unwrap();
    assert!(moved.ends_with("20.lua.disabled"));
    assert_eq!(
        library::set_updates_disabled(&target, ItemId(20), true).unwrap(),
        PatchOutcome::DisabledModified
    );
    let text = std::fs::read_to_string(&moved).unwrap();
    assert!(text.starts_with(MARKER));
    assert!(text.contains("\nsetManifestid(21, \"7432990000000001\")\n"));

    // re-patching is stable for both states
    let entries = library::repatch_all(&target).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].outcome, Ok(PatchOutcome::NormalNoChange));
    assert_eq!(entries[1].outcome, Ok(PatchOutcome::DisabledNoop));

    // back to normal: marker gone, pins commented out again
    library::set_enabled(&target, ItemId(20), true).unwrap();
    assert_eq!(
        library::set_updates_disabled(&target, ItemId(20), false).unwrap(),
        PatchOutcome::NormalModified
    );
    assert_eq!(
        std::fs::read_to_string(target.join("20.lua")).unwrap(),
        patched_script(20)
    );

    assert!(library::uninstall(&target, ItemId(10)).unwrap());
    assert!(!library::uninstall(&target, ItemId(10)).unwrap());
    assert!(matches!(
        library::set_enabled(&target, ItemId(10), true),
        Err(Error::NotFound(_))
    ));
}
