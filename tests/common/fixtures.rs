//! Script and archive fixtures

use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A patchable script pinning two depots
pub fn pinned_script(id: u64) -> String {
    format!(
        "-- manifest for {id}\n\
         addappid({id})\n\
         addappid({next}, 1, \"deadbeef\")\n\
         setManifestid({next}, \"7432990000000001\")\n\
         setManifestid({next2}, \"7432990000000002\", 0)\n",
        next = id + 1,
        next2 = id + 2,
    )
}

/// `pinned_script` after patching
pub fn patched_script(id: u64) -> String {
    format!(
        "-- manifest for {id}\n\
         addappid({id})\n\
         addappid({next}, 1, \"deadbeef\")\n\
         --setManifestid({next}, \"7432990000000001\")\n\
         --setManifestid({next2}, \"7432990000000002\", 0)\n",
        next = id + 1,
        next2 = id + 2,
    )
}

/// A script with no `addappid` line
pub fn unpatchable_script(id: u64) -> String {
    format!("-- placeholder\nsetManifestid({id}, \"1\")\n")
}

/// Build an in-memory zip archive from `(name, content)` entries
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Serve `body` at `path`
pub async fn serve_bytes(server: &MockServer, at: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Answer `path` with a bare status code
pub async fn serve_status(server: &MockServer, at: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
