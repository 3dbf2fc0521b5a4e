//! Test configuration helpers: mock mirrors and throwaway directories

use tempfile::TempDir;
use wiremock::MockServer;
use manifest_dl::{Config, ManifestDownloader, SourceConfig};

/// One mock mirror serving `/<prefix>/{id}.<ext>`
pub struct Mirror {
    /// Source name used in configuration and error messages
    pub name: &'static str,
    /// Path prefix under the mock server
    pub prefix: &'static str,
    /// Extension used in the URL template
    pub extension: &'static str,
}

impl Mirror {
    /// URL template for this mirror on `server`
    pub fn template(&self, server: &MockServer) -> String {
        format!("{}/{}/{{id}}.{}", server.uri(), self.prefix, self.extension)
    }

    /// Request path for `id`
    pub fn path_for(&self, id: u64) -> String {
        format!("/{}/{}.{}", self.prefix, id, self.extension)
    }
}

/// Primary mirror serving plain scripts
pub const PRIMARY: Mirror = Mirror {
    name: "primary",
    prefix: "lua",
    extension: "lua",
};

/// Fallback mirror serving zip bundles
pub const BUNDLES: Mirror = Mirror {
    name: "bundles",
    prefix: "bundles",
    extension: "zip",
};

/// Config with one source per mirror (in order) and every directory inside `root`
pub fn mirror_config(server: &MockServer, mirrors: &[&Mirror], root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.sources = mirrors
        .iter()
        .map(|m| SourceConfig::new(m.name, m.template(server)))
        .collect();
    config.download.temp_dir = root.join("temp");
    config.download.target_dir = Some(root.join("plugin"));
    config.download.payload_dir = root.join("payloads");
    config
}

/// Create a downloader against `mirrors`, returning the temp dir that must be kept alive
pub async fn create_mirror_downloader(
    server: &MockServer,
    mirrors: &[&Mirror],
    tweak: impl FnOnce(&mut Config),
) -> (ManifestDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = mirror_config(server, mirrors, temp_dir.path());
    tweak(&mut config);
    let downloader = ManifestDownloader::new(config)
        .await
        .unwrap_or_else(|e| panic!("failed to create downloader: {e}"));
    (downloader, temp_dir)
}
