//! Configuration types for manifest-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{path::PathBuf, time::Duration};

/// Placeholder substituted with the item id in source URL templates
pub const ID_PLACEHOLDER: &str = "{id}";

/// Upper bound for `max_concurrent_downloads`
pub const MAX_CONCURRENCY_LIMIT: usize = 10;

/// One network source in the ordered source list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Display name used in logs and failure reasons
    pub name: String,

    /// URL template containing the `{id}` placeholder
    pub url_template: String,

    /// Status code meaning "payload follows" (default: 200)
    #[serde(default = "default_success_code")]
    pub success_code: u16,

    /// Status code meaning "this source does not have the item" (default: 404)
    #[serde(default = "default_unavailable_code")]
    pub unavailable_code: u16,

    /// Disabled sources are skipped but keep their position (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    /// Create an enabled source with the default status codes
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            success_code: default_success_code(),
            unavailable_code: default_unavailable_code(),
            enabled: true,
        }
    }
}

/// Queue and storage behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory for in-flight payloads (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Directory patched scripts are installed into.
    /// When `None`, the install path resolver collaborator must supply it.
    #[serde(default)]
    pub target_dir: Option<PathBuf>,

    /// Maximum concurrent downloads, 1..=10 (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Hold queued items until `start()` is called (default: false)
    #[serde(default)]
    pub deferred_start: bool,

    /// Keep the original payload after ingest instead of deleting it (default: false)
    #[serde(default)]
    pub keep_payloads: bool,

    /// Where retained payloads are moved (default: "./payloads")
    #[serde(default = "default_payload_dir")]
    pub payload_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            target_dir: None,
            max_concurrent_downloads: default_max_concurrent(),
            deferred_start: false,
            keep_payloads: false,
            payload_dir: default_payload_dir(),
        }
    }
}

/// Per-request network timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP/TLS connect timeout (default: 5 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Maximum wait for the response headers and for each body chunk (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Maximum time for each write to temporary storage (default: 30 seconds)
    #[serde(default = "default_write_timeout", with = "duration_serde")]
    pub write_timeout: Duration,

    /// User-Agent header sent to sources
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            write_timeout: default_write_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration for ManifestDownloader
///
/// - [`sources`](SourceConfig) - ordered source list, first enabled match wins
/// - [`download`](DownloadConfig) - directories, concurrency, dispatch mode
/// - [`network`](NetworkConfig) - request timeouts
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ordered source list (position = priority)
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Queue and storage behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Network timeouts
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Parse a JSON configuration document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting that cannot be expressed in the type system
    ///
    /// An empty or all-disabled source list is accepted here; items then fail
    /// individually without any network call.
    pub fn validate(&self) -> Result<()> {
        let limit = self.download.max_concurrent_downloads;
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&limit) {
            return Err(Error::config(
                format!(
                    "max_concurrent_downloads must be between 1 and {}, got {}",
                    MAX_CONCURRENCY_LIMIT, limit
                ),
                "download.max_concurrent_downloads",
            ));
        }

        let mut names = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            let key = |field: &str| format!("sources[{}].{}", i, field);

            if source.name.trim().is_empty() {
                return Err(Error::config("source name must not be empty", key("name")));
            }
            if !names.insert(source.name.as_str()) {
                return Err(Error::config(
                    format!("duplicate source name '{}'", source.name),
                    key("name"),
                ));
            }
            if source.url_template.trim().is_empty() {
                return Err(Error::config(
                    "url_template must not be empty",
                    key("url_template"),
                ));
            }
            if !source.url_template.contains(ID_PLACEHOLDER) {
                return Err(Error::config(
                    format!("url_template must contain the {} placeholder", ID_PLACEHOLDER),
                    key("url_template"),
                ));
            }
            for (field, code) in [
                ("success_code", source.success_code),
                ("unavailable_code", source.unavailable_code),
            ] {
                if !(100..=599).contains(&code) {
                    return Err(Error::config(
                        format!("{} is not a valid HTTP status code", code),
                        key(field),
                    ));
                }
            }
            if source.success_code == source.unavailable_code {
                return Err(Error::config(
                    "success_code and unavailable_code must differ",
                    key("unavailable_code"),
                ));
            }
        }

        for (field, value) in [
            ("connect_timeout", self.network.connect_timeout),
            ("request_timeout", self.network.request_timeout),
            ("write_timeout", self.network.write_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(
                    format!("{} must be greater than zero", field),
                    format!("network.{}", field),
                ));
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_success_code() -> u16 {
    200
}

fn default_unavailable_code() -> u16 {
    404
}

fn default_true() -> bool {
    true
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_payload_dir() -> PathBuf {
    PathBuf::from("payloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
