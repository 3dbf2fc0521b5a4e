//! Pluggable collaborators
//!
//! The downloader depends on three pieces of platform-specific behavior that
//! embedding applications usually want to supply themselves:
//!
//! - [`InstallPathResolver`] - where patched scripts are installed
//! - [`ArchiveExtractor`] - how archive payloads are unpacked
//! - [`NameResolver`] - how an item's human-readable title is looked up
//!
//! Defaults are provided for each ([`ConfiguredInstallPath`],
//! [`BuiltinExtractor`], [`NoNameResolver`]).

use crate::config::Config;
use crate::extraction::{ArchiveExtractor, BuiltinExtractor};
use crate::types::ItemId;
use std::path::PathBuf;
use std::sync::Arc;

/// Locates the directory scripts are installed into
pub trait InstallPathResolver: Send + Sync {
    /// The target directory, or `None` when it cannot be determined
    fn resolve(&self) -> Option<PathBuf>;
}

/// Resolver that returns `download.target_dir` from the configuration
#[derive(Clone, Debug, Default)]
pub struct ConfiguredInstallPath {
    target_dir: Option<PathBuf>,
}

impl ConfiguredInstallPath {
    /// Use a fixed target directory
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: Some(target_dir.into()),
        }
    }

    /// Use `download.target_dir` from `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_dir: config.download.target_dir.clone(),
        }
    }
}

impl InstallPathResolver for ConfiguredInstallPath {
    fn resolve(&self) -> Option<PathBuf> {
        self.target_dir.clone()
    }
}

/// Looks up an item's display name
///
/// Lookups run in the background after an item is queued under its fallback
/// label and never delay acquisition.
#[async_trait::async_trait]
pub trait NameResolver: Send + Sync {
    /// Human-readable name for `id`, or `None` when unknown
    async fn resolve(&self, id: ItemId) -> Option<String>;
}

/// Resolver that never knows a name
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNameResolver;

#[async_trait::async_trait]
impl NameResolver for NoNameResolver {
    async fn resolve(&self, _id: ItemId) -> Option<String> {
        None
    }
}

/// The set of collaborators a downloader is built with
#[derive(Clone)]
pub struct Collaborators {
    /// Target directory lookup
    pub install_path: Arc<dyn InstallPathResolver>,
    /// Archive extraction
    pub extractor: Arc<dyn ArchiveExtractor>,
    /// Display name lookup
    pub names: Arc<dyn NameResolver>,
}

impl Collaborators {
    /// Default collaborators for `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            install_path: Arc::new(ConfiguredInstallPath::from_config(config)),
            extractor: Arc::new(BuiltinExtractor::with_scratch_dir(
                config.download.temp_dir.join("extract"),
            )),
            names: Arc::new(NoNameResolver),
        }
    }

    /// Replace the install path resolver
    pub fn with_install_path(mut self, resolver: impl InstallPathResolver + 'static) -> Self {
        self.install_path = Arc::new(resolver);
        self
    }

    /// Replace the archive extractor
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Replace the name resolver
    pub fn with_name_resolver(mut self, resolver: impl NameResolver + 'static) -> Self {
        self.names = Arc::new(resolver);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
