//! The served directory tree.
//!
//! - **`resolver`**: maps request targets onto files under the root, refusing
//!   anything that canonicalizes outside it
//! - **`listing`**: renders directories as bounded HTML pages
//! - **`format`**: size and timestamp strings for listing rows

pub mod format;
pub mod listing;
pub mod resolver;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::StaticFilesConfig;
use listing::ListError;
use resolver::{ResolveError, ResolvedTarget};

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Everything a connection needs to answer requests, fixed at startup.
#[derive(Debug, Clone)]
pub struct Site {
    root: PathBuf,
    listing_limit: usize,
    server_name: String,
}

impl Site {
    /// Canonicalizes `root` once; every later resolution compares against it.
    pub fn new(root: &Path, listing_limit: usize) -> Result<Self> {
        let root = resolver::canonical_root(root)
            .with_context(|| format!("invalid root directory {}", root.display()))?;

        Ok(Self {
            root,
            listing_limit,
            server_name: SERVER_NAME.to_string(),
        })
    }

    pub fn from_config(cfg: &StaticFilesConfig) -> Result<Self> {
        Self::new(&cfg.root, cfg.listing_limit)
    }

    pub fn with_listing_limit(mut self, limit: usize) -> Self {
        self.listing_limit = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn listing_limit(&self) -> usize {
        self.listing_limit
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn resolve(&self, request_path: &str) -> Result<ResolvedTarget, ResolveError> {
        resolver::resolve(&self.root, request_path)
    }

    pub fn list(&self, dir: &Path, request_path: &str) -> Result<String, ListError> {
        listing::list_directory(dir, request_path, self.listing_limit)
    }
}
