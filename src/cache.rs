//! Read-cache handles for the binary.
//!
//! Readers that render permit maps keep pre-rendered responses under a
//! cache directory (`[cache] dir`). After an import that directory is
//! emptied; the directory itself is kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub use permit_import_core::cache::{NoCache, ReadCache};

use crate::config::Config;

/// A cache stored as files under one directory.
#[derive(Debug, Clone)]
pub struct DirCache {
    dir: PathBuf,
}

impl DirCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReadCache for DirCache {
    fn invalidate_all(&self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        // Children before parents, so directories are empty when removed.
        for entry in WalkDir::new(&self.dir).min_depth(1).contents_first(true) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_dir() {
                std::fs::remove_dir(path)
            } else {
                std::fs::remove_file(path)
            }
            .with_context(|| format!("Failed to clear cache entry {}", path.display()))?;
        }
        Ok(())
    }
}

/// The cache configured in `[cache]`, or [`NoCache`].
pub fn cache_from_config(config: &Config) -> Arc<dyn ReadCache> {
    match &config.cache.dir {
        Some(dir) => Arc::new(DirCache::new(dir)),
        None => Arc::new(NoCache),
    }
}
