//! Read-cache invalidation.
//!
//! Whatever serves permits to readers may cache query results. The import
//! pipeline clears that cache once per imported file through [`ReadCache`].

use anyhow::Result;

pub trait ReadCache: Send + Sync {
    /// Drop every cached entry.
    fn invalidate_all(&self) -> Result<()>;
}

/// A cache that holds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ReadCache for NoCache {
    fn invalidate_all(&self) -> Result<()> {
        Ok(())
    }
}
