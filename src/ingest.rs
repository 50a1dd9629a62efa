//! Import pipeline orchestration.
//!
//! Coordinates one import: source id → adapter → records → dedup →
//! store, then rebuilds the search index and clears the read cache once
//! the whole file has been read.
//!
//! A file-level failure (unknown source, unreadable file) aborts the file
//! before anything is written. A record-level failure skips that record
//! only; it is logged and listed in the [`ImportReport`]. A store failure
//! stops the file, but the index and cache are still refreshed so records
//! committed before it stay searchable. Committed records are never rolled
//! back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use thiserror::Error;

use permit_import_core::cache::ReadCache;
use permit_import_core::models::{PermitRecord, Town};
use permit_import_core::store::{PermitStore, TruncateScope};

use crate::adapters::{self, FileError, RecordStream};
use crate::cache::cache_from_config;
use crate::config::{Config, TownsConfig};
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unknown source '{0}'. Available: apex, cary, morrisville")]
    UnknownSource(String),
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: FileError,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A record that was read but not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based position among the records the adapter produced.
    pub index: usize,
    pub reason: String,
}

/// Outcome of importing one file.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub town: Town,
    pub path: PathBuf,
    /// Records the adapter yielded after filtering, including failures.
    pub produced: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl ImportReport {
    fn new(town: Town, path: &Path) -> Self {
        Self {
            town,
            path: path.to_path_buf(),
            produced: 0,
            persisted: 0,
            duplicates: 0,
            skipped: Vec::new(),
        }
    }
}

/// Imports files into a [`PermitStore`] and keeps a [`ReadCache`] fresh.
pub struct ImportPipeline {
    store: Arc<dyn PermitStore>,
    cache: Arc<dyn ReadCache>,
    towns: TownsConfig,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn PermitStore>, cache: Arc<dyn ReadCache>, towns: TownsConfig) -> Self {
        Self {
            store,
            cache,
            towns,
        }
    }

    /// Import one file from the town named by `source_id`.
    ///
    /// The search index is rebuilt and the cache cleared exactly once, after
    /// the last record or after a store failure, whether or not anything
    /// was stored.
    pub async fn import_file(&self, source_id: &str, path: &Path) -> Result<ImportReport, ImportError> {
        let town: Town = source_id
            .parse()
            .map_err(|_| ImportError::UnknownSource(source_id.to_string()))?;
        let adapter = adapters::for_town(town, &self.towns);
        let records = adapter.produce(path).map_err(|source| ImportError::File {
            path: path.to_path_buf(),
            source,
        })?;

        let mut report = ImportReport::new(town, path);
        if let Err(e) = self.store_records(town, path, records, &mut report).await {
            // Rows committed before the failure still need indexing.
            if let Err(finalize_err) = self.finalize().await {
                tracing::warn!(town = %town, path = %path.display(), "finalize after store error failed: {}", finalize_err);
            }
            return Err(e.into());
        }
        self.finalize().await?;

        tracing::info!(
            town = %town,
            path = %path.display(),
            produced = report.produced,
            persisted = report.persisted,
            duplicates = report.duplicates,
            skipped = report.skipped.len(),
            "import finished"
        );
        Ok(report)
    }

    /// Import files in order, stopping at the first file that fails.
    /// Files before it stay imported.
    pub async fn import_files<P: AsRef<Path>>(
        &self,
        source_id: &str,
        paths: &[P],
    ) -> Result<Vec<ImportReport>, ImportError> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.import_file(source_id, path.as_ref()).await?);
        }
        Ok(reports)
    }

    /// Delete stored records in `scope` and clear the read cache.
    pub async fn truncate(&self, scope: TruncateScope) -> Result<u64, ImportError> {
        let deleted = self.store.truncate(scope).await?;
        self.cache.invalidate_all()?;
        tracing::info!(?scope, deleted, "truncated permits");
        Ok(deleted)
    }

    async fn store_records(
        &self,
        town: Town,
        path: &Path,
        records: RecordStream<'_>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let saved_on = Local::now().date_naive();

        for (i, item) in records.enumerate() {
            report.produced += 1;
            let index = i + 1;

            let (region, fields) = match item.and_then(|r| Ok((r.geometry.into_region()?, r.fields))) {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::warn!(town = %town, path = %path.display(), index, "skipping record: {}", e);
                    report.skipped.push(SkippedRecord {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let record = PermitRecord::new(town, region, fields, saved_on);
            if self.store.exists(&record.dedup_key()).await? {
                tracing::debug!(town = %town, index, "already imported");
                report.duplicates += 1;
                continue;
            }
            self.store.insert(&record).await?;
            report.persisted += 1;
        }
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        self.store.rebuild_search_index().await?;
        self.cache.invalidate_all()
    }
}

/// `permit-import import`: open the configured database and import
/// `files` in order, printing a summary per file.
pub async fn run_import(
    config: &Config,
    source_id: &str,
    truncate: bool,
    truncate_all: bool,
    files: &[PathBuf],
) -> Result<()> {
    // Reject an unknown town before touching the database.
    let town: Town = source_id.parse()?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let pipeline = ImportPipeline::new(store, cache_from_config(config), config.towns.clone());

    if truncate_all {
        let deleted = pipeline.truncate(TruncateScope::All).await?;
        println!("truncate all: {} records deleted", deleted);
    } else if truncate {
        let deleted = pipeline.truncate(TruncateScope::Town(town)).await?;
        println!("truncate {}: {} records deleted", town, deleted);
    }

    for path in files {
        let report = pipeline.import_file(town.as_str(), path).await?;
        println!("import {} {}", report.town, report.path.display());
        println!("  records read: {}", report.produced);
        println!("  persisted: {}", report.persisted);
        println!("  duplicates: {}", report.duplicates);
        println!("  skipped: {}", report.skipped.len());
        for skipped in &report.skipped {
            println!("    #{}: {}", skipped.index, skipped.reason);
        }
    }
    println!("ok");

    pool.close().await;
    Ok(())
}
