//! In-memory [`PermitStore`] implementation for testing.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. The search index is a
//! snapshot of record text taken by `rebuild_search_index`, so search results
//! only reflect records inserted before the last rebuild, as with FTS.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DedupKey, PermitHit, PermitRecord, StoredPermit, Town};

use super::{PermitStore, TruncateScope};

struct IndexedPermit {
    id: i64,
    town: Town,
    name: Option<String>,
    category: Option<String>,
    status: Option<String>,
    text: String,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    records: RwLock<Vec<(StoredPermit, DedupKey)>>,
    index: RwLock<Vec<IndexedPermit>>,
    next_id: RwLock<i64>,
    rebuilds: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            index: RwLock::new(Vec::new()),
            next_id: RwLock::new(1),
            rebuilds: AtomicUsize::new(0),
        }
    }

    /// How many times the search index has been rebuilt.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn in_scope(town: Town, filter: Option<Town>) -> bool {
    filter.map_or(true, |t| t == town)
}

#[async_trait]
impl PermitStore for InMemoryStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        let records = self.records.read().unwrap();
        Ok(records.iter().any(|(_, k)| k == key))
    }

    async fn insert(&self, record: &PermitRecord) -> Result<i64> {
        let id = {
            let mut next = self.next_id.write().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        let mut records = self.records.write().unwrap();
        records.push((
            StoredPermit {
                id,
                record: record.clone(),
            },
            record.dedup_key(),
        ));
        Ok(id)
    }

    async fn truncate(&self, scope: TruncateScope) -> Result<u64> {
        let filter = match scope {
            TruncateScope::All => None,
            TruncateScope::Town(t) => Some(t),
        };
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|(p, _)| !in_scope(p.record.town, filter));
        self.index
            .write()
            .unwrap()
            .retain(|e| !in_scope(e.town, filter));
        Ok((before - records.len()) as u64)
    }

    async fn rebuild_search_index(&self) -> Result<()> {
        let records = self.records.read().unwrap();
        let mut index = self.index.write().unwrap();
        *index = records
            .iter()
            .map(|(p, _)| IndexedPermit {
                id: p.id,
                town: p.record.town,
                name: p.record.name.clone(),
                category: p.record.category.clone(),
                status: p.record.status.clone(),
                text: p.record.search_text(),
            })
            .collect();
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count(&self, town: Option<Town>) -> Result<i64> {
        let records = self.records.read().unwrap();
        Ok(records.iter().filter(|(p, _)| in_scope(p.record.town, town)).count() as i64)
    }

    async fn list(&self, town: Option<Town>) -> Result<Vec<StoredPermit>> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|(p, _)| in_scope(p.record.town, town))
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PermitHit>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.index.read().unwrap();
        let mut hits: Vec<PermitHit> = index
            .iter()
            .filter_map(|entry| {
                let text_lower = entry.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                (matches > 0).then(|| PermitHit {
                    id: entry.id,
                    town: entry.town,
                    name: entry.name.clone(),
                    category: entry.category.clone(),
                    status: entry.status.clone(),
                    score: matches as f64,
                    snippet: entry.text.chars().take(120).collect(),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}
