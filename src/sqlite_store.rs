//! SQLite-backed [`PermitStore`] implementation.
//!
//! Records live in the `permits` table; the full-text index is the
//! `permits_fts` FTS5 table, rebuilt wholesale by
//! [`rebuild_search_index`](PermitStore::rebuild_search_index).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use permit_import_core::geometry::{decode_region, encode_region};
use permit_import_core::models::{
    region_hash, DedupKey, PermitHit, PermitRecord, StoredPermit, Town,
};
use permit_import_core::store::{PermitStore, TruncateScope};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite implementation of the [`PermitStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_permit(row: &SqliteRow) -> Result<StoredPermit> {
    let id: i64 = row.get("id");
    let town: String = row.get("town");
    let region: String = row.get("region");
    let saved_on: String = row.get("saved_on");
    Ok(StoredPermit {
        id,
        record: PermitRecord {
            town: town.parse()?,
            region: decode_region(&region)
                .with_context(|| format!("permit {} has a malformed region", id))?,
            name: row.get("name"),
            proj_id: row.get("proj_id"),
            link: row.get("link"),
            status: row.get("status"),
            comment: row.get("comment"),
            category: row.get("category"),
            saved_on: NaiveDate::parse_from_str(&saved_on, DATE_FORMAT)
                .with_context(|| format!("permit {} has a malformed saved_on", id))?,
        },
    })
}

/// Quote each term so FTS5 operators and punctuation (`Site/Sub`) are
/// matched literally.
fn fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl PermitStore for SqliteStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        // `IS` so that NULL matches NULL.
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) > 0 FROM permits
            WHERE region_hash = ? AND region = ?
              AND name IS ? AND comment IS ? AND category IS ?
              AND proj_id IS ? AND link IS ? AND status IS ?
            "#,
        )
        .bind(&key.region_hash)
        .bind(&key.region)
        .bind(&key.name)
        .bind(&key.comment)
        .bind(&key.category)
        .bind(&key.proj_id)
        .bind(&key.link)
        .bind(&key.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    async fn insert(&self, record: &PermitRecord) -> Result<i64> {
        let region = encode_region(&record.region);
        let result = sqlx::query(
            r#"
            INSERT INTO permits (town, region, region_hash, name, proj_id, link,
                                 status, comment, category, saved_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.town.as_str())
        .bind(&region)
        .bind(region_hash(&region))
        .bind(&record.name)
        .bind(&record.proj_id)
        .bind(&record.link)
        .bind(&record.status)
        .bind(&record.comment)
        .bind(&record.category)
        .bind(record.saved_on.format(DATE_FORMAT).to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn truncate(&self, scope: TruncateScope) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = match scope {
            TruncateScope::All => sqlx::query("DELETE FROM permits").execute(&mut *tx).await?,
            TruncateScope::Town(town) => {
                sqlx::query("DELETE FROM permits WHERE town = ?")
                    .bind(town.as_str())
                    .execute(&mut *tx)
                    .await?
            }
        };

        sqlx::query("DELETE FROM permits_fts WHERE permit_id NOT IN (SELECT id FROM permits)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected())
    }

    async fn rebuild_search_index(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM permits_fts")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO permits_fts (permit_id, name, category, status, comment, proj_id)
            SELECT id, name, category, status, comment, proj_id FROM permits
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self, town: Option<Town>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permits WHERE ?1 IS NULL OR town = ?1")
            .bind(town.map(|t| t.as_str()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list(&self, town: Option<Town>) -> Result<Vec<StoredPermit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, town, region, name, proj_id, link, status, comment, category, saved_on
            FROM permits
            WHERE ?1 IS NULL OR town = ?1
            ORDER BY id
            "#,
        )
        .bind(town.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_permit).collect()
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PermitHit>> {
        let query = fts_query(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.town, p.name, p.category, p.status, m.rank AS rank, m.snippet AS snippet
            FROM (
                SELECT permit_id, rank,
                       snippet(permits_fts, -1, '>>>', '<<<', '...', 16) AS snippet
                FROM permits_fts
                WHERE permits_fts MATCH ?
                ORDER BY rank
                LIMIT ?
            ) m
            JOIN permits p ON p.id = m.permit_id
            ORDER BY m.rank, p.id
            "#,
        )
        .bind(&query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let town: String = row.get("town");
                let rank: f64 = row.get("rank");
                Ok(PermitHit {
                    id: row.get("id"),
                    town: town.parse()?,
                    name: row.get("name"),
                    category: row.get("category"),
                    status: row.get("status"),
                    score: -rank, // negate so higher = better
                    snippet: row.get("snippet"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fts_query_quotes_terms() {
        assert_eq!(fts_query("Site/Sub plan"), "\"Site/Sub\" \"plan\"");
        assert_eq!(fts_query("say \"hi\""), "\"say\" \"\"\"hi\"\"\"");
        assert_eq!(fts_query("   "), "");
    }
}
