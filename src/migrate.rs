//! Database schema migrations.
//!
//! All statements are idempotent; running them against an initialized
//! database is a no-op.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Region is the canonical MultiPolygon coordinate encoding; region_hash
    // is its SHA-256 and carries the dedup lookup index.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            town TEXT NOT NULL,
            region TEXT NOT NULL,
            region_hash TEXT NOT NULL,
            name TEXT,
            proj_id TEXT,
            link TEXT,
            status TEXT,
            comment TEXT,
            category TEXT,
            saved_on TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='permits_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE permits_fts USING fts5(
                permit_id UNINDEXED,
                name,
                category,
                status,
                comment,
                proj_id
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_permits_region_hash ON permits(region_hash)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_permits_town ON permits(town)")
        .execute(pool)
        .await?;

    Ok(())
}
