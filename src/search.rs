//! Keyword search over imported permits.
//!
//! Matches against the `permits_fts` index, so only records present at the
//! last index rebuild (the end of the last import) are found.

use anyhow::Result;

use permit_import_core::store::PermitStore;

use crate::config::Config;
use crate::{db, migrate};
use crate::sqlite_store::SqliteStore;

pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let limit = limit.unwrap_or(config.search.default_limit).max(1);
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let hits = store.search(query, limit).await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            hit.score,
            hit.town,
            hit.name.as_deref().unwrap_or("(unnamed)")
        );
        if let Some(ref category) = hit.category {
            println!("    category: {}", category);
        }
        if let Some(ref status) = hit.status {
            println!("    status: {}", status);
        }
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        println!("    id: {}", hit.id);
        println!();
    }

    pool.close().await;
    Ok(())
}
