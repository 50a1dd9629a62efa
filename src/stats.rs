//! Database statistics.
//!
//! `permit-import stats` prints how many permits are stored in total and
//! per town, and when each town was last imported.

use anyhow::Result;
use sqlx::Row;

use permit_import_core::models::Town;
use permit_import_core::store::PermitStore;

use crate::config::Config;
use crate::{db, migrate};
use crate::sqlite_store::SqliteStore;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let total = store.count(None).await?;
    let indexed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permits_fts")
        .fetch_one(&pool)
        .await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Permit Import Database Stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Permits:     {}", total);
    println!("  Indexed:     {}", indexed);

    let last_saved = sqlx::query("SELECT town, MAX(saved_on) AS last_saved FROM permits GROUP BY town")
        .fetch_all(&pool)
        .await?;

    println!();
    println!("  By town:");
    println!("  {:<16} {:>8}   {}", "TOWN", "PERMITS", "LAST IMPORT");
    println!("  {}", "-".repeat(44));
    for town in Town::ALL {
        let count = store.count(Some(town)).await?;
        let last = last_saved
            .iter()
            .find(|row| row.get::<String, _>("town") == town.as_str())
            .map(|row| row.get::<String, _>("last_saved"))
            .unwrap_or_else(|| "never".to_string());
        println!("  {:<16} {:>8}   {}", town.as_str(), count, last);
    }
    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
