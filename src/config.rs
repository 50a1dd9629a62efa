//! Configuration parsing and validation.
//!
//! Permit Import is configured via a TOML file (default:
//! `config/permits.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/permits.sqlite"
//!
//! [cache]
//! dir = "./data/cache"          # optional; cleared after every import
//!
//! [search]
//! default_limit = 20
//!
//! [towns.cary]
//! categories = ["Site/Sub Plan", "Rezoning Case"]
//!
//! [towns.morrisville]
//! fields = { PROPDESC = "name", BILCLDECOD = "category" }
//! inactive = { field = "comment", value = "VACANT" }
//! ```
//!
//! Every `[towns.*]` table is optional; a town without one uses its
//! built-in mapping and allow-list.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use permit_import_core::models::{CanonicalField, Town};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub towns: TownsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> i64 {
    20
}

/// Per-town overrides, keyed by town name.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TownsConfig {
    pub apex: Option<TownConfig>,
    pub cary: Option<TownConfig>,
    pub morrisville: Option<TownConfig>,
}

impl TownsConfig {
    pub fn get(&self, town: Town) -> Option<&TownConfig> {
        match town {
            Town::Apex => self.apex.as_ref(),
            Town::Cary => self.cary.as_ref(),
            Town::Morrisville => self.morrisville.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TownConfig {
    /// Replaces the built-in category allow-list.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Replaces the built-in `source key -> canonical field` table.
    #[serde(default)]
    pub fields: Option<BTreeMap<String, CanonicalField>>,
    /// Records whose field equals this value are treated as inactive and
    /// skipped. Only meaningful for Morrisville.
    #[serde(default)]
    pub inactive: Option<InactiveRule>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct InactiveRule {
    pub field: CanonicalField,
    pub value: String,
}

impl Config {
    /// A config with only a database path, for tests and one-off runs.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            towns: TownsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.search.default_limit < 1 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    for town in Town::ALL {
        let Some(town_config) = config.towns.get(town) else {
            continue;
        };
        if let Some(fields) = &town_config.fields {
            if !fields.values().any(|f| *f == CanonicalField::Category) {
                anyhow::bail!(
                    "towns.{}.fields must map some source key to 'category'",
                    town
                );
            }
        }
        if let Some(categories) = &town_config.categories {
            if categories.iter().any(|c| c.trim().is_empty()) {
                anyhow::bail!("towns.{}.categories must not contain empty values", town);
            }
        }
        if town_config.inactive.is_some() && town != Town::Morrisville {
            anyhow::bail!("towns.{}.inactive is only supported for morrisville", town);
        }
    }

    Ok(())
}
