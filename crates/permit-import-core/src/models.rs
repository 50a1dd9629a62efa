//! Core data models used throughout Permit Import.
//!
//! These types represent the towns data is imported from, the canonical
//! field schema every source is mapped into, the intermediate records
//! adapters produce, and the permit records that reach the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use geo_types::MultiPolygon;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::geometry::{encode_region, Geometry};

/// A town that publishes permit data. Each town has exactly one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Town {
    Apex,
    Cary,
    Morrisville,
}

impl Town {
    pub const ALL: [Town; 3] = [Town::Apex, Town::Cary, Town::Morrisville];

    pub fn as_str(&self) -> &'static str {
        match self {
            Town::Apex => "apex",
            Town::Cary => "cary",
            Town::Morrisville => "morrisville",
        }
    }
}

impl fmt::Display for Town {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a source identifier names no registered town.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source '{0}'. Available: apex, cary, morrisville")]
pub struct UnknownTown(pub String);

impl FromStr for Town {
    type Err = UnknownTown;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Town::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTown(s.to_string()))
    }
}

/// Canonical attribute names shared by every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    ProjId,
    Link,
    Status,
    Comment,
    Category,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Name,
        CanonicalField::ProjId,
        CanonicalField::Link,
        CanonicalField::Status,
        CanonicalField::Comment,
        CanonicalField::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Name => "name",
            CanonicalField::ProjId => "proj_id",
            CanonicalField::Link => "link",
            CanonicalField::Status => "status",
            CanonicalField::Comment => "comment",
            CanonicalField::Category => "category",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown canonical field '{}'", s))
    }
}

/// Canonical field values extracted from one source record.
///
/// A field that the source did not supply is absent from the map, never
/// present with an empty value.
pub type FieldMap = BTreeMap<CanonicalField, String>;

/// Intermediate record produced by an adapter before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub geometry: Geometry,
    pub fields: FieldMap,
}

/// A normalized permit record, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PermitRecord {
    pub town: Town,
    pub region: MultiPolygon<f64>,
    pub name: Option<String>,
    pub proj_id: Option<String>,
    pub link: Option<String>,
    pub status: Option<String>,
    pub comment: Option<String>,
    pub category: Option<String>,
    pub saved_on: NaiveDate,
}

impl PermitRecord {
    /// Build a record from a normalized region and extracted fields.
    pub fn new(town: Town, region: MultiPolygon<f64>, mut fields: FieldMap, saved_on: NaiveDate) -> Self {
        Self {
            town,
            region,
            name: fields.remove(&CanonicalField::Name),
            proj_id: fields.remove(&CanonicalField::ProjId),
            link: fields.remove(&CanonicalField::Link),
            status: fields.remove(&CanonicalField::Status),
            comment: fields.remove(&CanonicalField::Comment),
            category: fields.remove(&CanonicalField::Category),
            saved_on,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        let region = encode_region(&self.region);
        DedupKey {
            region_hash: region_hash(&region),
            region,
            name: self.name.clone(),
            comment: self.comment.clone(),
            category: self.category.clone(),
            proj_id: self.proj_id.clone(),
            link: self.link.clone(),
            status: self.status.clone(),
        }
    }

    /// Text the full-text index is built from.
    pub fn search_text(&self) -> String {
        [
            &self.name,
            &self.category,
            &self.status,
            &self.comment,
            &self.proj_id,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// The seven-field tuple that decides whether a record was already imported.
///
/// The region is compared through its canonical text encoding; `region_hash`
/// is a SHA-256 of that encoding so stores can index it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub region: String,
    pub region_hash: String,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub category: Option<String>,
    pub proj_id: Option<String>,
    pub link: Option<String>,
    pub status: Option<String>,
}

pub fn region_hash(encoded_region: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encoded_region.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A permit record as returned from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPermit {
    pub id: i64,
    pub record: PermitRecord,
}

/// A full-text search hit.
#[derive(Debug, Clone)]
pub struct PermitHit {
    pub id: i64,
    pub town: Town,
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub score: f64,
    pub snippet: String,
}
