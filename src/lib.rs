//! # Permit Import
//!
//! Imports municipal zoning and development-permit datasets into one
//! searchable permit store.
//!
//! Each town publishes its permits differently: Cary and Apex export KML
//! (with attributes in `ExtendedData` or in an HTML popup table), while
//! Morrisville publishes parcel records in NC State Plane feet. Per-town
//! adapters read those files, map their attributes to one canonical schema,
//! keep only the categories worth showing, and normalize geometry to 2-D
//! WGS84 multipolygons. The pipeline then stores every record it has not
//! seen before and refreshes the search index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Adapters   │──▶│   Pipeline   │──▶│  SQLite   │
//! │ KML/GeoJSON/ │   │ dedup+insert │   │ + FTS5    │
//! │  Shapefile   │   └──────┬───────┘   └─────┬─────┘
//! └──────────────┘          │                 │
//!                           ▼                 ▼
//!                     ┌──────────┐      ┌──────────┐
//!                     │  Cache   │      │   CLI    │
//!                     │  clear   │      │ search   │
//!                     └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! permit-import init
//! permit-import import --town cary data/cary-plans.kml
//! permit-import import --town morrisville --truncate data/parcels.shp
//! permit-import search "rezoning"
//! permit-import stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`adapters`] | Per-town file readers |
//! | [`ingest`] | Import pipeline |
//! | [`sqlite_store`] | SQLite permit store |
//! | [`cache`] | Read-cache invalidation |
//! | [`config`] | TOML configuration parsing |
//! | [`search`] | Keyword search command |
//! | [`stats`] | Database statistics command |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! Models, geometry, reprojection, field mapping, and the store trait live
//! in `permit-import-core` and are re-exported here.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod db;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod stats;

pub use permit_import_core::{crs, fields, geometry, models, store};
