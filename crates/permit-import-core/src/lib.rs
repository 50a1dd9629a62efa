//! # Permit Import Core
//!
//! Shared, I/O-free logic for Permit Import: permit models, geometry
//! normalization, coordinate reprojection, per-town field mapping, and the
//! store and cache abstractions the import pipeline writes through.
//!
//! This crate contains no tokio, sqlx, or filesystem access. File parsing
//! lives in the `permit-import` crate next to the SQLite store.

pub mod cache;
pub mod crs;
pub mod fields;
pub mod geometry;
pub mod models;
pub mod store;
