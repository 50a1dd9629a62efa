//! Per-town source adapters.
//!
//! Each town publishes its permits in a different format. An adapter turns
//! one file into a lazy sequence of [`SourceRecord`]s whose fields are
//! already mapped to canonical names, filtered to interesting categories,
//! and whose geometry is two-dimensional WGS84.
//!
//! | Town | Adapter | Format |
//! |------|---------|--------|
//! | `cary` | [`CaryAdapter`] | KML, fields in `<ExtendedData>` |
//! | `apex` | [`ApexAdapter`] | KML, fields in an HTML table in `<description>` |
//! | `morrisville` | [`MorrisvilleAdapter`] | GeoJSON with `crs`, or Shapefile with `.prj` |
//!
//! Failures come in two kinds: a [`FileError`] from
//! [`produce`](SourceAdapter::produce) means nothing in the file can be
//! read, while a [`RecordError`] item in the stream affects only that record.

mod apex;
mod cary;
mod kml;
mod morrisville;

pub use apex::ApexAdapter;
pub use cary::CaryAdapter;
pub use morrisville::MorrisvilleAdapter;

use std::path::{Path, PathBuf};

use thiserror::Error;

use permit_import_core::crs::{CrsError, ProjectionError};
use permit_import_core::fields::FieldMapper;
use permit_import_core::geometry::GeometryError;
use permit_import_core::models::{FieldMap, SourceRecord, Town};

use crate::config::{TownConfig, TownsConfig};

/// Lazy, forward-only sequence of per-record results from one file.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<SourceRecord, RecordError>> + 'a>;

/// The file as a whole could not be read.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed KML: {0}")]
    Kml(String),
    #[error("malformed GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed shapefile: {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error(transparent)]
    Crs(#[from] CrsError),
    #[error("no .prj file next to shapefile (looked for {0})")]
    MissingPrj(PathBuf),
    #[error("unsupported file extension '{0}', expected .geojson, .json or .shp")]
    UnsupportedExtension(String),
}

/// One record could not be turned into a [`SourceRecord`].
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing attribute '{0}'")]
    MissingAttribute(String),
    #[error("placemark has no ExtendedData")]
    MissingExtendedData,
    #[error("placemark has no description")]
    MissingDescription,
    #[error("description has no attribute table")]
    MissingDescriptionTable,
    #[error("record has no geometry")]
    MissingGeometry,
    #[error("bad coordinates: {0}")]
    Coordinates(String),
    #[error("malformed feature: {0}")]
    Feature(String),
    #[error("unsupported shape type {0}")]
    Shape(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// A town-specific file reader.
///
/// Implementations hold only immutable configuration, so one adapter can
/// produce any number of files.
pub trait SourceAdapter: Send + Sync {
    fn town(&self) -> Town;

    fn mapper(&self) -> &FieldMapper;

    /// Rewrite raw file text before parsing. Identity unless overridden.
    fn sanitize(&self, raw: String) -> String {
        raw
    }

    /// Whether a record with these fields should be imported.
    fn is_interesting(&self, fields: &FieldMap) -> bool {
        self.mapper().is_interesting(fields)
    }

    /// Open `path` and return its records.
    fn produce<'a>(&'a self, path: &Path) -> Result<RecordStream<'a>, FileError>;
}

/// Build the adapter for `town`, applying any `[towns.<town>]` overrides.
pub fn for_town(town: Town, towns: &TownsConfig) -> Box<dyn SourceAdapter> {
    let overrides = towns.get(town);
    match town {
        Town::Apex => Box::new(ApexAdapter::new(overrides)),
        Town::Cary => Box::new(CaryAdapter::new(overrides)),
        Town::Morrisville => Box::new(MorrisvilleAdapter::new(overrides)),
    }
}

fn configured_mapper(defaults: FieldMapper, overrides: Option<&TownConfig>) -> FieldMapper {
    match overrides {
        Some(o) => defaults.with_overrides(o.fields.as_ref(), o.categories.as_deref()),
        None => defaults,
    }
}

/// Trim a raw attribute value; blank values count as absent.
fn present(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
