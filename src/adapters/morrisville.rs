//! Morrisville publishes parcel records in NC State Plane feet.
//!
//! Two containers are accepted, chosen by file extension:
//!
//! - `.geojson` / `.json`: a `FeatureCollection` whose `crs` member names
//!   the system (`{"type": "name", "properties": {"name": "EPSG:2264"}}`)
//!   or carries a PROJ.4 string (`{"type": "proj4", "properties":
//!   {"proj4": "+proj=lcc ..."}}`). Without `crs` the data is taken as WGS84.
//! - `.shp`: an ESRI Shapefile with its `.dbf` table and `.prj` sidecar.
//!
//! Every mapped attribute must be present on every record. Records are
//! reprojected to WGS84 only after they pass the interest filter.
//!
//! GeoJSON is parsed as a whole document. Shapefile rows are decoded up
//! front too, because `shapefile`'s row iterator borrows its reader; the
//! mapping, filtering and reprojection still run one record at a time as
//! the stream is pulled.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use shapefile::dbase::{Date, FieldValue};
use shapefile::{PolygonRing, Shape};

use permit_import_core::crs::{Crs, Reprojection};
use permit_import_core::fields::FieldMapper;
use permit_import_core::geometry::{Geometry, Position};
use permit_import_core::models::{CanonicalField, FieldMap, SourceRecord, Town};

use super::{configured_mapper, present, FileError, RecordError, RecordStream, SourceAdapter};
use crate::config::{InactiveRule, TownConfig};

pub struct MorrisvilleAdapter {
    mapper: FieldMapper,
    inactive: InactiveRule,
}

impl MorrisvilleAdapter {
    pub fn new(overrides: Option<&TownConfig>) -> Self {
        let defaults = FieldMapper::new(
            [
                ("PROPDESC", CanonicalField::Name),
                ("BILCLDECOD", CanonicalField::Category),
                ("DEV_STATUS", CanonicalField::Status),
                ("PIN_NUM", CanonicalField::ProjId),
                ("LANDDECODE", CanonicalField::Comment),
            ],
            Some(["Business", "CORPORATE LISTING"]),
        );
        let inactive = overrides
            .and_then(|o| o.inactive.clone())
            .unwrap_or_else(|| InactiveRule {
                field: CanonicalField::Comment,
                value: "VACANT".to_string(),
            });
        Self {
            mapper: configured_mapper(defaults, overrides),
            inactive,
        }
    }

    /// Map every configured source key. `lookup` returns `None` when the
    /// key is missing and `Some(None)` when it is present but null.
    fn map_attributes(
        &self,
        lookup: impl Fn(&str) -> Option<Option<String>>,
    ) -> Result<FieldMap, RecordError> {
        let mut fields = FieldMap::new();
        for (key, field) in self.mapper.entries() {
            match lookup(key) {
                None => return Err(RecordError::MissingAttribute(key.to_string())),
                Some(Some(value)) => {
                    fields.insert(field, value);
                }
                Some(None) => {}
            }
        }
        Ok(fields)
    }

    /// Filter, then build and reproject the geometry.
    fn finish(
        &self,
        reprojection: &Reprojection,
        fields: FieldMap,
        geometry: impl FnOnce() -> Result<Geometry, RecordError>,
    ) -> Option<Result<SourceRecord, RecordError>> {
        if !self.is_interesting(&fields) {
            return None;
        }
        let record = geometry().and_then(|geometry| {
            Ok(SourceRecord {
                geometry: reprojection.apply(geometry)?,
                fields,
            })
        });
        Some(record)
    }

    fn produce_geojson<'a>(&'a self, path: &Path) -> Result<RecordStream<'a>, FileError> {
        let raw = std::fs::read_to_string(path)?;
        let collection: FeatureCollection = serde_json::from_str(&self.sanitize(raw))?;
        let crs = match collection.crs {
            Some(CrsMember::Name { name }) => Crs::from_name(&name)?,
            Some(CrsMember::Proj4 { proj4 }) => Crs::from_proj_string(&proj4)?,
            None => Crs::wgs84(),
        };
        let reprojection = Reprojection::to_wgs84(crs);

        let records = collection.features.into_iter().filter_map(move |value| {
            let feature: Feature = match serde_json::from_value(value) {
                Ok(feature) => feature,
                Err(e) => return Some(Err(RecordError::Feature(e.to_string()))),
            };
            let properties = feature.properties.unwrap_or_default();
            let fields = match self.map_attributes(|key| properties.get(key).map(json_value)) {
                Ok(fields) => fields,
                Err(e) => return Some(Err(e)),
            };
            self.finish(&reprojection, fields, || {
                feature.geometry.ok_or(RecordError::MissingGeometry)
            })
        });

        Ok(Box::new(records))
    }

    fn produce_shapefile<'a>(&'a self, path: &Path) -> Result<RecordStream<'a>, FileError> {
        let prj = path.with_extension("prj");
        if !prj.exists() {
            return Err(FileError::MissingPrj(prj));
        }
        let reprojection = Reprojection::to_wgs84(Crs::from_wkt(&std::fs::read_to_string(&prj)?)?);

        let mut reader = shapefile::Reader::from_path(path)?;
        // Decode errors stay per row.
        let rows: Vec<_> = reader.iter_shapes_and_records().collect();

        let records = rows.into_iter().filter_map(move |row| {
            let (shape, record) = match row {
                Ok(row) => row,
                Err(e) => return Some(Err(RecordError::Shape(e.to_string()))),
            };
            let fields = match self.map_attributes(|key| record.get(key).map(dbase_value)) {
                Ok(fields) => fields,
                Err(e) => return Some(Err(e)),
            };
            self.finish(&reprojection, fields, || shape_geometry(shape))
        });

        Ok(Box::new(records))
    }
}

impl SourceAdapter for MorrisvilleAdapter {
    fn town(&self) -> Town {
        Town::Morrisville
    }

    fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    /// The category filter, minus parcels with no active use.
    fn is_interesting(&self, fields: &FieldMap) -> bool {
        self.mapper.is_interesting(fields)
            && fields.get(&self.inactive.field) != Some(&self.inactive.value)
    }

    fn produce<'a>(&'a self, path: &Path) -> Result<RecordStream<'a>, FileError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "geojson" | "json" => self.produce_geojson(path),
            "shp" => self.produce_shapefile(path),
            _ => Err(FileError::UnsupportedExtension(extension)),
        }
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    crs: Option<CrsMember>,
    features: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "lowercase")]
enum CrsMember {
    Name { name: String },
    Proj4 { proj4: String },
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    properties: Option<Map<String, Value>>,
}

fn json_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => present(s),
        other => Some(other.to_string()),
    }
}

fn dbase_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(s) => s.as_deref().and_then(present),
        FieldValue::Memo(s) => present(s),
        FieldValue::Numeric(n) => n.map(|n| n.to_string()),
        FieldValue::Float(n) => n.map(|n| n.to_string()),
        FieldValue::Logical(b) => b.map(|b| b.to_string()),
        FieldValue::Integer(n) => Some(n.to_string()),
        FieldValue::Double(n) => Some(n.to_string()),
        FieldValue::Currency(n) => Some(n.to_string()),
        FieldValue::Date(d) => d.as_ref().map(iso_date),
        FieldValue::DateTime(dt) => Some(iso_date(&dt.date())),
        _ => None,
    }
}

fn iso_date(date: &Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn shape_geometry(shape: Shape) -> Result<Geometry, RecordError> {
    match shape {
        Shape::Polygon(p) => Ok(polygon_parts(p.rings(), |pt| vec![pt.x, pt.y])),
        Shape::PolygonM(p) => Ok(polygon_parts(p.rings(), |pt| vec![pt.x, pt.y])),
        Shape::PolygonZ(p) => Ok(polygon_parts(p.rings(), |pt| vec![pt.x, pt.y, pt.z])),
        Shape::NullShape => Err(RecordError::MissingGeometry),
        other => Err(RecordError::Shape(format!("{:?}", other.shapetype()))),
    }
}

/// Group shapefile rings into polygons: each outer ring starts a new
/// polygon and inner rings attach to the one before them.
fn polygon_parts<P>(
    rings: &[PolygonRing<P>],
    position: impl Fn(&P) -> Position,
) -> Geometry {
    let mut parts: Vec<Vec<Vec<Position>>> = Vec::new();
    for ring in rings {
        let (PolygonRing::Outer(points) | PolygonRing::Inner(points)) = ring;
        let coords: Vec<Position> = points.iter().map(&position).collect();
        match (ring, parts.last_mut()) {
            (PolygonRing::Inner(_), Some(part)) => part.push(coords),
            _ => parts.push(vec![coords]),
        }
    }
    Geometry::MultiPolygon(parts)
}
