//! Coordinate reference systems and reprojection.
//!
//! A [`Crs`] is built from a PROJ.4 definition string, a well-known
//! authority name (`EPSG:2264`, `urn:ogc:def:crs:EPSG::2264`, ESRI names),
//! or an ESRI `.prj` WKT document. Transforms run through `proj4rs`, which
//! honours the unit parameters of the definition, so foot-based state plane
//! coordinates convert correctly.
//!
//! Geographic systems take and return degrees at this API; the radian
//! conversion `proj4rs` expects happens inside [`Reprojection`].

use std::fmt;
use std::sync::Arc;

use proj4rs::proj::Proj;
use thiserror::Error;

use crate::geometry::{Geometry, Position};

/// WGS 84 longitude/latitude, the canonical storage system.
pub const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// NAD83 / North Carolina (ftUS), Lambert conformal conic in US survey feet.
pub const NC_STATE_PLANE_FEET: &str = "+proj=lcc +lat_1=36.16666666666666 +lat_2=34.33333333333334 \
     +lat_0=33.75 +lon_0=-79 +x_0=609601.2192024384 +y_0=0 +ellps=GRS80 \
     +towgs84=0,0,0,0,0,0,0 +units=us-ft +to_meter=0.3048006096012192 +no_defs";

/// NAD83 / North Carolina, metres.
pub const NC_STATE_PLANE_METRES: &str = "+proj=lcc +lat_1=36.16666666666666 +lat_2=34.33333333333334 \
     +lat_0=33.75 +lon_0=-79 +x_0=609601.22 +y_0=0 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 \
     +units=m +no_defs";

/// WGS 84 / Pseudo-Mercator.
pub const WEB_MERCATOR: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 \
     +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// Names that resolve to a built-in definition. Matched case-insensitively.
const KNOWN_CRS: &[(&[&str], &str)] = &[
    (&["EPSG:4326", "OGC:CRS84", "CRS84", "GCS_WGS_1984", "WGS 84"], WGS84),
    (
        &[
            "EPSG:2264",
            "ESRI:102719",
            "NAD_1983_StatePlane_North_Carolina_FIPS_3200_Feet",
            "NAD83 / North Carolina (ftUS)",
        ],
        NC_STATE_PLANE_FEET,
    ),
    (
        &[
            "EPSG:32119",
            "NAD_1983_StatePlane_North_Carolina_FIPS_3200",
            "NAD83 / North Carolina",
        ],
        NC_STATE_PLANE_METRES,
    ),
    (&["EPSG:3857", "EPSG:900913", "WGS_1984_Web_Mercator_Auxiliary_Sphere"], WEB_MERCATOR),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsError {
    #[error("unrecognized coordinate reference system '{0}'")]
    Unknown(String),
    #[error("invalid projection definition '{definition}': {reason}")]
    Definition { definition: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("position has {0} components, need at least 2")]
    Dimension(usize),
    #[error("transform failed: {0}")]
    Transform(String),
}

/// A parsed coordinate reference system.
#[derive(Clone)]
pub struct Crs {
    definition: String,
    geographic: bool,
    proj: Arc<Proj>,
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crs")
            .field("definition", &self.definition)
            .field("geographic", &self.geographic)
            .finish()
    }
}

impl Crs {
    pub fn wgs84() -> Self {
        Self::from_proj_string(WGS84).expect("built-in WGS84 definition")
    }

    pub fn from_proj_string(definition: &str) -> Result<Self, CrsError> {
        let definition = definition.split_whitespace().collect::<Vec<_>>().join(" ");
        let proj = Proj::from_proj_string(&definition).map_err(|e| CrsError::Definition {
            definition: definition.clone(),
            reason: e.to_string(),
        })?;
        let geographic = definition
            .split(' ')
            .any(|p| matches!(p, "+proj=longlat" | "+proj=latlong" | "+proj=lonlat" | "+proj=latlon"));
        Ok(Self {
            definition,
            geographic,
            proj: Arc::new(proj),
        })
    }

    /// Resolve an authority name or CRS URN against the built-in table.
    pub fn from_name(name: &str) -> Result<Self, CrsError> {
        let normalized = normalize_name(name);
        KNOWN_CRS
            .iter()
            .find(|(names, _)| names.iter().any(|n| n.eq_ignore_ascii_case(&normalized)))
            .map(|(_, definition)| Self::from_proj_string(definition))
            .unwrap_or_else(|| Err(CrsError::Unknown(name.to_string())))
    }

    /// Resolve a declaration that is either a PROJ.4 string or a name.
    pub fn from_declaration(declaration: &str) -> Result<Self, CrsError> {
        let trimmed = declaration.trim();
        if trimmed.starts_with('+') {
            Self::from_proj_string(trimmed)
        } else {
            Self::from_name(trimmed)
        }
    }

    /// Resolve an ESRI/OGC WKT document (the contents of a `.prj` file).
    ///
    /// The outermost `AUTHORITY["EPSG", code]` wins; otherwise the name of
    /// the outermost `PROJCS`/`GEOGCS` node is looked up.
    pub fn from_wkt(wkt: &str) -> Result<Self, CrsError> {
        if let Some(code) = last_authority_code(wkt) {
            if let Ok(crs) = Self::from_name(&format!("EPSG:{}", code)) {
                return Ok(crs);
            }
        }
        let name = outer_wkt_name(wkt).ok_or_else(|| CrsError::Unknown(wkt.trim().to_string()))?;
        Self::from_name(name)
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }
}

fn normalize_name(name: &str) -> String {
    let name = name.trim();
    // urn:ogc:def:crs:EPSG::2264, urn:ogc:def:crs:OGC:1.3:CRS84
    if let Some(rest) = name.strip_prefix("urn:ogc:def:crs:") {
        let parts: Vec<&str> = rest.split(':').filter(|p| !p.is_empty()).collect();
        if let (Some(authority), Some(code)) = (parts.first(), parts.last()) {
            return format!("{}:{}", authority, code);
        }
    }
    name.to_string()
}

/// Code of the outermost AUTHORITY node, which in WKT is the last one.
fn last_authority_code(wkt: &str) -> Option<&str> {
    let start = wkt.rfind("AUTHORITY[")?;
    let args = &wkt[start + "AUTHORITY[".len()..];
    let mut quoted = args.split('"').skip(1).step_by(2);
    let authority = quoted.next()?;
    let code = quoted.next()?;
    authority.eq_ignore_ascii_case("EPSG").then_some(code)
}

fn outer_wkt_name(wkt: &str) -> Option<&str> {
    let open = wkt.find('[')?;
    let keyword = wkt[..open].trim();
    if !matches!(keyword, "PROJCS" | "GEOGCS" | "PROJCRS" | "GEOGCRS") {
        return None;
    }
    wkt[open + 1..].split('"').nth(1)
}

/// A transform from one system to another.
#[derive(Debug, Clone)]
pub struct Reprojection {
    from: Crs,
    to: Crs,
}

impl Reprojection {
    pub fn new(from: Crs, to: Crs) -> Self {
        Self { from, to }
    }

    pub fn to_wgs84(from: Crs) -> Self {
        Self::new(from, Crs::wgs84())
    }

    pub fn source(&self) -> &Crs {
        &self.from
    }

    /// Transform one position. Any component past the second is discarded,
    /// so the output is always `[x, y]`.
    pub fn transform_position(&self, position: &[f64]) -> Result<Position, ProjectionError> {
        let (x, y) = match position {
            [x, y, ..] => (*x, *y),
            other => return Err(ProjectionError::Dimension(other.len())),
        };
        let mut point = if self.from.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.from.proj, &self.to.proj, &mut point)
            .map_err(|e| ProjectionError::Transform(e.to_string()))?;
        let (x, y) = if self.to.geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::Transform(format!(
                "non-finite result for ({}, {})",
                position[0], position[1]
            )));
        }
        Ok(vec![x, y])
    }

    pub fn apply(&self, geometry: Geometry) -> Result<Geometry, ProjectionError> {
        geometry.try_map_positions(|p| self.transform_position(&p))
    }
}

/// Reproject every vertex of `geometry` from `from` to `to`, dropping elevation.
pub fn reproject(geometry: Geometry, from: &Crs, to: &Crs) -> Result<Geometry, ProjectionError> {
    Reprojection::new(from.clone(), to.clone()).apply(geometry)
}
