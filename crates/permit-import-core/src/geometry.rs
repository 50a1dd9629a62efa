//! Geometry values produced by adapters and the normalizations applied to them.
//!
//! Adapters produce a [`Geometry`] whose positions may carry a third
//! (elevation) component. Before a record is stored it goes through
//! [`strip_elevation`] or [`crate::crs::reproject`] inside the adapter, then
//! [`to_multi`] and [`Geometry::into_region`] at the persistence boundary,
//! which yields a two-dimensional `geo_types::MultiPolygon`.
//!
//! The serde representation matches GeoJSON geometry objects
//! (`{"type": "Polygon", "coordinates": [...]}`).

use std::convert::Infallible;
use std::fmt::Write;

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinate tuple: `[x, y]` or `[x, y, z]`.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("{0} geometry cannot be stored as a region")]
    NotPolygonal(&'static str),
    #[error("position has {0} components, expected 2")]
    Dimension(usize),
    #[error("position has a non-finite ordinate")]
    NonFinite,
    #[error("ring has {0} positions, need at least 3")]
    DegenerateRing(usize),
    #[error("geometry has no rings")]
    Empty,
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            Geometry::Point(p) => Box::new(std::iter::once(p)),
            Geometry::LineString(line) => Box::new(line.iter()),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
            Geometry::MultiPolygon(parts) => Box::new(parts.iter().flatten().flatten()),
        }
    }

    pub fn has_z(&self) -> bool {
        self.positions().any(|p| p.len() > 2)
    }

    /// Rebuild the geometry by passing every position through `f`, keeping
    /// part, ring, and vertex order. Stops at the first error.
    pub fn try_map_positions<E>(
        self,
        mut f: impl FnMut(Position) -> Result<Position, E>,
    ) -> Result<Geometry, E> {
        fn ring<E>(
            ring: Vec<Position>,
            f: &mut impl FnMut(Position) -> Result<Position, E>,
        ) -> Result<Vec<Position>, E> {
            ring.into_iter().map(&mut *f).collect()
        }

        fn rings<E>(
            rings: Vec<Vec<Position>>,
            f: &mut impl FnMut(Position) -> Result<Position, E>,
        ) -> Result<Vec<Vec<Position>>, E> {
            rings.into_iter().map(|r| ring(r, f)).collect()
        }

        Ok(match self {
            Geometry::Point(p) => Geometry::Point(f(p)?),
            Geometry::LineString(line) => Geometry::LineString(ring(line, &mut f)?),
            Geometry::Polygon(poly) => Geometry::Polygon(rings(poly, &mut f)?),
            Geometry::MultiPolygon(parts) => Geometry::MultiPolygon(
                parts
                    .into_iter()
                    .map(|part| rings(part, &mut f))
                    .collect::<Result<_, E>>()?,
            ),
        })
    }

    /// Convert into the stored region type.
    ///
    /// Applies [`to_multi`] first, so single polygons are accepted. Fails
    /// for non-polygonal geometry, positions that are not exactly 2-D, and
    /// rings with fewer than three positions.
    pub fn into_region(self) -> Result<MultiPolygon<f64>, GeometryError> {
        let parts = match to_multi(self) {
            Geometry::MultiPolygon(parts) => parts,
            other => return Err(GeometryError::NotPolygonal(other.kind())),
        };
        if parts.is_empty() {
            return Err(GeometryError::Empty);
        }
        let polygons = parts
            .into_iter()
            .map(polygon_from_rings)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MultiPolygon::new(polygons))
    }
}

fn polygon_from_rings(rings: Vec<Vec<Position>>) -> Result<Polygon<f64>, GeometryError> {
    let mut rings = rings
        .into_iter()
        .map(line_string_from_ring)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().ok_or(GeometryError::Empty)?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn line_string_from_ring(ring: Vec<Position>) -> Result<LineString<f64>, GeometryError> {
    if ring.len() < 3 {
        return Err(GeometryError::DegenerateRing(ring.len()));
    }
    ring.into_iter()
        .map(|p| match p.as_slice() {
            [x, y] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            [_, _] => Err(GeometryError::NonFinite),
            other => Err(GeometryError::Dimension(other.len())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// Drop the third component of every position. Structure and order are kept.
pub fn strip_elevation(geometry: Geometry) -> Geometry {
    let stripped = geometry.try_map_positions(|mut p| {
        p.truncate(2);
        Ok::<_, Infallible>(p)
    });
    match stripped {
        Ok(g) => g,
        Err(never) => match never {},
    }
}

/// Wrap a single polygon into a one-element multipolygon; anything else is
/// returned unchanged.
pub fn to_multi(geometry: Geometry) -> Geometry {
    match geometry {
        Geometry::Polygon(rings) => Geometry::MultiPolygon(vec![rings]),
        other => other,
    }
}

/// Canonical text encoding of a region, used for storage and dedup.
///
/// GeoJSON `MultiPolygon` coordinates with shortest round-trip float
/// formatting, so equal regions always encode to equal strings.
pub fn encode_region(region: &MultiPolygon<f64>) -> String {
    let mut out = String::from("[");
    for (pi, polygon) in region.0.iter().enumerate() {
        if pi > 0 {
            out.push(',');
        }
        out.push('[');
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for (ri, ring) in rings.enumerate() {
            if ri > 0 {
                out.push(',');
            }
            out.push('[');
            for (ci, c) in ring.coords().enumerate() {
                if ci > 0 {
                    out.push(',');
                }
                let _ = write!(out, "[{:?},{:?}]", c.x, c.y);
            }
            out.push(']');
        }
        out.push(']');
    }
    out.push(']');
    out
}

pub fn decode_region(encoded: &str) -> Result<MultiPolygon<f64>, serde_json::Error> {
    let parts: Vec<Vec<Vec<[f64; 2]>>> = serde_json::from_str(encoded)?;
    let polygons = parts
        .into_iter()
        .filter_map(|rings| {
            let mut rings = rings
                .into_iter()
                .map(|ring| ring.into_iter().map(|[x, y]| Coord { x, y }).collect::<LineString<f64>>());
            let exterior = rings.next()?;
            Some(Polygon::new(exterior, rings.collect()))
        })
        .collect();
    Ok(MultiPolygon::new(polygons))
}
