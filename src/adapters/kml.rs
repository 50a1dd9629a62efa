//! KML reading shared by the Cary and Apex adapters.
//!
//! The document is parsed with `quick-xml` into a small element tree
//! (namespace prefixes dropped), then placemarks are pulled out one at a
//! time by a depth-first walk over `Document`/`Folder` containers in
//! document order.

use std::borrow::Cow;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};

use permit_import_core::geometry::{strip_elevation, Geometry, Position};
use permit_import_core::models::{FieldMap, SourceRecord};

use super::{FileError, RecordError, RecordStream, SourceAdapter};

/// An XML element with its attributes, child elements, and concatenated text.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, FileError> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| FileError::Kml(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| FileError::Kml(e.to_string()))?;
            attrs.push((lossy(attr.key.local_name().as_ref()), value.into_owned()));
        }
        Ok(Self {
            name: lossy(start.local_name().as_ref()),
            attrs,
            ..Self::default()
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse a whole KML document. The returned root is a synthetic element
/// holding the top-level `<kml>` node.
pub(crate) fn parse_document(xml: &str) -> Result<Element, FileError> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(Element::open(&e)?),
            Ok(Event::Empty(e)) => {
                let element = Element::open(&e)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(FileError::Kml("unbalanced closing tag".to_string()));
                }
                if let Some(element) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                // Descriptions may carry HTML entities XML doesn't define.
                let text = t
                    .unescape()
                    .unwrap_or_else(|_| Cow::Owned(lossy(&t)));
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FileError::Kml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(FileError::Kml(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    stack
        .pop()
        .ok_or_else(|| FileError::Kml("empty document".to_string()))
}

/// Depth-first, document-order iterator over the placemarks of a tree.
///
/// Owns the tree; children are pushed in reverse so the first child is
/// visited first.
pub(crate) struct Placemarks {
    stack: Vec<Element>,
}

impl Placemarks {
    pub fn new(root: Element) -> Self {
        Self { stack: vec![root] }
    }
}

impl Iterator for Placemarks {
    type Item = Element;

    fn next(&mut self) -> Option<Element> {
        while let Some(mut element) = self.stack.pop() {
            if element.name == "Placemark" {
                return Some(element);
            }
            let children = std::mem::take(&mut element.children);
            self.stack.extend(children.into_iter().rev());
        }
        None
    }
}

/// Field extraction for one KML dialect.
pub(crate) trait KmlFields: SourceAdapter {
    fn extract_fields(&self, placemark: &Element) -> Result<FieldMap, RecordError>;
}

/// Read, sanitize, and parse a KML file, then stream its interesting
/// placemarks with elevation stripped.
pub(crate) fn produce_kml<'a, A: KmlFields>(
    adapter: &'a A,
    path: &Path,
) -> Result<RecordStream<'a>, FileError> {
    let raw = std::fs::read_to_string(path)?;
    let document = parse_document(&adapter.sanitize(raw))?;

    let records = Placemarks::new(document).filter_map(move |placemark| {
        let fields = match adapter.extract_fields(&placemark) {
            Ok(fields) => fields,
            Err(e) => return Some(Err(e)),
        };
        if !adapter.is_interesting(&fields) {
            return None;
        }
        Some(placemark_geometry(&placemark).map(|geometry| SourceRecord {
            geometry: strip_elevation(geometry),
            fields,
        }))
    });

    Ok(Box::new(records))
}

const GEOMETRY_KINDS: [&str; 4] = ["Point", "LineString", "Polygon", "MultiGeometry"];

/// The placemark's geometry. A `MultiGeometry` becomes a `MultiPolygon`
/// of its polygon members; if it has none, its first member is returned.
pub(crate) fn placemark_geometry(placemark: &Element) -> Result<Geometry, RecordError> {
    let element = placemark
        .children
        .iter()
        .find(|c| GEOMETRY_KINDS.contains(&c.name.as_str()))
        .ok_or(RecordError::MissingGeometry)?;
    parse_geometry(element)
}

fn parse_geometry(element: &Element) -> Result<Geometry, RecordError> {
    match element.name.as_str() {
        "Point" => {
            let mut positions = coordinates_of(element)?;
            if positions.len() != 1 {
                return Err(RecordError::Coordinates(format!(
                    "Point has {} positions",
                    positions.len()
                )));
            }
            Ok(Geometry::Point(positions.remove(0)))
        }
        "LineString" => Ok(Geometry::LineString(coordinates_of(element)?)),
        "Polygon" => Ok(Geometry::Polygon(polygon_rings(element)?)),
        "MultiGeometry" => {
            let mut polygons = Vec::new();
            collect_polygons(element, &mut polygons)?;
            if !polygons.is_empty() {
                return Ok(Geometry::MultiPolygon(polygons));
            }
            let first = element
                .children
                .iter()
                .find(|c| GEOMETRY_KINDS.contains(&c.name.as_str()))
                .ok_or(RecordError::MissingGeometry)?;
            parse_geometry(first)
        }
        other => Err(RecordError::Coordinates(format!("unsupported geometry <{}>", other))),
    }
}

fn collect_polygons(
    multi: &Element,
    out: &mut Vec<Vec<Vec<Position>>>,
) -> Result<(), RecordError> {
    for child in &multi.children {
        match child.name.as_str() {
            "Polygon" => out.push(polygon_rings(child)?),
            "MultiGeometry" => collect_polygons(child, out)?,
            _ => {}
        }
    }
    Ok(())
}

fn polygon_rings(polygon: &Element) -> Result<Vec<Vec<Position>>, RecordError> {
    let outer = polygon
        .child("outerBoundaryIs")
        .and_then(|b| b.child("LinearRing"))
        .ok_or_else(|| RecordError::Coordinates("Polygon has no outer boundary".to_string()))?;

    let mut rings = vec![coordinates_of(outer)?];
    for inner in polygon.children_named("innerBoundaryIs") {
        for ring in inner.children_named("LinearRing") {
            rings.push(coordinates_of(ring)?);
        }
    }
    Ok(rings)
}

fn coordinates_of(element: &Element) -> Result<Vec<Position>, RecordError> {
    let text = element
        .child("coordinates")
        .map(Element::text)
        .ok_or_else(|| RecordError::Coordinates(format!("<{}> has no coordinates", element.name)))?;
    parse_coordinates(text)
}

/// Parse a KML coordinate list: whitespace-separated `lon,lat[,alt]` tuples.
pub(crate) fn parse_coordinates(text: &str) -> Result<Vec<Position>, RecordError> {
    text.split_whitespace()
        .map(|tuple| {
            let position = tuple
                .split(',')
                .map(|n| n.trim().parse::<f64>())
                .collect::<Result<Position, _>>()
                .map_err(|e| RecordError::Coordinates(format!("'{}': {}", tuple, e)))?;
            if !(2..=3).contains(&position.len()) {
                return Err(RecordError::Coordinates(format!(
                    "'{}' has {} components",
                    tuple,
                    position.len()
                )));
            }
            Ok(position)
        })
        .collect()
}
