//! Cary publishes KML with attributes in `<ExtendedData>`.

use std::path::Path;

use permit_import_core::fields::FieldMapper;
use permit_import_core::models::{CanonicalField, FieldMap, Town};

use super::kml::{produce_kml, Element, KmlFields};
use super::{configured_mapper, present, FileError, RecordError, RecordStream, SourceAdapter};
use crate::config::TownConfig;

pub struct CaryAdapter {
    mapper: FieldMapper,
}

impl CaryAdapter {
    pub fn new(overrides: Option<&TownConfig>) -> Self {
        let defaults = FieldMapper::new(
            [
                ("ProjectName", CanonicalField::Name),
                ("Comments", CanonicalField::Comment),
                ("Type", CanonicalField::Category),
                ("ID", CanonicalField::ProjId),
                ("Link", CanonicalField::Link),
            ],
            Some(["Site/Sub Plan", "Rezoning Case"]),
        );
        Self {
            mapper: configured_mapper(defaults, overrides),
        }
    }
}

impl SourceAdapter for CaryAdapter {
    fn town(&self) -> Town {
        Town::Cary
    }

    fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    /// Cary's exports type their schema fields as `xsd:string` etc.
    fn sanitize(&self, raw: String) -> String {
        raw.replace("xsd:", "")
    }

    fn produce<'a>(&'a self, path: &Path) -> Result<RecordStream<'a>, FileError> {
        produce_kml(self, path)
    }
}

impl KmlFields for CaryAdapter {
    /// Pairs come from `<SchemaData><SimpleData name=..>` and
    /// `<Data name=..><value>`, in document order.
    fn extract_fields(&self, placemark: &Element) -> Result<FieldMap, RecordError> {
        let data = placemark
            .child("ExtendedData")
            .ok_or(RecordError::MissingExtendedData)?;

        let mut pairs: Vec<(&str, String)> = Vec::new();
        for node in &data.children {
            match node.name.as_str() {
                "SchemaData" => {
                    for simple in node.children_named("SimpleData") {
                        if let (Some(key), Some(value)) = (simple.attr("name"), present(simple.text())) {
                            pairs.push((key, value));
                        }
                    }
                }
                "Data" => {
                    let value = node.child("value").and_then(|v| present(v.text()));
                    if let (Some(key), Some(value)) = (node.attr("name"), value) {
                        pairs.push((key, value));
                    }
                }
                _ => {}
            }
        }

        Ok(self.mapper.map_pairs(pairs))
    }
}
