//! Apex publishes KML whose attributes live in an HTML table embedded in
//! each placemark's `<description>`.

use std::path::Path;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use permit_import_core::fields::FieldMapper;
use permit_import_core::models::{CanonicalField, FieldMap, Town};

use super::kml::{produce_kml, Element, KmlFields};
use super::{configured_mapper, present, FileError, RecordError, RecordStream, SourceAdapter};
use crate::config::TownConfig;

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

pub struct ApexAdapter {
    mapper: FieldMapper,
}

impl ApexAdapter {
    pub fn new(overrides: Option<&TownConfig>) -> Self {
        let defaults = FieldMapper::new(
            [
                ("More_Info", CanonicalField::Link),
                ("Type", CanonicalField::Category),
                ("Status", CanonicalField::Status),
                ("FID", CanonicalField::ProjId),
                ("Name", CanonicalField::Name),
            ],
            Some(["Mixed Use", "Non-Residential"]),
        );
        Self {
            mapper: configured_mapper(defaults, overrides),
        }
    }
}

impl SourceAdapter for ApexAdapter {
    fn town(&self) -> Town {
        Town::Apex
    }

    fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    /// Google Earth extension elements (`gx:`) are not needed.
    fn sanitize(&self, raw: String) -> String {
        raw.replace("gx:", "")
    }

    fn produce<'a>(&'a self, path: &Path) -> Result<RecordStream<'a>, FileError> {
        produce_kml(self, path)
    }
}

impl KmlFields for ApexAdapter {
    fn extract_fields(&self, placemark: &Element) -> Result<FieldMap, RecordError> {
        let description = placemark
            .child("description")
            .ok_or(RecordError::MissingDescription)?;
        let pairs = description_table(description.text())?;
        Ok(self.mapper.map_pairs(pairs))
    }
}

/// Key/value rows of the second table in an ArcGIS popup description.
///
/// The first table is the popup header. Only rows with exactly two cells
/// are attribute rows; blank values are dropped.
fn description_table(html: &str) -> Result<Vec<(String, String)>, RecordError> {
    let fragment = Html::parse_fragment(html);
    let table = fragment
        .select(&TABLE)
        .nth(1)
        .ok_or(RecordError::MissingDescriptionTable)?;

    let mut pairs = Vec::new();
    for row in table.select(&ROW) {
        let cells: Vec<String> = row
            .select(&CELL)
            .map(|cell| cell.text().collect::<String>())
            .collect();
        if let [key, value] = cells.as_slice() {
            if let Some(value) = present(value) {
                pairs.push((key.trim().to_string(), value));
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POPUP: &str = r#"
        <html><body>
        <table><tr><td>Apex Development Projects</td></tr></table>
        <table>
          <tr><td>Name</td><td>Salem Village</td></tr>
          <tr><td>Type</td><td>Mixed Use</td></tr>
          <tr><td>Status</td><td> Under Review </td></tr>
          <tr><td>FID</td><td>12</td></tr>
          <tr><td>Acreage</td><td>4.1</td></tr>
          <tr><td colspan="2">section break</td></tr>
          <tr><td>More_Info</td><td></td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn reads_two_cell_rows_of_second_table() {
        let pairs = description_table(POPUP).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("Name".to_string(), "Salem Village".to_string()),
                ("Type".to_string(), "Mixed Use".to_string()),
                ("Status".to_string(), "Under Review".to_string()),
                ("FID".to_string(), "12".to_string()),
                ("Acreage".to_string(), "4.1".to_string()),
            ]
        );

        let adapter = ApexAdapter::new(None);
        let fields = adapter.mapper().map_pairs(pairs);
        assert_eq!(fields[&CanonicalField::Status], "Under Review");
        assert!(!fields.contains_key(&CanonicalField::Link));
        assert!(adapter.is_interesting(&fields));
    }

    #[test]
    fn single_table_is_a_record_error() {
        let err = description_table("<table><tr><td>a</td><td>b</td></tr></table>").unwrap_err();
        assert!(matches!(err, RecordError::MissingDescriptionTable));
    }

    #[test]
    fn sanitize_strips_gx_prefix() {
        let adapter = ApexAdapter::new(None);
        assert_eq!(
            adapter.sanitize("<gx:altitudeMode>clampToGround</gx:altitudeMode>".to_string()),
            "<altitudeMode>clampToGround</altitudeMode>"
        );
    }
}
