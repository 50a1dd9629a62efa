//! Library-level import tests: real fixture files on disk, run through
//! `ImportPipeline` against the in-memory store and the SQLite store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use tempfile::TempDir;

use permit_import::adapters::FileError;
use permit_import::cache::{DirCache, NoCache, ReadCache};
use permit_import::config::{Config, TownsConfig};
use permit_import::crs::NC_STATE_PLANE_FEET;
use permit_import::ingest::{ImportError, ImportPipeline};
use permit_import::models::{DedupKey, PermitHit, PermitRecord, StoredPermit, Town};
use permit_import::sqlite_store::SqliteStore;
use permit_import::store::memory::InMemoryStore;
use permit_import::store::{PermitStore, TruncateScope};
use permit_import::{db, migrate};

const CARY_KML: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
  <Schema name="DevPlans" id="DevPlans">
    <SimpleField name="ProjectName" type="xsd:string"/>
    <SimpleField name="Type" type="xsd:string"/>
  </Schema>
  <Folder>
    <Placemark>
      <ExtendedData><SchemaData schemaUrl="#DevPlans">
        <SimpleData name="ProjectName">Carpenter Village</SimpleData>
        <SimpleData name="Type">Rezoning Case</SimpleData>
        <SimpleData name="ID">22-REZ-07</SimpleData>
        <SimpleData name="Comments">Rezone to mixed use</SimpleData>
      </SchemaData></ExtendedData>
      <Polygon><outerBoundaryIs><LinearRing><coordinates>
        -78.85,35.80,0 -78.84,35.80,0 -78.84,35.81,0 -78.85,35.80,0
      </coordinates></LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
    <Placemark>
      <ExtendedData><SchemaData schemaUrl="#DevPlans">
        <SimpleData name="ProjectName">Something Else</SimpleData>
        <SimpleData name="Type">Ignore Me</SimpleData>
      </SchemaData></ExtendedData>
      <Polygon><outerBoundaryIs><LinearRing><coordinates>
        -78.80,35.70,0 -78.79,35.70,0 -78.79,35.71,0 -78.80,35.70,0
      </coordinates></LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
  </Folder>
</Document>
</kml>
"##;

fn apex_placemark(name: &str, kind: &str, status: &str, fid: u32) -> String {
    format!(
        r#"<Placemark>
      <description><![CDATA[<html><body>
        <table><tr><td>Apex Development</td></tr></table>
        <table>
          <tr><td>Name</td><td>{name}</td></tr>
          <tr><td>Type</td><td>{kind}</td></tr>
          <tr><td>Status</td><td>{status}</td></tr>
          <tr><td>FID</td><td>{fid}</td></tr>
        </table></body></html>]]></description>
      <MultiGeometry><Polygon><outerBoundaryIs><LinearRing><coordinates>
        -78.86,35.73,12 -78.85,35.73,12 -78.85,35.74,12 -78.86,35.73,12
      </coordinates></LinearRing></outerBoundaryIs></Polygon></MultiGeometry>
      <gx:balloonVisibility>0</gx:balloonVisibility>
    </Placemark>"#
    )
}

fn apex_kml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2">
<Document>
  {}
  {}
  <Placemark><description>no table here</description></Placemark>
</Document>
</kml>
"#,
        apex_placemark("Salem Village", "Mixed Use", "Approved", 4),
        apex_placemark("Beaver Creek Homes", "Single Family", "Approved", 5),
    )
}

const EPSG_2264_URN: &str =
    r#"{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2264"}}"#;

/// Parcels in NC State Plane feet (EPSG:2264) around Morrisville.
fn morrisville_geojson() -> String {
    morrisville_collection(EPSG_2264_URN)
}

/// The same parcels with `crs` set to the given member.
fn morrisville_collection(crs: &str) -> String {
    let feature = |props: &str, x: f64| {
        format!(
            r#"{{"type": "Feature", "properties": {props},
               "geometry": {{"type": "Polygon", "coordinates": [[
                 [{x}, 755000.0], [{x1}, 755000.0], [{x1}, 755400.0], [{x}, 755000.0]
               ]]}}}}"#,
            x1 = x + 400.0
        )
    };
    let features = [
        feature(
            r#"{"PROPDESC": "PERIMETER PARK", "BILCLDECOD": "Business", "DEV_STATUS": "ACTIVE",
                "PIN_NUM": "0755123456", "LANDDECODE": "COMMERCIAL"}"#,
            2050000.0,
        ),
        feature(
            r#"{"PROPDESC": "EMPTY LOT", "BILCLDECOD": "Business", "DEV_STATUS": null,
                "PIN_NUM": "0755999999", "LANDDECODE": "VACANT"}"#,
            2051000.0,
        ),
        feature(
            r#"{"PROPDESC": "SHILOH HOMES", "BILCLDECOD": "Residential", "DEV_STATUS": "ACTIVE",
                "PIN_NUM": "0755222222", "LANDDECODE": "SINGLE FAMILY"}"#,
            2052000.0,
        ),
        feature(
            r#"{"PROPDESC": "NO PIN", "BILCLDECOD": "Business", "DEV_STATUS": "ACTIVE",
                "LANDDECODE": "OFFICE"}"#,
            2053000.0,
        ),
        feature(
            r#"{"PROPDESC": "LENOVO CAMPUS", "BILCLDECOD": "CORPORATE LISTING", "DEV_STATUS": "ACTIVE",
                "PIN_NUM": "0755333333", "LANDDECODE": "OFFICE"}"#,
            2054000.0,
        ),
    ];
    format!(
        r#"{{"type": "FeatureCollection",
            "crs": {crs},
            "features": [{}]}}"#,
        features.join(",")
    )
}

const NC_FEET_PRJ: &str = r#"PROJCS["NAD_1983_StatePlane_North_Carolina_FIPS_3200_Feet",GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"],PARAMETER["False_Easting",2000000.002616666],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",-79.0],PARAMETER["Standard_Parallel_1",34.33333333333334],PARAMETER["Standard_Parallel_2",36.16666666666666],PARAMETER["Latitude_Of_Origin",33.75],UNIT["Foot_US",0.3048006096012192]]"#;

const PARCEL_FIELDS: [&str; 5] = ["PROPDESC", "BILCLDECOD", "DEV_STATUS", "PIN_NUM", "LANDDECODE"];

/// Write `parcels.shp` (with `.shx`, `.dbf` and `.prj`) holding one
/// active business with a null status, one vacant business and one
/// corporate listing.
fn write_parcels_shapefile(dir: &Path) -> PathBuf {
    let path = dir.join("parcels.shp");
    let table = PARCEL_FIELDS
        .iter()
        .fold(TableWriterBuilder::new(), |table, name| {
            table.add_character_field(FieldName::try_from(*name).unwrap(), 40)
        });
    let mut writer = shapefile::Writer::from_path(&path, table).unwrap();

    let rows: [([Option<&str>; 5], f64); 3] = [
        (
            [Some("PERIMETER PARK"), Some("Business"), None, Some("0755123456"), Some("COMMERCIAL")],
            2050000.0,
        ),
        (
            [Some("EMPTY LOT"), Some("Business"), Some("ACTIVE"), Some("0755999999"), Some("VACANT")],
            2051000.0,
        ),
        (
            [
                Some("LENOVO CAMPUS"),
                Some("CORPORATE LISTING"),
                Some("ACTIVE"),
                Some("0755333333"),
                Some("OFFICE"),
            ],
            2054000.0,
        ),
    ];
    for (values, x) in rows {
        let mut record = Record::default();
        for (name, value) in PARCEL_FIELDS.iter().zip(values) {
            record.insert(name.to_string(), FieldValue::Character(value.map(str::to_string)));
        }
        let ring = vec![
            Point::new(x, 755000.0),
            Point::new(x, 755400.0),
            Point::new(x + 400.0, 755000.0),
            Point::new(x, 755000.0),
        ];
        let polygon = Polygon::new(PolygonRing::Outer(ring));
        writer.write_shape_and_record(&polygon, &record).unwrap();
    }
    drop(writer);

    fs::write(path.with_extension("prj"), NC_FEET_PRJ).unwrap();
    path
}

fn assert_in_morrisville(stored: &[StoredPermit]) {
    for permit in stored {
        for c in permit.record.region.0[0].exterior().coords() {
            assert!((-79.0..-78.6).contains(&c.x), "lon {}", c.x);
            assert!((35.6..36.0).contains(&c.y), "lat {}", c.y);
        }
    }
}

/// Delegates to an in-memory store but refuses inserts once it holds
/// `capacity` records.
struct FullStore {
    inner: InMemoryStore,
    capacity: i64,
}

#[async_trait]
impl PermitStore for FullStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn insert(&self, record: &PermitRecord) -> Result<i64> {
        if self.inner.count(None).await? >= self.capacity {
            anyhow::bail!("database or disk is full");
        }
        self.inner.insert(record).await
    }

    async fn truncate(&self, scope: TruncateScope) -> Result<u64> {
        self.inner.truncate(scope).await
    }

    async fn rebuild_search_index(&self) -> Result<()> {
        self.inner.rebuild_search_index().await
    }

    async fn count(&self, town: Option<Town>) -> Result<i64> {
        self.inner.count(town).await
    }

    async fn list(&self, town: Option<Town>) -> Result<Vec<StoredPermit>> {
        self.inner.list(town).await
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<PermitHit>> {
        self.inner.search(query, limit).await
    }
}

fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[derive(Default)]
struct CountingCache {
    clears: AtomicUsize,
}

impl ReadCache for CountingCache {
    fn invalidate_all(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn memory_pipeline() -> (Arc<InMemoryStore>, Arc<CountingCache>, ImportPipeline) {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(CountingCache::default());
    let pipeline = ImportPipeline::new(store.clone(), cache.clone(), TownsConfig::default());
    (store, cache, pipeline)
}

async fn sqlite_pipeline(tmp: &TempDir) -> (Arc<SqliteStore>, ImportPipeline) {
    let config = Config::minimal(tmp.path().join("data/permits.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let pipeline = ImportPipeline::new(store.clone(), Arc::new(NoCache), TownsConfig::default());
    (store, pipeline)
}

#[tokio::test]
async fn test_cary_keeps_only_allowed_categories() {
    let tmp = TempDir::new().unwrap();
    let path = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let (store, _cache, pipeline) = memory_pipeline();

    let report = pipeline.import_file("cary", &path).await.unwrap();
    assert_eq!(report.town, Town::Cary);
    assert_eq!(report.produced, 1);
    assert_eq!(report.persisted, 1);
    assert!(report.skipped.is_empty());

    let stored = store.list(None).await.unwrap();
    assert_eq!(stored.len(), 1);
    let record = &stored[0].record;
    assert_eq!(record.name.as_deref(), Some("Carpenter Village"));
    assert_eq!(record.category.as_deref(), Some("Rezoning Case"));
    assert_eq!(record.proj_id.as_deref(), Some("22-REZ-07"));
    assert_eq!(record.comment.as_deref(), Some("Rezone to mixed use"));
    assert_eq!(record.link, None);
    assert_eq!(record.region.0.len(), 1);
    assert_eq!(record.region.0[0].exterior().0[0].x, -78.85);
}

#[tokio::test]
async fn test_reimport_persists_nothing_new() {
    let tmp = TempDir::new().unwrap();
    let path = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let (store, _cache, pipeline) = memory_pipeline();

    pipeline.import_file("cary", &path).await.unwrap();
    let second = pipeline.import_file("cary", &path).await.unwrap();

    assert_eq!(second.persisted, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_apex_reads_description_tables() {
    let tmp = TempDir::new().unwrap();
    let path = write_fixture(tmp.path(), "apex.kml", &apex_kml());
    let (store, _cache, pipeline) = memory_pipeline();

    let report = pipeline.import_file("apex", &path).await.unwrap();
    assert_eq!(report.persisted, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("attribute table"));

    let stored = store.list(Some(Town::Apex)).await.unwrap();
    let record = &stored[0].record;
    assert_eq!(record.name.as_deref(), Some("Salem Village"));
    assert_eq!(record.status.as_deref(), Some("Approved"));
    assert_eq!(record.proj_id.as_deref(), Some("4"));
    // Elevation of 12 was dropped.
    let first = record.region.0[0].exterior().0[0];
    assert_eq!((first.x, first.y), (-78.86, 35.73));
}

#[tokio::test]
async fn test_morrisville_reprojects_and_filters() {
    let tmp = TempDir::new().unwrap();
    let path = write_fixture(tmp.path(), "parcels.geojson", &morrisville_geojson());
    let (store, _cache, pipeline) = memory_pipeline();

    let report = pipeline.import_file("morrisville", &path).await.unwrap();
    assert_eq!(report.persisted, 2);
    assert_eq!(report.produced, 3);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 2);
    assert!(report.skipped[0].reason.contains("PIN_NUM"));

    let stored = store.list(None).await.unwrap();
    let names: Vec<_> = stored.iter().map(|p| p.record.name.clone().unwrap()).collect();
    assert_eq!(names, ["PERIMETER PARK", "LENOVO CAMPUS"]);
    assert!(stored.iter().all(|p| p.record.comment.as_deref() != Some("VACANT")));
    assert_in_morrisville(&stored);
}

#[tokio::test]
async fn test_morrisville_proj4_crs_matches_named_crs() {
    let tmp = TempDir::new().unwrap();
    let named = write_fixture(tmp.path(), "named.geojson", &morrisville_geojson());
    let proj4_member = format!(
        r#"{{"type": "proj4", "properties": {{"proj4": "{}"}}}}"#,
        NC_STATE_PLANE_FEET
    );
    let proj4 = write_fixture(
        tmp.path(),
        "proj4.geojson",
        &morrisville_collection(&proj4_member),
    );

    let (named_store, _, named_pipeline) = memory_pipeline();
    let (proj4_store, _, proj4_pipeline) = memory_pipeline();
    named_pipeline.import_file("morrisville", &named).await.unwrap();
    let report = proj4_pipeline.import_file("morrisville", &proj4).await.unwrap();
    assert_eq!(report.persisted, 2);

    let expected: Vec<_> = named_store.list(None).await.unwrap().into_iter().map(|p| p.record.region).collect();
    let stored = proj4_store.list(None).await.unwrap();
    assert_in_morrisville(&stored);
    let regions: Vec<_> = stored.into_iter().map(|p| p.record.region).collect();
    assert_eq!(regions, expected);
}

#[tokio::test]
async fn test_morrisville_shapefile_import() {
    let tmp = TempDir::new().unwrap();
    let path = write_parcels_shapefile(tmp.path());
    let (store, _cache, pipeline) = memory_pipeline();

    let report = pipeline.import_file("morrisville", &path).await.unwrap();
    assert_eq!(report.produced, 2);
    assert_eq!(report.persisted, 2);
    assert!(report.skipped.is_empty());

    let stored = store.list(None).await.unwrap();
    let names: Vec<_> = stored.iter().map(|p| p.record.name.clone().unwrap()).collect();
    assert_eq!(names, ["PERIMETER PARK", "LENOVO CAMPUS"]);
    assert_eq!(stored[0].record.status, None);
    assert_eq!(stored[0].record.proj_id.as_deref(), Some("0755123456"));
    assert_eq!(stored[1].record.status.as_deref(), Some("ACTIVE"));
    assert_in_morrisville(&stored);

    let again = pipeline.import_file("morrisville", &path).await.unwrap();
    assert_eq!(again.persisted, 0);
    assert_eq!(again.duplicates, 2);
    assert_eq!(store.count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_store_failure_still_indexes_committed_records() {
    let tmp = TempDir::new().unwrap();
    let path = write_fixture(tmp.path(), "parcels.geojson", &morrisville_geojson());
    let store = Arc::new(FullStore {
        inner: InMemoryStore::new(),
        capacity: 1,
    });
    let cache = Arc::new(CountingCache::default());
    let pipeline = ImportPipeline::new(store.clone(), cache.clone(), TownsConfig::default());

    let err = pipeline.import_file("morrisville", &path).await.unwrap_err();
    assert!(matches!(err, ImportError::Store(_)));
    assert!(err.to_string().contains("disk is full"));

    assert_eq!(store.inner.rebuild_count(), 1);
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);
    let hits = store.search("perimeter", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_finalize_runs_once_per_file() {
    let tmp = TempDir::new().unwrap();
    let cary = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let parcels = write_fixture(tmp.path(), "parcels.geojson", &morrisville_geojson());
    let (store, cache, pipeline) = memory_pipeline();

    pipeline.import_file("cary", &cary).await.unwrap();
    assert_eq!(store.rebuild_count(), 1);
    assert_eq!(cache.clears.load(Ordering::SeqCst), 1);

    pipeline.import_file("morrisville", &parcels).await.unwrap();
    assert_eq!(store.rebuild_count(), 2);
    assert_eq!(cache.clears.load(Ordering::SeqCst), 2);

    // Nothing new, still finalized.
    pipeline.import_file("cary", &cary).await.unwrap();
    assert_eq!(store.rebuild_count(), 3);
    assert_eq!(cache.clears.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_records_searchable_only_after_import_finishes() {
    let tmp = TempDir::new().unwrap();
    let path = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let (store, _cache, pipeline) = memory_pipeline();

    pipeline.import_file("cary", &path).await.unwrap();
    let hits = store.search("carpenter", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].town, Town::Cary);
}

#[tokio::test]
async fn test_unknown_source_does_not_touch_store() {
    let (store, cache, pipeline) = memory_pipeline();
    let err = pipeline
        .import_file("raleigh", Path::new("/nonexistent/raleigh.kml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::UnknownSource(_)));
    assert_eq!(store.rebuild_count(), 0);
    assert_eq!(cache.clears.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_file_errors() {
    let tmp = TempDir::new().unwrap();
    let (store, _cache, pipeline) = memory_pipeline();

    let broken = write_fixture(tmp.path(), "broken.kml", "<kml><Document><Placemark></kml>");
    let err = pipeline.import_file("cary", &broken).await.unwrap_err();
    assert!(matches!(err, ImportError::File { source: FileError::Kml(_), .. }));

    let shp = write_fixture(tmp.path(), "parcels.shp", "");
    let err = pipeline.import_file("morrisville", &shp).await.unwrap_err();
    assert!(matches!(err, ImportError::File { source: FileError::MissingPrj(_), .. }));

    let bad_crs = write_fixture(
        tmp.path(),
        "bad.geojson",
        r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "EPSG:99999"}},
            "features": []}"#,
    );
    let err = pipeline.import_file("morrisville", &bad_crs).await.unwrap_err();
    assert!(matches!(err, ImportError::File { source: FileError::Crs(_), .. }));

    assert_eq!(store.rebuild_count(), 0);
}

#[tokio::test]
async fn test_import_files_stops_at_first_failure() {
    let tmp = TempDir::new().unwrap();
    let cary = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let missing = tmp.path().join("missing.kml");
    let (store, _cache, pipeline) = memory_pipeline();

    let err = pipeline
        .import_files("cary", &[cary.clone(), missing.clone(), cary])
        .await
        .unwrap_err();
    match err {
        ImportError::File { path, .. } => assert_eq!(path, missing),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(store.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_sqlite_dedup_truncate_and_reimport() {
    let tmp = TempDir::new().unwrap();
    let cary = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let apex = write_fixture(tmp.path(), "apex.kml", &apex_kml());
    let (store, pipeline) = sqlite_pipeline(&tmp).await;

    let first = pipeline.import_file("cary", &cary).await.unwrap();
    assert_eq!(first.persisted, 1);
    pipeline.import_file("apex", &apex).await.unwrap();

    // Absent link/status compare equal on reimport.
    let again = pipeline.import_file("cary", &cary).await.unwrap();
    assert_eq!(again.persisted, 0);
    assert_eq!(again.duplicates, 1);
    assert_eq!(store.count(None).await.unwrap(), 2);

    let deleted = pipeline.truncate(TruncateScope::Town(Town::Cary)).await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.count(Some(Town::Cary)).await.unwrap(), 0);
    assert_eq!(store.count(Some(Town::Apex)).await.unwrap(), 1);
    assert!(store.search("carpenter", 10).await.unwrap().is_empty());

    let restored = pipeline.import_file("cary", &cary).await.unwrap();
    assert_eq!(restored.persisted, 1);
    assert_eq!(store.count(Some(Town::Cary)).await.unwrap(), 1);

    let stored = store.list(Some(Town::Cary)).await.unwrap();
    assert_eq!(stored[0].record.name.as_deref(), Some("Carpenter Village"));
    assert_eq!(stored[0].record.region.0[0].exterior().0.len(), 4);

    let hits = store.search("Rezoning", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name.as_deref(), Some("Carpenter Village"));

    assert_eq!(pipeline.truncate(TruncateScope::All).await.unwrap(), 2);
    assert_eq!(store.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dir_cache_cleared_after_import() {
    let tmp = TempDir::new().unwrap();
    let cary = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let cache_dir = tmp.path().join("cache");
    fs::create_dir_all(cache_dir.join("tiles")).unwrap();
    fs::write(cache_dir.join("tiles/permits.json"), "[]").unwrap();

    let pipeline = ImportPipeline::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(DirCache::new(&cache_dir)),
        TownsConfig::default(),
    );
    pipeline.import_file("cary", &cary).await.unwrap();

    assert!(cache_dir.is_dir());
    assert_eq!(fs::read_dir(&cache_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_town_overrides_from_config() {
    let tmp = TempDir::new().unwrap();
    let cary = write_fixture(tmp.path(), "cary.kml", CARY_KML);
    let towns: TownsConfig = toml::from_str(
        r#"
        [cary]
        categories = ["Ignore Me"]
        "#,
    )
    .unwrap();
    let store = Arc::new(InMemoryStore::new());
    let pipeline = ImportPipeline::new(store.clone(), Arc::new(NoCache), towns);

    pipeline.import_file("cary", &cary).await.unwrap();
    let stored = store.list(None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record.name.as_deref(), Some("Something Else"));
}
