//! Pipeline Integration Tests
//!
//! Runs the full build from files on disk: config → registry, occurrence CSV,
//! subdivision map, boundary directory → map.geojson.

use serde_json::{json, Value};
use species_map_builder::{DefectKind, Pipeline, PipelineConfig, PipelineError, RegionCode};
use std::fs;
use std::path::Path;

fn square(x: f64, y: f64) -> Value {
    json!([[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]])
}

fn open_square(x: f64, y: f64) -> Value {
    json!([[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0]]])
}

/// Argentina fixture: Sp1 → AGE, Sp2 + Sp3 → AGW, {AGE, AGW} → ARG
fn write_fixture(dir: &Path) {
    fs::write(
        dir.join("region_codes.json"),
        json!({
            "AGE": {"name": "Argentina Northeast", "flag": ""},
            "AGW": {"name": "Argentina Northwest", "flag": ""},
            "ARG": {"name": "Argentina", "flag": "https://flagcdn.com/ar.svg"},
            "FLA": {"name": "Florida", "flag": ""},
            "TDC": {"name": "Tristan da Cunha", "flag": ""}
        })
        .to_string(),
    )
    .unwrap();

    fs::write(
        dir.join("location.csv"),
        "Area_code_L3,SpecName\nAGE,Sp1\nAGW,Sp2\nAGW,Sp3\nAGW,Sp3\nFLA,Sabal palmetto\nZZZ,Sp4\n",
    )
    .unwrap();

    fs::write(
        dir.join("subdivisions.json"),
        r#"{"rollups": {"ARG": ["AGE", "AGW"]}}"#,
    )
    .unwrap();

    let areas = dir.join("areas");
    fs::create_dir_all(&areas).unwrap();
    fs::write(
        areas.join("AGE.geojson"),
        json!({
            "type": "Feature",
            "properties": {"name": "Argentina Northeast"},
            "geometry": {"type": "Polygon", "coordinates": square(-60.0, -30.0)}
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        areas.join("AGW_Argentina Northwest.geojson"),
        json!({"type": "Polygon", "coordinates": open_square(-68.0, -28.0)}).to_string(),
    )
    .unwrap();
    fs::write(
        areas.join("FLA.geojson"),
        json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": square(-82.0, 27.0)}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": square(-80.0, 25.0)}}
            ]
        })
        .to_string(),
    )
    .unwrap();

    fs::write(
        dir.join("pipeline.json"),
        json!({
            "registry": "region_codes.json",
            "occurrences": {"path": "location.csv", "layout": "long"},
            "subdivision_map": "subdivisions.json",
            "boundary_dirs": ["areas"],
            "output": "out/map.geojson",
            "areas_csv": "out/areas.csv"
        })
        .to_string(),
    )
    .unwrap();
}

fn run(dir: &Path) -> species_map_builder::Result<species_map_builder::PipelineReport> {
    let config = PipelineConfig::load(&dir.join("pipeline.json"))?;
    Pipeline::from_config(config)?.run()
}

fn read_map(dir: &Path) -> Value {
    let contents = fs::read_to_string(dir.join("out/map.geojson")).unwrap();
    serde_json::from_str(&contents).unwrap()
}

fn feature<'a>(map: &'a Value, code: &str) -> Option<&'a Value> {
    map["features"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["properties"]["locationCode"] == code)
}

fn all_rings(geometry: &Value) -> Vec<&Vec<Value>> {
    let polygons: Vec<&Value> = match geometry["type"].as_str() {
        Some("Polygon") => vec![&geometry["coordinates"]],
        Some("MultiPolygon") => geometry["coordinates"].as_array().unwrap().iter().collect(),
        _ => Vec::new(),
    };
    polygons
        .into_iter()
        .flat_map(|p| p.as_array().unwrap())
        .map(|ring| ring.as_array().unwrap())
        .collect()
}

#[test]
fn test_argentina_rollup_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let report = run(dir.path()).unwrap();
    let map = read_map(dir.path());

    assert_eq!(map["type"], "FeatureCollection");
    assert_eq!(feature(&map, "AGE").unwrap()["properties"]["speciesCount"], 1);
    assert_eq!(feature(&map, "AGW").unwrap()["properties"]["speciesCount"], 2);

    let arg = feature(&map, "ARG").unwrap();
    assert_eq!(arg["properties"]["speciesCount"], 3);
    assert_eq!(arg["properties"]["densityZone"], "Very Low");
    assert_eq!(arg["properties"]["color"], "#ffffcc");
    assert_eq!(arg["properties"]["flag"], "https://flagcdn.com/ar.svg");
    assert_eq!(arg["properties"]["subdivisions"][1]["code"], "AGW");
    assert_eq!(arg["properties"]["subdivisions"][1]["speciesCount"], 2);
    // No ARG boundary file: merged from AGE + AGW
    assert_eq!(arg["geometry"]["type"], "MultiPolygon");

    assert_eq!(report.summary.total_features, 4);
    assert_eq!(report.summary.top_regions[0].code.as_str(), "ARG");
}

#[test]
fn test_every_ring_closed_and_codes_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let report = run(dir.path()).unwrap();
    let map = read_map(dir.path());

    let features = map["features"].as_array().unwrap();
    let codes: Vec<&str> = features
        .iter()
        .map(|f| f["properties"]["locationCode"].as_str().unwrap())
        .collect();
    let mut sorted = codes.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(codes, sorted);

    for f in features {
        for ring in all_rings(&f["geometry"]) {
            assert!(ring.len() >= 4);
            assert_eq!(ring.first(), ring.last());
        }
    }

    // AGW was auto-closed, FLA's second feature ignored
    assert_eq!(report.defects.count(DefectKind::OpenRing), 1);
    assert_eq!(report.defects.count(DefectKind::DuplicateFeature), 1);
    assert_eq!(feature(&map, "FLA").unwrap()["geometry"]["coordinates"][0][0][0], -82.0);
}

#[test]
fn test_missing_boundary_and_unknown_code_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let report = run(dir.path()).unwrap();
    let map = read_map(dir.path());

    let zzz = RegionCode::parse("ZZZ").unwrap();
    assert_eq!(report.assembly.omitted, vec![zzz]);
    assert!(feature(&map, "ZZZ").is_none());
    assert_eq!(report.defects.count(DefectKind::UnknownRegion), 1);
    assert_eq!(report.defects.count(DefectKind::MissingBoundary), 1);
}

#[test]
fn test_zero_count_code_emitted_as_no_data() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let mut config = PipelineConfig::load(&dir.path().join("pipeline.json")).unwrap();
    config.include_registry_codes = true;

    Pipeline::from_config(config).unwrap().run().unwrap();
    let map = read_map(dir.path());

    let tdc = feature(&map, "TDC").unwrap();
    assert_eq!(tdc["properties"]["speciesCount"], 0);
    assert_eq!(tdc["properties"]["densityZone"], "No Data");
    assert_eq!(tdc["properties"]["color"], "#f0f0f0");
    assert!(tdc["geometry"].is_null());
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    run(dir.path()).unwrap();
    let first_map = fs::read(dir.path().join("out/map.geojson")).unwrap();
    let first_areas = fs::read(dir.path().join("out/areas.csv")).unwrap();

    run(dir.path()).unwrap();
    let second_map = fs::read(dir.path().join("out/map.geojson")).unwrap();
    let second_areas = fs::read(dir.path().join("out/areas.csv")).unwrap();

    assert_eq!(first_map, second_map);
    assert_eq!(first_areas, second_areas);
}

#[test]
fn test_fatal_source_error_keeps_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    run(dir.path()).unwrap();
    let before = fs::read(dir.path().join("out/map.geojson")).unwrap();

    fs::write(dir.path().join("region_codes.json"), "{ truncated").unwrap();
    let result = run(dir.path());

    assert!(matches!(result, Err(PipelineError::SourceUnavailable { .. })));
    assert_eq!(fs::read(dir.path().join("out/map.geojson")).unwrap(), before);
}

#[test]
fn test_write_failure_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let mut config = PipelineConfig::load(&dir.path().join("pipeline.json")).unwrap();
    // A directory where the map file should go: the final rename fails
    fs::create_dir_all(dir.path().join("out/map.geojson")).unwrap();
    config.areas_csv = None;

    let result = Pipeline::from_config(config).unwrap().run();

    assert!(matches!(result, Err(PipelineError::WriteFailure { .. })));
    let leftovers: Vec<_> = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_builtin_map_fans_out_borneo() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    fs::write(
        dir.path().join("location.csv"),
        "Area_code_L3,SpecName\nBOR,Licuala spinosa\nBOR,Nypa fruticans\nMLY,Nypa fruticans\nJAW,Areca catechu\n",
    )
    .unwrap();
    let areas = dir.path().join("areas");
    fs::write(
        areas.join("BOR.geojson"),
        json!({"type": "Polygon", "coordinates": square(114.0, 0.0)}).to_string(),
    )
    .unwrap();
    fs::write(
        areas.join("MLY.geojson"),
        json!({"type": "Polygon", "coordinates": square(101.0, 3.0)}).to_string(),
    )
    .unwrap();
    fs::write(
        areas.join("JAW.geojson"),
        json!({"type": "Polygon", "coordinates": square(110.0, -7.0)}).to_string(),
    )
    .unwrap();

    let mut config = PipelineConfig::load(&dir.path().join("pipeline.json")).unwrap();
    config.subdivision_map = None;
    Pipeline::from_config(config).unwrap().run().unwrap();
    let map = read_map(dir.path());

    let count = |code: &str| feature(&map, code).unwrap()["properties"]["speciesCount"].clone();
    assert_eq!(count("BOR"), 2);
    // Fan-out: Borneo's full set goes to both countries
    assert_eq!(count("MLY"), 2);
    assert_eq!(count("IDN"), 3);

    // Malaysia's boundary carries Borneo as an extra part
    let mly = feature(&map, "MLY").unwrap();
    assert_eq!(mly["geometry"]["type"], "MultiPolygon");
    assert_eq!(mly["geometry"]["coordinates"].as_array().unwrap().len(), 2);

    // Indonesia: merged from its subdivisions (JAW only has a boundary here)
    let idn = feature(&map, "IDN").unwrap();
    assert_eq!(idn["geometry"]["type"], "Polygon");
    let breakdown: Vec<&str> = idn["properties"]["subdivisions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["code"].as_str().unwrap())
        .collect();
    assert_eq!(breakdown, vec!["JAW", "LSI", "MOL", "SUL", "SUM", "BOR"]);
}
