//! End-to-end tests of the query pipeline against Zarr rasters on disk.
//!
//! Covers:
//! - Listing and the YAML metadata cascade
//! - `info`, `icon`, `window` and `regions` operations
//! - Reprojection without fabricated values
//! - PNG rendering through an asset legend
//! - Output format fallback

use chrono::NaiveDate;
use image::ImageFormat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use stmap_core::{Call, CoreConfig, Dispatcher, MaskedArray, Payload, Response};
use test_utils::{
    assert_approx_eq, band_dates_yaml, constant_band, date_series, geographic_grid, ramp_band,
    unit_grid, with_nodata, AssetTree,
};

const NODATA: f32 = -9999.0;

// ============================================================================
// Helper functions
// ============================================================================

/// A data root with:
/// - `ndvi`: 3 dated bands over lon -180..-172, lat 86..90, one no-data cell
/// - `forest.biomass`: one band with a three-layer metadata cascade
/// - `elev`: one band over lon 10..18, lat 46..50
/// - `landcover`: a 2x2 class raster with a legend
fn fixture() -> AssetTree {
    let tree = AssetTree::new();

    let ndvi_bands = vec![
        with_nodata(ramp_band(8, 4, 1), 8, &[(0, 0)], NODATA),
        ramp_band(8, 4, 2),
        ramp_band(8, 4, 3),
    ];
    tree.add_raster("ndvi/default", &geographic_grid(8, 4, Some(NODATA as f64)), &ndvi_bands);
    let dates = date_series(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), 3, 10);
    tree.add_yaml("ndvi/default.yaml", &band_dates_yaml(&dates));

    tree.add_raster("forest/biomass", &unit_grid(4, 4, (0.0, 4.0), None), &[ramp_band(4, 4, 1)]);
    tree.add_yaml("forest.yaml", "units: t/ha\nsource: national\n");
    tree.add_yaml("forest/default.yaml", "source: regional\nresample-method: bilinear\n");
    tree.add_yaml("forest/biomass.yaml", "source: survey\n");

    tree.add_raster("elev/default", &unit_grid(8, 4, (10.0, 50.0), None), &[ramp_band(8, 4, 1)]);

    tree.add_raster(
        "landcover/default",
        &unit_grid(2, 2, (0.0, 2.0), Some(0.0)),
        &[vec![1.0, 2.0, 0.0, 1.0]],
    );
    tree.add_yaml(
        "landcover/default.yaml",
        "legend:\n  1: [Land, \"#00FF00\"]\n  2: [Water, \"#0000FF\"]\n",
    );

    tree
}

fn dispatcher(tree: &AssetTree) -> Dispatcher {
    Dispatcher::new(&CoreConfig {
        data_path: tree.root().to_path_buf(),
        ..CoreConfig::default()
    })
}

fn call(params: Value) -> Call {
    Call::from_value(params).expect("valid call")
}

fn run(tree: &AssetTree, params: Value) -> Response {
    let mut rng = StdRng::seed_from_u64(7);
    dispatcher(tree)
        .dispatch_with_rng(&call(params), &mut rng)
        .expect("operation succeeds")
}

fn run_array(tree: &AssetTree, mut params: Value) -> MaskedArray {
    params["output"] = json!("raw");
    match run(tree, params) {
        Response::Raw(Payload::Array(array)) => array,
        other => panic!("expected a raw array, got {:?}", other),
    }
}

fn run_json(tree: &AssetTree, mut params: Value) -> Value {
    params["output"] = json!("json");
    let (body, content_type) = run(tree, params).into_encoded().unwrap();
    assert_eq!(content_type, "application/json");
    serde_json::from_slice(&body).unwrap()
}

fn error_kind(tree: &AssetTree, params: Value) -> String {
    dispatcher(tree)
        .dispatch(&call(params))
        .expect_err("operation fails")
        .kind()
        .to_string()
}

// ============================================================================
// list / info / icon
// ============================================================================

#[test]
fn test_list_names_every_asset() {
    let tree = fixture();
    let names = run_json(&tree, json!({"operation": "list"}));
    assert_eq!(names, json!(["elev", "forest.biomass", "landcover", "ndvi"]));
}

#[test]
fn test_list_defaults_to_yaml() {
    let tree = fixture();
    let (body, content_type) = run(&tree, json!({"operation": "list"})).into_encoded().unwrap();
    assert_eq!(content_type, "text/plain; charset=utf-8");
    let names: Vec<String> = serde_yaml::from_slice(&body).unwrap();
    assert_eq!(names.len(), 4);
}

#[test]
fn test_info_reports_native_properties_and_iso_dates() {
    let tree = fixture();
    let info = run_json(&tree, json!({"operation": "info", "asset": "ndvi"}));

    assert_eq!(info["native-size"], json!([3, 8, 4]));
    assert_eq!(info["native-UL"], json!([-180.0, 90.0]));
    assert_eq!(info["native-resolution"], json!([1.0, -1.0]));
    assert_eq!(info["nodata"], json!(-9999.0));
    assert_eq!(
        info["band-dates"],
        json!({"1": "2000-01-01", "2": "2000-01-11", "3": "2000-01-21"})
    );
}

#[test]
fn test_metadata_cascade_later_layers_win() {
    let tree = fixture();
    let info = run_json(&tree, json!({"operation": "info", "asset": "forest.biomass"}));
    assert_eq!(info["units"], "t/ha");
    assert_eq!(info["source"], "survey");
    assert_eq!(info["resample-method"], "bilinear");
}

#[test]
fn test_info_unknown_asset() {
    let tree = fixture();
    assert_eq!(error_kind(&tree, json!({"operation": "info", "asset": "nope"})), "AssetNotFound");
    assert_eq!(
        error_kind(&tree, json!({"operation": "info", "asset": "..ndvi"})),
        "AssetNotFound"
    );
}

#[test]
fn test_icon_served_with_sniffed_type() {
    let tree = fixture();
    let png = renderer::encode_grayscale(&[10, 20, 30, 40], 2, 2).unwrap();
    tree.add_file("ndvi/default_icon.png", &png);

    let (body, content_type) = run(&tree, json!({"operation": "icon", "asset": "ndvi"}))
        .into_encoded()
        .unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(body, png);

    assert_eq!(error_kind(&tree, json!({"operation": "icon", "asset": "elev"})), "AssetNotFound");
}

// ============================================================================
// window
// ============================================================================

#[test]
fn test_native_window_picks_nearest_date() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "window",
            "asset": "ndvi",
            "window": [-180, 86, -172, 90],
            "window_size": [8, 4],
            "date": "2000-01-12",
        }),
    );

    assert_eq!(out.dim(), (1, 4, 8));
    assert_eq!(out.get(0, 0, 0), Some(20000.0));
    assert_eq!(out.get(0, 3, 5), Some(20503.0));
}

#[test]
fn test_single_day_range_selects_one_band() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "window",
            "asset": "ndvi",
            "window": [-180, 86, -172, 90],
            "window_size": [8, 4],
            "date": "[2000-01-21, 2000-01-21]",
        }),
    );
    assert_eq!(out.dim(), (1, 4, 8));
    assert_eq!(out.get(0, 1, 2), Some(30201.0));
}

#[test]
fn test_window_outside_raster_is_fully_masked() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "window",
            "asset": "ndvi",
            "window": [0, 0, 10, 10],
            "window_size": [4, 4],
            "date": "b1",
        }),
    );
    assert_eq!(out.dim(), (1, 4, 4));
    assert!(out.is_fully_masked());
}

#[test]
fn test_window_temporal_mean_skips_nodata() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "window",
            "asset": "ndvi",
            "window": [-180, 86, -172, 90],
            "window_size": [8, 4],
            "date": ["2000-01-01", "2000-01-21"],
            "reducers": "mean",
        }),
    );

    assert_eq!(out.dim(), (1, 4, 8));
    // Band 1 is no-data at the corner, so only bands 2 and 3 count
    assert_approx_eq!(out.get(0, 0, 0).unwrap(), 25000.0, 1e-9);
    assert_approx_eq!(out.get(0, 2, 3).unwrap(), 20302.0, 1e-9);
}

#[test]
fn test_window_requires_parameters() {
    let tree = fixture();
    let base = json!({
        "operation": "window",
        "asset": "ndvi",
        "window": [-180, 86, -172, 90],
        "window_size": [8, 4],
        "date": "b1",
    });
    for missing in ["window", "window_size", "date"] {
        let mut params = base.clone();
        params.as_object_mut().unwrap().remove(missing);
        assert_eq!(error_kind(&tree, params), "InvalidParameters", "without {}", missing);
    }
}

// ============================================================================
// Reprojection
// ============================================================================

#[test]
fn test_identity_reprojection_matches_native() {
    let tree = fixture();
    let params = json!({
        "operation": "window",
        "asset": "elev",
        "window": [11, 47, 15, 49],
        "window_size": [4, 2],
        "date": "b1",
    });

    let native = run_array(&tree, params.clone());
    let mut reprojected = params;
    reprojected["srs"] = json!("EPSG:4326");
    let warped = run_array(&tree, reprojected);

    assert_eq!(native.dim(), warped.dim());
    for row in 0..2 {
        for col in 0..4 {
            assert_eq!(native.get(0, row, col), warped.get(0, row, col));
        }
    }
}

#[test]
fn test_mercator_window_masks_instead_of_zero_filling() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "window",
            "asset": "elev",
            // lon 0..16, lat 47..49; the raster starts at lon 10
            "window": [0, 5942075, 1781111, 6274861],
            "window_size": [16, 4],
            "date": "b1",
            "srs": "EPSG:3857",
        }),
    );

    assert_eq!(out.dim(), (1, 4, 16));
    assert!(out.get(0, 1, 0).is_none());
    assert!(out.get(0, 1, 14).is_some());
    for row in 0..4 {
        for col in 0..16 {
            if let Some(v) = out.get(0, row, col) {
                assert!(v >= 10000.0, "fabricated value {} at ({}, {})", v, row, col);
            }
        }
    }
}

// ============================================================================
// regions
// ============================================================================

#[test]
fn test_point_region_reads_one_pixel_per_band() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "regions",
            "asset": "ndvi",
            "region": {"type": "Point", "coordinates": [-177.5, 88.5]},
        }),
    );
    assert_eq!(out.dim(), (3, 1, 1));
    assert_eq!(out.get(0, 0, 0), Some(10201.0));
    assert_eq!(out.get(2, 0, 0), Some(30201.0));
}

#[test]
fn test_polygon_region_spatial_mean() {
    let tree = fixture();
    let square = json!({
        "type": "Polygon",
        "coordinates": [[[1, 1], [3, 1], [3, 3], [1, 3], [1, 1]]],
    });
    let out = run_array(
        &tree,
        json!({
            "operation": "regions",
            "asset": "forest.biomass",
            "region": square,
            "reducers": ["s_mean"],
        }),
    );

    // Columns 1..=2 and rows 1..=2 of a 100-per-column, 1-per-row ramp
    assert_eq!(out.dim(), (1, 1, 1));
    assert_approx_eq!(out.get(0, 0, 0).unwrap(), 10151.5, 1e-9);
}

#[test]
fn test_continent_sized_region_reads_only_the_raster() {
    let tree = fixture();
    let out = run_array(
        &tree,
        json!({
            "operation": "regions",
            "asset": "forest.biomass",
            "region": "POLYGON ((-1e6 -1e6, 1e6 -1e6, 1e6 1e6, -1e6 1e6, -1e6 -1e6))",
            "region_type": "wkt",
            "coverage": "fractional",
        }),
    );
    assert_eq!(out.dim(), (1, 4, 4));
    assert_eq!(out.valid_count(), 16);

    let mean = run_array(
        &tree,
        json!({
            "operation": "regions",
            "asset": "forest.biomass",
            "region": "POLYGON ((-1e6 -1e6, 1e6 -1e6, 1e6 1e6, -1e6 1e6, -1e6 -1e6))",
            "region_type": "wkt",
            "reducers": "s_mean",
        }),
    );
    assert_approx_eq!(mean.get(0, 0, 0).unwrap(), 10151.5, 1e-9);
}

#[test]
fn test_fractional_coverage_weights_partial_pixels() {
    let tree = fixture();
    let params = |coverage: &str| {
        json!({
            "operation": "regions",
            "asset": "forest.biomass",
            // Covers column 1 fully and a quarter of column 2, in row 0
            "region": "POLYGON ((1 3, 2.25 3, 2.25 4, 1 4, 1 3))",
            "region_type": "wkt",
            "coverage": coverage,
            "reducers": "s_mean",
        })
    };

    let fractional = run_array(&tree, params("fractional"));
    // (1.0 * 10100 + 0.25 * 10200) / 1.25
    assert_approx_eq!(fractional.get(0, 0, 0).unwrap(), 10120.0, 1e-6);

    let binary = run_array(&tree, params("binary"));
    assert_approx_eq!(binary.get(0, 0, 0).unwrap(), 10100.0, 1e-6);
}

#[test]
fn test_region_in_another_srs() {
    let tree = fixture();
    // lon 12.5, lat 48.5 in Web Mercator
    let out = run_array(
        &tree,
        json!({
            "operation": "regions",
            "asset": "elev",
            "region": {"type": "Point", "coordinates": [1391493.63, 6190443.81]},
            "region_srs": "EPSG:3857",
        }),
    );
    assert_eq!(out.get(0, 0, 0), Some(10201.0));
}

#[test]
fn test_region_format_errors() {
    let tree = fixture();
    assert_eq!(
        error_kind(
            &tree,
            json!({"operation": "regions", "asset": "elev", "region": "<gml/>", "region_type": "gml"})
        ),
        "InvalidParameters"
    );
    assert_eq!(
        error_kind(
            &tree,
            json!({"operation": "regions", "asset": "elev", "region": {"type": "Point"}})
        ),
        "InvalidParameters"
    );
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn test_window_png_uses_legend() {
    let tree = fixture();
    let (body, content_type) = run(
        &tree,
        json!({
            "operation": "window",
            "asset": "landcover",
            "window": [0, 0, 2, 2],
            "window_size": [2, 2],
            "date": "b1",
        }),
    )
    .into_encoded()
    .unwrap();
    assert_eq!(content_type, "image/png");

    let rgba = image::load_from_memory_with_format(&body, ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0).0, [0, 255, 0, 255]);
    assert_eq!(rgba.get_pixel(1, 0).0, [0, 0, 255, 255]);
    assert_eq!(rgba.get_pixel(0, 1).0[3], 0);
}

#[test]
fn test_unknown_output_falls_back_to_json() {
    let tree = fixture();
    let (body, content_type) = run(
        &tree,
        json!({"operation": "list", "output": "xml"}),
    )
    .into_encoded()
    .unwrap();
    assert_eq!(content_type, "application/json");
    let names: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert!(names.contains(&"ndvi".to_string()));
}

#[test]
fn test_msgpack_masked_cells_are_nil() {
    let tree = fixture();
    let (body, content_type) = run(
        &tree,
        json!({
            "operation": "window",
            "asset": "ndvi",
            "window": [-180, 89, -178, 90],
            "window_size": [2, 1],
            "date": "b1",
            "output": "msgpack",
        }),
    )
    .into_encoded()
    .unwrap();
    assert_eq!(content_type, "application/octet-stream");

    let decoded: Vec<Vec<Vec<Option<f64>>>> = rmp_serde::from_slice(&body).unwrap();
    assert_eq!(decoded, vec![vec![vec![None, Some(10100.0)]]]);
}

#[test]
fn test_constant_band_renders_grayscale() {
    let tree = fixture();
    tree.add_raster("flat/default", &unit_grid(2, 2, (0.0, 2.0), None), &[constant_band(2, 2, 5.0)]);

    let (body, _) = run(
        &tree,
        json!({
            "operation": "window",
            "asset": "flat",
            "window": [0, 0, 2, 2],
            "window_size": [2, 2],
            "date": "b1",
        }),
    )
    .into_encoded()
    .unwrap();
    let luma = image::load_from_memory_with_format(&body, ImageFormat::Png)
        .unwrap()
        .to_luma_alpha8();
    assert!(luma.pixels().all(|p| p.0 == [255, 255]));
}
