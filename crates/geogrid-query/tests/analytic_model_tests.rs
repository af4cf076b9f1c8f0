//! Queries against a model built from the analytic data source.
//!
//! The analytic fields are bounded sinusoids, so every interpolated
//! value must stay inside the field amplitude: trilinear interpolation
//! is a convex combination of stored samples.

use std::path::Path;

use geogrid_common::Config;
use geogrid_create::{AnalyticDataSource, BuildSteps, Builder};
use geogrid_query::QueryDriver;

fn build_analytic_model(dir: &Path) -> std::path::PathBuf {
    let model_path = dir.join("analytic.geogrid");
    let mut config = Config::new();
    config
        .merge_text(
            r#"
[geomodelgrids]
title = Analytic model
id = analytic
description = Sinusoidal fields
keywords = [test]
version = 1.0.0
creator_name = Test
creator_email = test@example.org
creator_institution = Example Institution
acknowledgement = None
authors = [Test]
references = [None]
license = CC0
data_source = analytic

[coordsys]
crs = EPSG:26910
origin_x = 0.0
origin_y = 0.0
y_azimuth = 0.0

[data]
values = [one, two]
units = [m/s, m/s]
layout = vertex

[domain]
dim_x = 20000.0
dim_y = 20000.0
dim_z = 5000.0
blocks = [block]
batch_size = 2000

[top_surface]
x_resolution = 2000.0
y_resolution = 2000.0
chunk_size = [8, 8, 1]

[block]
x_resolution = 2000.0
y_resolution = 2000.0
z_resolution = 500.0
z_top = 0.0
z_bot = -5000.0
z_top_offset = 0.0
chunk_size = [4, 4, 4, 2]
"#,
            "test",
        )
        .unwrap();
    config.set(
        "geomodelgrids",
        "filename",
        model_path.to_string_lossy().to_string(),
    );
    Builder::new(&config)
        .unwrap()
        .run(BuildSteps::all(), &mut AnalyticDataSource::new())
        .unwrap();
    model_path
}

#[test]
fn test_interior_values_stay_within_field_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_analytic_model(dir.path());

    let mut driver = QueryDriver::new();
    driver
        .initialize(
            &[&model],
            &["one".to_string(), "two".to_string()],
            "EPSG:26910",
        )
        .unwrap();

    // Sample an off-grid lattice of interior points.
    let mut points = Vec::new();
    for i in 0..8 {
        for k in 0..6 {
            points.push([
                1300.0 + 2300.0 * i as f64,
                900.0 + 2100.0 * i as f64,
                -300.0 - 700.0 * k as f64,
            ]);
        }
    }
    let (values, errors) = driver.query(&points).unwrap();
    assert!(errors.iter().all(|&flag| flag == 0));
    for row in 0..points.len() {
        let one = values[row * 2];
        let two = values[row * 2 + 1];
        assert!((-400.0..=400.0).contains(&one), "one out of bounds: {one}");
        assert!((-50.0..=350.0).contains(&two), "two out of bounds: {two}");
    }
}

#[test]
fn test_warped_top_surface_is_queryable() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_analytic_model(dir.path());

    let mut driver = QueryDriver::new();
    driver
        .initialize(&[&model], &["one".to_string()], "EPSG:26910")
        .unwrap();

    // The analytic surface has 20 m amplitude; a point at the surface
    // elevation must be inside the model wherever the surface is high.
    let (elevations, errors) = driver
        .query_top_elevation(&[[6250.0, 0.0, 0.0]])
        .unwrap();
    assert_eq!(errors[0], 0);
    assert!((elevations[0] - 20.0).abs() < 0.5, "elevation {}", elevations[0]);

    let (_, errors) = driver.query(&[[6250.0, 0.0, elevations[0] - 0.5]]).unwrap();
    assert_eq!(errors[0], 0);
}
