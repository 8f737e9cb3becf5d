use std::path::{Path, PathBuf};

use geojson::Feature;

use crate::{
    config::SewerConfig,
    crs::reprojection::reproject_features,
    dirs::{list_files_with_suffix, recreate_dir, ScratchDir},
    error::{EtlError, EtlResult},
    geofile::{
        feature::new_feature_collection,
        gdal_geofile::read_features_from_geofile,
        geojson::{read_feature_collection, write_feature_collection, write_json},
    },
};

use super::{
    bbox::calculate_bbox_info,
    correlation::{correlate_pipes, correlate_shafts, partition_points, PartitionedPoints},
    fields::OUTPUT_NAMES,
    height::add_height_offset,
    layers::{assign_ids, remove_height_sentinels, SewerLayers},
    rename::rename_properties,
    shaft_lines::derive_shaft_lines,
};

/// Kinds of output collections. The database loader derives the collection from the file name
/// suffix, see `db::loader::CollectionKind`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SewerOutput {
    Shafts,
    ShaftLines,
    Pipes,
    Polygons,
}

impl SewerOutput {
    pub fn file_suffix(&self) -> &'static str {
        match self {
            SewerOutput::Shafts => "point",
            SewerOutput::ShaftLines => "point_as_lines",
            SewerOutput::Pipes => "line",
            SewerOutput::Polygons => "polygon",
        }
    }

    pub fn collection_name(&self, dataset_name: &str) -> String {
        format!("{}_{}", dataset_name, self.file_suffix())
    }
}

/// Number of features written per output.
#[derive(Debug, Default, PartialEq)]
pub struct SewerSummary {
    pub shafts: usize,
    pub shaft_lines: usize,
    pub pipes: usize,
    pub polygons: usize,
}

/// Convert the shapefiles of the input directory into GeoJSON collections of shafts, shaft depth
/// lines, pipes and polygons, each with a bounding box file, in the output directory.
///
/// Steps:
/// 1. Convert the shapefiles to GeoJSON in the processing directory.
/// 2. Remove points without known height.
/// 3. Apply the geoid undulation.
/// 4. Attach label attributes to shafts and pipes.
/// 5. Number the features.
/// 6. Reproject to the target CRS.
/// 7. Derive shaft depth lines.
/// 8. Calculate bounding boxes, rename attributes and write everything.
pub fn prepare_sewers(config: &SewerConfig) -> EtlResult<SewerSummary> {
    let scratch = ScratchDir::create(&config.processing_dir)?;
    recreate_dir(&config.output_dir)?;

    let shapefiles = list_files_with_suffix(&config.input_dir, ".shp")?;
    if shapefiles.is_empty() {
        return Err(EtlError::ConfigMissing(format!(
            "No shapefiles found in {:?}",
            config.input_dir
        )));
    }
    let layers = convert_shapefiles(&shapefiles, config, &scratch)?;
    let source_crs = layers.crs.ok_or_else(|| {
        EtlError::unrecognized(config.input_dir.to_string_lossy(), "all shapefiles are empty")
    })?;

    let mut points = remove_height_sentinels(layers.points, &config.correlation);
    let mut pipes = layers.lines;
    let mut polygons = layers.polygons;

    log::info!(
        "Adding height offset ({}m) to geometries",
        config.geoid_undulation
    );
    add_height_offset(&mut points, config.geoid_undulation)?;
    add_height_offset(&mut pipes, config.geoid_undulation)?;
    add_height_offset(&mut polygons, config.geoid_undulation)?;

    let PartitionedPoints { shafts, labels } = partition_points(points, &config.correlation);
    let mut shafts = correlate_shafts(shafts, &labels, &config.correlation);
    correlate_pipes(&mut pipes, &labels, &config.correlation)?;

    assign_ids(&mut shafts);
    assign_ids(&mut pipes);
    assign_ids(&mut polygons);

    // Lengths and buffers above need the projected source CRS, so this comes late.
    log::info!(
        "Reprojecting from EPSG:{} to EPSG:{}",
        source_crs,
        config.target_epsg
    );
    reproject_features(&mut shafts, source_crs, config.target_epsg)?;
    reproject_features(&mut pipes, source_crs, config.target_epsg)?;
    reproject_features(&mut polygons, source_crs, config.target_epsg)?;

    log::info!("Deriving shaft depth lines");
    let shaft_lines = derive_shaft_lines(
        &shafts,
        config.geoid_undulation,
        config.shaft_line_perturbation,
    );

    let summary = SewerSummary {
        shafts: shafts.len(),
        shaft_lines: shaft_lines.len(),
        pipes: pipes.len(),
        polygons: polygons.len(),
    };
    write_output(SewerOutput::Shafts, shafts, config)?;
    write_output(SewerOutput::ShaftLines, shaft_lines, config)?;
    write_output(SewerOutput::Pipes, pipes, config)?;
    if summary.polygons > 0 {
        write_output(SewerOutput::Polygons, polygons, config)?;
    }
    drop(scratch);
    log::info!("Sewer data prepared: {:?}", summary);
    Ok(summary)
}

/// Convert every shapefile into a GeoJSON file in the processing directory, then read those back
/// and sort their features into layers.
fn convert_shapefiles(
    shapefiles: &[PathBuf],
    config: &SewerConfig,
    scratch: &ScratchDir,
) -> EtlResult<SewerLayers> {
    let mut converted_files = Vec::new();
    for shapefile in shapefiles {
        let name = file_stem(shapefile);
        log::info!("Converting {:?} to GeoJSON", shapefile);
        let converted = read_features_from_geofile(shapefile, config.source_epsg)?;
        let converted_filepath = scratch.path().join(format!("{}.geojson", name));
        write_feature_collection(
            new_feature_collection(&name, converted.crs, converted.features),
            &converted_filepath,
        )?;
        converted_files.push((converted_filepath, converted.crs));
    }

    let mut layers = SewerLayers::default();
    for (converted_filepath, crs) in converted_files {
        let collection = read_feature_collection(&converted_filepath)?;
        layers.add_collection(&file_stem(&converted_filepath), collection.features, crs)?;
    }
    Ok(layers)
}

fn write_output(
    output: SewerOutput,
    mut features: Vec<Feature>,
    config: &SewerConfig,
) -> EtlResult<()> {
    let name = output.collection_name(&config.dataset_name);
    let bbox_info = calculate_bbox_info(&features)?;
    write_json(
        &bbox_info,
        &config.output_dir.join(format!("{}.bboxInfo.json", name)),
    )?;

    rename_properties(&mut features, OUTPUT_NAMES);
    write_feature_collection(
        new_feature_collection(&name, config.target_epsg, features),
        &config.output_dir.join(format!("{}.geojson", name)),
    )
}

fn file_stem(filepath: &Path) -> String {
    filepath
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use approx::assert_abs_diff_eq;
    use gdal::vector::{FieldValue, LayerAccess, OGRFieldType, OGRwkbGeometryType};
    use geojson::Value;
    use rstest::rstest;
    use testdir::testdir;

    use crate::{
        config::SewerConfig,
        error::EtlError,
        geofile::{
            feature::{feature_id, property},
            geojson::read_feature_collection,
        },
        sewers::bbox::BoundingBoxInfo,
    };

    use super::{prepare_sewers, SewerOutput, SewerSummary};

    const FIELDS: [&str; 7] = [
        "Layer",
        "X",
        "Y",
        "Z",
        "SHAFT_COVR",
        "SHAFT_BOTM",
        "PIPE_LENGT",
    ];

    /// GDAL limits dBASE field names to 10 characters, the CAD export writes 11. The placeholder
    /// names are patched in the written header.
    const EXPORT_NAMES: [(&str, &str); 3] = [
        ("SHAFT_COVR", "E0101.N01_%"),
        ("SHAFT_BOTM", "E0101.N02_%"),
        ("PIPE_LENGT", "E0102.N03_%"),
    ];

    fn patch_field_names(dbf_filepath: &Path) {
        let mut contents = std::fs::read(dbf_filepath).unwrap();
        for (placeholder, export_name) in EXPORT_NAMES {
            let start = contents
                .windows(placeholder.len())
                .position(|window| window == placeholder.as_bytes())
                .unwrap();
            contents[start..start + export_name.len()].copy_from_slice(export_name.as_bytes());
        }
        std::fs::write(dbf_filepath, contents).unwrap();
    }

    fn write_shapefile(
        filepath: &Path,
        geometry_type: OGRwkbGeometryType::Type,
        rows: &[(&str, [&str; 7])],
    ) {
        let driver = gdal::DriverManager::get_driver_by_name("ESRI Shapefile").unwrap();
        let mut dataset = driver.create_vector_only(filepath).unwrap();
        let spatial_ref = gdal::spatial_ref::SpatialRef::from_epsg(32632).unwrap();
        let mut layer = dataset
            .create_layer(gdal::LayerOptions {
                name: "sewers",
                srs: Some(&spatial_ref),
                ty: geometry_type,
                options: None,
            })
            .unwrap();
        let field_definitions: Vec<(&str, OGRFieldType::Type)> = FIELDS
            .iter()
            .map(|name| (*name, OGRFieldType::OFTString))
            .collect();
        layer.create_defn_fields(&field_definitions).unwrap();
        for (wkt, values) in rows {
            let values: Vec<FieldValue> = values
                .iter()
                .map(|value| FieldValue::StringValue(value.to_string()))
                .collect();
            layer
                .create_feature_fields(
                    gdal::vector::Geometry::from_wkt(wkt).unwrap(),
                    &FIELDS,
                    &values,
                )
                .unwrap();
        }
        drop(dataset);
        patch_field_names(&filepath.with_extension("dbf"));
    }

    fn write_survey(input_dir: &Path) {
        std::fs::create_dir_all(input_dir).unwrap();
        write_shapefile(
            &input_dir.join("survey_point.shp"),
            OGRwkbGeometryType::wkbPoint25D,
            &[
                // Shaft with label.
                (
                    "POINT Z (400000 5700000 55)",
                    ["Schacht", "400000", "5700000", "55", "", "", ""],
                ),
                (
                    "POINT Z (400000 5700000 0)",
                    ["Schacht_TXT", "400000", "5700000", "0", "55.000", "52.000", ""],
                ),
                // Shaft with unknown height.
                (
                    "POINT Z (400100 5700000 100)",
                    ["Schacht", "400100", "5700000", "100", "", "", ""],
                ),
                // Shaft without label.
                (
                    "POINT Z (400200 5700000 54)",
                    ["Schacht", "400200", "5700000", "54", "", "", ""],
                ),
                // Pipe label.
                (
                    "POINT Z (400005 5700000.5 0)",
                    ["Haltung_TXT", "400005", "5700000.5", "0", "", "", "10.00"],
                ),
            ],
        );
        write_shapefile(
            &input_dir.join("survey_line.shp"),
            OGRwkbGeometryType::wkbLineString25D,
            &[(
                "LINESTRING Z (400000 5700000 53,400010 5700000 52)",
                ["Haltung", "", "", "", "", "", ""],
            )],
        );
    }

    fn config_for(dir: &Path) -> SewerConfig {
        SewerConfig {
            input_dir: dir.join("input"),
            processing_dir: dir.join("processing"),
            output_dir: dir.join("output"),
            dataset_name: "survey".to_string(),
            source_epsg: None,
            ..SewerConfig::default()
        }
    }

    #[test]
    fn test_prepare_sewers_end_to_end() {
        let dir = testdir!();
        write_survey(&dir.join("input"));
        let config = config_for(&dir);

        let summary = prepare_sewers(&config).unwrap();
        assert_eq!(
            SewerSummary {
                shafts: 1,
                shaft_lines: 1,
                pipes: 1,
                polygons: 0,
            },
            summary
        );
        assert!(!config.processing_dir.exists());

        let shafts =
            read_feature_collection(&config.output_dir.join("survey_point.geojson")).unwrap();
        let shaft = &shafts.features[0];
        assert_eq!(Some(1), feature_id(shaft));
        assert_eq!(Some(&serde_json::json!(55.0)), property(shaft, "Deckelhöhe [m]"));
        assert_eq!(Some(&serde_json::json!(52.0)), property(shaft, "Sohlhöhe [m]"));
        let (lon, lat, height) = match &shaft.geometry.as_ref().unwrap().value {
            Value::Point(position) => (position[0], position[1], position[2]),
            _ => panic!("Expected a point"),
        };
        // UTM zone 32N, 400000 / 5700000 lies around 7.58°E 51.45°N.
        assert!((7.0..8.0).contains(&lon));
        assert!((51.0..52.0).contains(&lat));
        assert_abs_diff_eq!(55.0 + 45.43, height, epsilon = 1e-9);

        let pipes =
            read_feature_collection(&config.output_dir.join("survey_line.geojson")).unwrap();
        assert_eq!(
            Some(&serde_json::json!(10.0)),
            property(&pipes.features[0], "Länge Aufmaß [m]")
        );

        let shaft_lines_filepath = config.output_dir.join("survey_point_as_lines.geojson");
        let shaft_lines = read_feature_collection(&shaft_lines_filepath).unwrap();
        match &shaft_lines.features[0].geometry.as_ref().unwrap().value {
            Value::LineString(positions) => {
                assert_eq!(lon, positions[0][0]);
                assert_abs_diff_eq!(52.0 + 45.43, positions[0][2], epsilon = 1e-9);
                assert_abs_diff_eq!(55.0 + 45.43, positions[1][2], epsilon = 1e-9);
            }
            _ => panic!("Expected a LineString"),
        }

        let bbox_info: BoundingBoxInfo = serde_json::from_str(
            &std::fs::read_to_string(config.output_dir.join("survey_line.bboxInfo.json")).unwrap(),
        )
        .unwrap();
        let pipe_bbox = bbox_info.bbox_references.get(&1).unwrap();
        assert_abs_diff_eq!(52.0 + 45.43, pipe_bbox.p_min[2], epsilon = 1e-9);
        assert_abs_diff_eq!(53.0 + 45.43, pipe_bbox.p_max[2], epsilon = 1e-9);
    }

    #[test]
    fn test_prepare_sewers_without_input_cleans_up() {
        let dir = testdir!();
        std::fs::create_dir_all(dir.join("input")).unwrap();
        let config = config_for(&dir);
        assert!(matches!(
            prepare_sewers(&config),
            Err(EtlError::ConfigMissing(_))
        ));
        assert!(!config.processing_dir.exists());
    }

    #[rstest]
    #[case(SewerOutput::Shafts, "herne_point")]
    #[case(SewerOutput::ShaftLines, "herne_point_as_lines")]
    #[case(SewerOutput::Pipes, "herne_line")]
    #[case(SewerOutput::Polygons, "herne_polygon")]
    fn test_output_collection_names(#[case] output: SewerOutput, #[case] expected: &str) {
        assert_eq!(expected, output.collection_name("herne"));
    }
}
