use std::{
    fs,
    path::{Path, PathBuf},
};

use indicatif::ProgressBar;

use crate::{
    config::PointCloudConfig,
    crs::{crs_utils::EpsgCode, reprojection::known_crs_projection},
    dirs::list_files_with_suffix,
    error::EtlResult,
};

use super::{
    e57_file::{read_e57, CloudPoint},
    las_file::write_las,
};

const INPUT_SUFFIX: &str = ".e57";

/// `station.e57` → `station.las`
pub fn las_filename(input_filepath: &Path) -> String {
    let filename = input_filepath
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = filename.strip_suffix(INPUT_SUFFIX).unwrap_or(&filename);
    format!("{}.las", stem)
}

/// Project the horizontal position of all points, heights are kept.
pub fn reproject_points(
    points: &mut [CloudPoint],
    from_crs: EpsgCode,
    to_crs: EpsgCode,
) -> EtlResult<()> {
    let Some(projection) = known_crs_projection(from_crs, to_crs)? else {
        return Ok(());
    };
    let bar = ProgressBar::new(points.len() as u64);
    for point in points.iter_mut() {
        let (x, y) = projection.convert((point.x, point.y))?;
        point.x = x;
        point.y = y;
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(())
}

/// Convert one E57 capture into a LAS file in the target CRS. Returns the number of points.
pub fn convert_e57_to_las(
    input_filepath: &Path,
    output_filepath: &Path,
    config: &PointCloudConfig,
) -> EtlResult<usize> {
    log::info!("Reading {:?}", input_filepath);
    let mut cloud = read_e57(input_filepath)?;
    log::info!(
        "Reprojecting {} points from EPSG:{} to EPSG:{}",
        cloud.points.len(),
        config.source_epsg,
        config.target_epsg
    );
    reproject_points(&mut cloud.points, config.source_epsg, config.target_epsg)?;
    write_las(
        output_filepath,
        &cloud,
        config.horizontal_scale,
        config.vertical_scale,
    )?;
    Ok(cloud.points.len())
}

/// Convert every E57 file of the input directory into a LAS file of the same name in the output
/// directory. Returns the written files.
pub fn prepare_point_cloud(config: &PointCloudConfig) -> EtlResult<Vec<PathBuf>> {
    let inputs = list_files_with_suffix(&config.input_dir, INPUT_SUFFIX)?;
    if inputs.is_empty() {
        log::warn!("No {} files found in {:?}", INPUT_SUFFIX, config.input_dir);
    }
    fs::create_dir_all(&config.output_dir)?;

    let mut outputs = vec![];
    for (i, input) in inputs.iter().enumerate() {
        log::info!("Processing file {} of {}: {:?}", i + 1, inputs.len(), input);
        let output = config.output_dir.join(las_filename(input));
        convert_e57_to_las(input, &output, config)?;
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use approx::assert_abs_diff_eq;
    use las::{Read, Reader};
    use rstest::rstest;
    use testdir::testdir;

    use crate::{
        config::PointCloudConfig,
        crs::reprojection::known_crs_projection,
        error::EtlError,
        pointcloud::e57_file::tests::write_e57,
    };

    use super::{las_filename, prepare_point_cloud};

    #[rstest]
    #[case("/data/U_Bahn_Kreuzkirche.e57", "U_Bahn_Kreuzkirche.las")]
    #[case("station", "station.las")]
    fn test_las_filename(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expected, las_filename(Path::new(input)));
    }

    #[test]
    fn test_prepare_point_cloud() {
        let dir = testdir!();
        let config = PointCloudConfig {
            input_dir: dir.join("input"),
            output_dir: dir.join("output"),
            ..PointCloudConfig::default()
        };
        std::fs::create_dir_all(&config.input_dir).unwrap();
        // Zone prefixed UTM 32N coordinates in Herne.
        let positions = [
            [32380000.0, 5710000.0, 60.0],
            [32380010.0, 5710020.0, 62.5],
        ];
        write_e57(
            &config.input_dir.join("station.e57"),
            &positions,
            Some(&[[10, 20, 30], [40, 50, 60]]),
        );

        let outputs = prepare_point_cloud(&config).unwrap();
        assert_eq!(vec![dir.join("output/station.las")], outputs);

        let projection = known_crs_projection(4647, 4326).unwrap().unwrap();
        let expected: Vec<(f64, f64)> = positions
            .iter()
            .map(|[x, y, _]| projection.convert((*x, *y)).unwrap())
            .collect();

        let mut reader = Reader::from_path(&outputs[0]).unwrap();
        let header = reader.header().clone();
        assert!(header.point_format().has_color);
        assert_eq!(1e-7, header.transforms().x.scale);
        assert_eq!(1e-7, header.transforms().y.scale);
        assert_abs_diff_eq!(expected[0].0, header.transforms().x.offset, epsilon = 1e-9);
        assert_abs_diff_eq!(expected[0].1, header.transforms().y.offset, epsilon = 1e-9);

        let points: Vec<las::Point> = reader.points().map(|point| point.unwrap()).collect();
        assert_eq!(2, points.len());
        for (point, (lon, lat)) in points.iter().zip(&expected) {
            assert!((7.0..7.5).contains(&point.x));
            assert!((51.4..51.7).contains(&point.y));
            assert_abs_diff_eq!(*lon, point.x, epsilon = 1e-7);
            assert_abs_diff_eq!(*lat, point.y, epsilon = 1e-7);
        }
        assert_abs_diff_eq!(62.5, points[1].z, epsilon = 0.01);
        let color = points[1].color.unwrap();
        assert_eq!(
            (40 * 257, 50 * 257, 60 * 257),
            (color.red, color.green, color.blue)
        );
    }

    #[test]
    fn test_prepare_point_cloud_without_input_dir() {
        let dir = testdir!();
        let config = PointCloudConfig {
            input_dir: dir.join("missing"),
            output_dir: dir.join("output"),
            ..PointCloudConfig::default()
        };
        assert!(matches!(
            prepare_point_cloud(&config),
            Err(EtlError::ConfigMissing(_))
        ));
    }
}
