use std::{
    fs,
    path::{Path, PathBuf},
};

use gdal::Dataset;

use crate::{
    config::DemConfig,
    dirs::{list_files_with_suffix, ScratchDir},
    error::EtlResult,
};

use super::{
    gdal_programs::{args, translate, warp},
    grid::{add_offset_to_valid_cells, fill_invalid_cells_with_mean, update_first_band},
};

const INPUT_SUFFIX: &str = ".xyz.gz";
/// Cells outside the footprint of the source grid after warping.
const WARP_NO_DATA: &str = "-9999";

/// Grid files are named after their resolution, e.g. `dgm1_32_380_5700_1_nw`.
pub fn resampled_filename(filename: &str, factor: u32) -> String {
    match filename.rfind("dgm1") {
        Some(start) => format!(
            "{}dgm{}{}",
            &filename[..start],
            factor,
            &filename[start + "dgm1".len()..]
        ),
        None => filename.to_string(),
    }
}

/// `dgm1_32_380_5700_1_nw.xyz.gz` → `dgm1_32_380_5700_1_nw.tiff`
pub fn tiff_filename(input_filepath: &Path) -> String {
    let filename = input_filepath
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = filename.strip_suffix(INPUT_SUFFIX).unwrap_or(&filename);
    format!("{}.tiff", stem)
}

/// GDAL path that decompresses a gzipped file on the fly.
pub fn gzip_source(filepath: &Path) -> PathBuf {
    PathBuf::from(format!("/vsigzip/{}", filepath.display()))
}

/// Convert every gzipped XYZ grid of the input directory into GeoTIFF DEMs in WGS84, one per
/// resolution factor. Returns the written files.
pub fn prepare_dem(config: &DemConfig) -> EtlResult<Vec<PathBuf>> {
    let inputs = list_files_with_suffix(&config.input_dir, INPUT_SUFFIX)?;
    if inputs.is_empty() {
        log::warn!("No {} files found in {:?}", INPUT_SUFFIX, config.input_dir);
    }
    let scratch = ScratchDir::create(&config.processing_dir)?;
    fs::create_dir_all(&config.output_dir)?;

    let mut outputs = vec![];
    for (i, input) in inputs.iter().enumerate() {
        log::info!("Processing file {} of {}: {:?}", i + 1, inputs.len(), input);
        outputs.extend(prepare_dem_tile(
            &gzip_source(input),
            &tiff_filename(input),
            config,
            &scratch,
        )?);
    }
    log::info!("Wrote {} DEM files", outputs.len());
    Ok(outputs)
}

/// Process a single grid readable by GDAL. Intermediate files go into numbered subdirectories of
/// the processing directory.
pub fn prepare_dem_tile(
    source: &Path,
    tiff_name: &str,
    config: &DemConfig,
    scratch: &ScratchDir,
) -> EtlResult<Vec<PathBuf>> {
    let source_crs = format!("EPSG:{}", config.source_epsg);
    let target_crs = format!("EPSG:{}", config.target_epsg);

    log::info!("Converting {:?} to GeoTIFF", source);
    let grid = Dataset::open(source)?;
    let tiff = translate(
        &grid,
        &scratch.subdir("1_tiff")?.join(tiff_name),
        &args(&["-of", "GTiff", "-ot", "Float32", "-a_srs", &source_crs]),
    )?;
    log::info!("Adding height offset ({}m)", config.geoid_undulation);
    update_first_band(&tiff, |values, no_data| {
        add_offset_to_valid_cells(values, no_data, config.geoid_undulation)
    })?;

    log::info!("Reprojecting to {}", target_crs);
    let reprojected = warp(
        &tiff,
        &scratch.subdir("2_reprojected")?.join(tiff_name),
        &args(&[
            "-s_srs",
            &source_crs,
            "-t_srs",
            &target_crs,
            "-dstnodata",
            WARP_NO_DATA,
        ]),
    )?;
    drop(tiff);

    log::info!("Replacing nodata cells with the mean");
    update_first_band(&reprojected, |values, no_data| {
        match fill_invalid_cells_with_mean(values, no_data, config.no_data_threshold) {
            Some(mean) => log::debug!("Mean height {}", mean),
            None => log::warn!("{} has no valid cells", tiff_name),
        }
    })?;

    // Pixel size in degrees after reprojection.
    let pixel_size = reprojected.geo_transform()?[1];
    let mut outputs = vec![];
    for factor in &config.resolutions {
        let filename = resampled_filename(tiff_name, *factor);
        let resampled_filepath = scratch
            .subdir(&format!("4_resampled/dem{}", factor))?
            .join(&filename);
        let resampled_pixel_size = (pixel_size * *factor as f64).to_string();
        log::info!("Resampling to {} degrees", resampled_pixel_size);
        let resampled = warp(
            &reprojected,
            &resampled_filepath,
            &args(&[
                "-tr",
                &resampled_pixel_size,
                &resampled_pixel_size,
                "-r",
                "near",
            ]),
        )?;
        // Closing writes the file.
        drop(resampled);

        let output_dir = config.output_dir.join(format!("dem{}", factor));
        fs::create_dir_all(&output_dir)?;
        let output_filepath = output_dir.join(&filename);
        fs::copy(&resampled_filepath, &output_filepath)?;
        outputs.push(output_filepath);
    }
    Ok(outputs)
}
