use std::{fs, path::Path};

use geojson::{FeatureCollection, GeoJson};
use serde::Serialize;

use crate::error::{EtlError, EtlResult};

/// Write a feature collection minified, i.e. without any whitespace.
pub fn write_feature_collection(
    feature_collection: FeatureCollection,
    output_filepath: &Path,
) -> EtlResult<()> {
    log::info!(
        "Writing {} features to {:?}",
        feature_collection.features.len(),
        output_filepath
    );
    let geojson_contents = GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())?;
    Ok(())
}

pub fn read_feature_collection(input_filepath: &Path) -> EtlResult<FeatureCollection> {
    let contents = fs::read_to_string(input_filepath)?;
    match contents.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(feature_collection) => Ok(feature_collection),
        _ => Err(EtlError::unrecognized(
            input_filepath.to_string_lossy(),
            "file is not a GeoJSON FeatureCollection",
        )),
    }
}

/// Write any serializable value as minified JSON.
pub fn write_json<T: Serialize>(value: &T, output_filepath: &Path) -> EtlResult<()> {
    fs::write(output_filepath, serde_json::to_string(value)?)?;
    Ok(())
}
