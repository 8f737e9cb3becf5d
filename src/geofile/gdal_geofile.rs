use std::path::Path;

use gdal::vector::{FieldValue, LayerAccess};
use geojson::{Feature, JsonObject, JsonValue};

use crate::{
    crs::crs_utils::{epsg_code_of, resolve_source_crs, EpsgCode},
    error::{EtlError, EtlResult},
};

/// Features read from a vector file together with the EPSG code their coordinates refer to.
pub struct GeoreferencedFeatures {
    pub features: Vec<Feature>,
    pub crs: EpsgCode,
}

/// Read the single layer of a vector file (e.g. a shapefile) into GeoJSON features. Attributes are
/// copied verbatim, geometries keep their vertices; positions without height get a height of 0.
///
/// `declared_crs` overrides the CRS stored in the file and is required if the file has none.
pub fn read_features_from_geofile(
    filepath: &Path,
    declared_crs: Option<EpsgCode>,
) -> EtlResult<GeoreferencedFeatures> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options).map_err(|err| {
        EtlError::ConfigMissing(format!("Unable to read {:?}: {}", filepath, err))
    })?;

    let layer_count = dataset.layer_count();
    if 0 == layer_count || 1 < layer_count {
        return Err(EtlError::conversion_failed(
            filepath,
            format!("Found {} layers, only one layer is supported.", layer_count),
        ));
    }
    let mut layer = dataset.layer(0)?;

    let stored_crs = layer
        .spatial_ref()
        .ok()
        .and_then(|spatial_ref| epsg_code_of(&spatial_ref));
    let crs = resolve_source_crs(declared_crs, stored_crs, &filepath.to_string_lossy())?;

    let mut features = Vec::new();
    for gdal_feature in layer.features() {
        let geometry = gdal_feature
            .geometry_by_index(0)
            .map_err(|err| EtlError::conversion_failed(filepath, err))?;
        let geometry = gdal_geometry_to_geojson(geometry)
            .map_err(|err| EtlError::conversion_failed(filepath, err))?;

        let mut properties = JsonObject::new();
        for (name, value) in gdal_feature.fields() {
            properties.insert(name, field_value_to_json(value));
        }

        features.push(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    log::info!(
        "Read {} features from {:?} ({})",
        features.len(),
        filepath,
        crate::crs::crs_utils::epsg_code_to_authority_string(crs)
    );
    Ok(GeoreferencedFeatures { features, crs })
}

fn gdal_geometry_to_geojson(geometry: &gdal::vector::Geometry) -> EtlResult<geojson::Geometry> {
    let geojson_geometry = match geometry.json()?.parse::<geojson::GeoJson>()? {
        geojson::GeoJson::Geometry(geometry) => geometry,
        other => {
            return Err(EtlError::unrecognized(
                other.to_string(),
                "GDAL did not export a geometry",
            ))
        }
    };
    Ok(with_height(geojson_geometry))
}

/// Pad 2D positions with a height of 0 so that the height is always the third ordinate.
fn with_height(mut geometry: geojson::Geometry) -> geojson::Geometry {
    for position in crate::geofile::feature::all_positions_mut(&mut geometry.value) {
        if position.len() < 3 {
            position.resize(3, 0.0);
        }
    }
    geometry
}

pub fn field_value_to_json(value: Option<FieldValue>) -> JsonValue {
    match value {
        None => JsonValue::Null,
        Some(FieldValue::IntegerValue(value)) => JsonValue::from(value),
        Some(FieldValue::Integer64Value(value)) => JsonValue::from(value),
        Some(FieldValue::RealValue(value)) => JsonValue::from(value),
        Some(FieldValue::StringValue(value)) => JsonValue::from(value),
        Some(FieldValue::IntegerListValue(values)) => JsonValue::from(values),
        Some(FieldValue::Integer64ListValue(values)) => JsonValue::from(values),
        Some(FieldValue::RealListValue(values)) => JsonValue::from(values),
        Some(FieldValue::StringListValue(values)) => JsonValue::from(values),
        Some(other) => other.into_string().map_or(JsonValue::Null, JsonValue::from),
    }
}
