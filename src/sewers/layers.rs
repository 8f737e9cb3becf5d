use geojson::{Feature, JsonValue};

use crate::{
    config::CorrelationConfig,
    crs::crs_utils::EpsgCode,
    error::{EtlError, EtlResult},
    geofile::feature::{geometry_type, numeric_property, properties_mut},
};

use super::fields;

/// Converted sewer input, split by geometry type. Points hold shafts and labels, lines hold pipes,
/// polygons (area outlines) are passed through.
#[derive(Debug, Default)]
pub struct SewerLayers {
    pub points: Vec<Feature>,
    pub lines: Vec<Feature>,
    pub polygons: Vec<Feature>,
    pub crs: Option<EpsgCode>,
}

impl SewerLayers {
    /// Add the features of one converted file. The geometry type of its first feature decides the
    /// layer. All files must share one CRS.
    pub fn add_collection(
        &mut self,
        source_name: &str,
        features: Vec<Feature>,
        crs: EpsgCode,
    ) -> EtlResult<()> {
        let Some(first) = features.first() else {
            log::warn!("{} contains no features, skipping it", source_name);
            return Ok(());
        };
        match self.crs {
            Some(layers_crs) if layers_crs != crs => {
                return Err(EtlError::conversion_failed(
                    source_name,
                    format!(
                        "CRS EPSG:{} differs from EPSG:{} of the other inputs",
                        crs, layers_crs
                    ),
                ))
            }
            _ => self.crs = Some(crs),
        }
        let layer = match geometry_type(first) {
            "Point" => &mut self.points,
            "LineString" => &mut self.lines,
            "Polygon" => &mut self.polygons,
            other => {
                return Err(EtlError::unrecognized(
                    source_name,
                    format!(
                        "geometry type was neither 'Point', 'LineString' nor 'Polygon' but '{}'",
                        other
                    ),
                ))
            }
        };
        log::info!(
            "{}: {} {} features",
            source_name,
            features.len(),
            geometry_type(first)
        );
        layer.extend(features);
        Ok(())
    }
}

/// Remove points whose height could not be determined. The survey marks them with a sentinel height
/// either in the `Z` attribute (truncated to an integer) or as shaft cover height of a label.
pub fn remove_height_sentinels(points: Vec<Feature>, config: &CorrelationConfig) -> Vec<Feature> {
    let num_points = points.len();
    let points: Vec<Feature> = points
        .into_iter()
        .filter(|point| {
            let z_is_sentinel = numeric_property(point, fields::Z)
                .map_or(false, |z| z.trunc() == config.height_sentinel);
            let cover_is_sentinel = numeric_property(point, fields::SHAFT_COVER_HEIGHT)
                .map_or(false, |height| height == config.height_sentinel);
            !z_is_sentinel && !cover_is_sentinel
        })
        .collect();
    log::info!(
        "Removed {} points with height {}",
        num_points - points.len(),
        config.height_sentinel
    );
    points
}

/// Number features with `id` 1, 2, ... in their current order.
pub fn assign_ids(features: &mut [Feature]) {
    for (index, feature) in features.iter_mut().enumerate() {
        properties_mut(feature).insert(fields::ID.to_string(), JsonValue::from(index as u64 + 1));
    }
}
