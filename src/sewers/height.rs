use geojson::Feature;

use crate::{error::EtlResult, geofile::feature::surface_positions_mut};

/// Add `offset` to the height of every position: the point of a Point, all vertices of a
/// LineString and the outer ring of a Polygon. Attribute values are not touched.
///
/// Applying this twice doubles the offset; callers apply it once per collection.
pub fn add_height_offset(features: &mut [Feature], offset: f64) -> EtlResult<()> {
    for feature in features.iter_mut() {
        for position in surface_positions_mut(feature)? {
            position[2] += offset;
        }
    }
    Ok(())
}
