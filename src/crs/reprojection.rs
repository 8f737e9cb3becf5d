use geojson::Feature;

use crate::{
    crs::crs_utils::{epsg_code_to_authority_string, EpsgCode},
    error::EtlResult,
    geofile::feature::all_positions_mut,
};

/// Transformation between two EPSG codes, `None` if they are the same. PROJ normalizes the axis
/// order, so geographic targets come out as lon/lat.
pub fn known_crs_projection(from_crs: EpsgCode, to_crs: EpsgCode) -> EtlResult<Option<proj::Proj>> {
    if from_crs == to_crs {
        return Ok(None);
    }
    let projection = proj::Proj::new_known_crs(
        &epsg_code_to_authority_string(from_crs),
        &epsg_code_to_authority_string(to_crs),
        None,
    )?;
    Ok(Some(projection))
}

/// Project all features from `from_crs` into `to_crs` in place. Only the horizontal ordinates are
/// transformed, heights are left as they are.
pub fn reproject_features(
    features: &mut [Feature],
    from_crs: EpsgCode,
    to_crs: EpsgCode,
) -> EtlResult<()> {
    let Some(projection) = known_crs_projection(from_crs, to_crs)? else {
        return Ok(());
    };
    for feature in features.iter_mut() {
        let Some(geometry) = feature.geometry.as_mut() else {
            continue;
        };
        for position in all_positions_mut(&mut geometry.value) {
            let (x, y) = projection.convert((position[0], position[1]))?;
            position[0] = x;
            position[1] = y;
        }
    }
    Ok(())
}
