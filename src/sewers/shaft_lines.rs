use geojson::{Feature, Geometry, Value};

use crate::geofile::feature::numeric_property;

use super::fields;

/// Derive a vertical line per shaft, from the bottom height to the cover height, to visualize the
/// shaft depth. The heights come from the attributes, so `height_offset` is added here.
///
/// The upper vertex is moved north by `perturbation` because the 3D client cannot render exactly
/// vertical lines. Shafts without both heights yield no line.
pub fn derive_shaft_lines(
    shafts: &[Feature],
    height_offset: f64,
    perturbation: f64,
) -> Vec<Feature> {
    shafts
        .iter()
        .filter_map(|shaft| derive_shaft_line(shaft, height_offset, perturbation))
        .collect()
}

fn derive_shaft_line(shaft: &Feature, height_offset: f64, perturbation: f64) -> Option<Feature> {
    let cover_height = numeric_property(shaft, fields::SHAFT_COVER_HEIGHT)?;
    let bottom_height = numeric_property(shaft, fields::SHAFT_BOTTOM_HEIGHT)?;
    let (lon, lat) = match &shaft.geometry.as_ref()?.value {
        Value::Point(position) => (position[0], position[1]),
        _ => return None,
    };
    Some(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(vec![
            vec![lon, lat, bottom_height + height_offset],
            vec![lon, lat + perturbation, cover_height + height_offset],
        ]))),
        id: None,
        properties: shaft.properties.clone(),
        foreign_members: None,
    })
}
