use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, Position};

use crate::{
    crs::crs_utils::{EpsgCode, CRS84_URN},
    error::{EtlError, EtlResult},
};

/// OGC URN of an EPSG code. WGS84 is written as CRS84 since GeoJSON positions are lon/lat.
pub fn crs_urn(code: EpsgCode) -> String {
    match code {
        4326 => CRS84_URN.to_string(),
        code => format!("urn:ogc:def:crs:EPSG::{}", code),
    }
}

/// Wrap features in a named collection carrying a CRS tag.
pub fn new_feature_collection(
    name: &str,
    crs: EpsgCode,
    features: Vec<Feature>,
) -> FeatureCollection {
    let mut foreign_members = JsonObject::new();
    foreign_members.insert("name".to_string(), JsonValue::from(name));
    foreign_members.insert(
        "crs".to_string(),
        serde_json::json!({
            "type": "name",
            "properties": { "name": crs_urn(crs) }
        }),
    );
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

pub fn properties_mut(feature: &mut Feature) -> &mut JsonObject {
    feature.properties.get_or_insert_with(JsonObject::new)
}

pub fn property<'a>(feature: &'a Feature, key: &str) -> Option<&'a JsonValue> {
    feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get(key))
}

/// Numeric value of a property. The DWG exports store many numbers as strings, e.g. "100.000".
pub fn numeric_property(feature: &Feature, key: &str) -> Option<f64> {
    property(feature, key).and_then(as_number)
}

pub fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Coerce a value to a JSON number. Null stays null, text that is no number is kept.
pub fn to_numeric_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(text) => match text.trim().parse::<f64>() {
            Ok(number) => JsonValue::from(number),
            Err(_) => {
                log::warn!("Attribute value '{}' is not numeric, keeping text", text);
                value.clone()
            }
        },
        _ => value.clone(),
    }
}

pub fn string_property<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
    property(feature, key).and_then(JsonValue::as_str)
}

pub fn feature_id(feature: &Feature) -> Option<u64> {
    property(feature, "id").and_then(JsonValue::as_u64)
}

pub fn geometry_type(feature: &Feature) -> &'static str {
    use geojson::Value::*;
    match feature.geometry.as_ref().map(|geometry| &geometry.value) {
        Some(Point(_)) => "Point",
        Some(MultiPoint(_)) => "MultiPoint",
        Some(LineString(_)) => "LineString",
        Some(MultiLineString(_)) => "MultiLineString",
        Some(Polygon(_)) => "Polygon",
        Some(MultiPolygon(_)) => "MultiPolygon",
        Some(GeometryCollection(_)) => "GeometryCollection",
        None => "None",
    }
}

/// Positions that carry a feature's extent: the point, every line vertex, or the outer ring of a
/// polygon. Inner rings and multi geometries are not supported.
pub fn surface_positions(feature: &Feature) -> EtlResult<Vec<&Position>> {
    use geojson::Value::*;
    match feature.geometry.as_ref().map(|geometry| &geometry.value) {
        Some(Point(position)) => Ok(vec![position]),
        Some(LineString(positions)) => Ok(positions.iter().collect()),
        Some(Polygon(rings)) => Ok(rings.iter().take(1).flatten().collect()),
        _ => Err(unsupported_geometry(feature)),
    }
}

pub fn surface_positions_mut(feature: &mut Feature) -> EtlResult<Vec<&mut Position>> {
    use geojson::Value::*;
    let type_name = geometry_type(feature);
    match feature.geometry.as_mut().map(|geometry| &mut geometry.value) {
        Some(Point(position)) => Ok(vec![position]),
        Some(LineString(positions)) => Ok(positions.iter_mut().collect()),
        Some(Polygon(rings)) => Ok(rings.iter_mut().take(1).flatten().collect()),
        _ => Err(EtlError::unrecognized(
            type_name,
            "only Point, LineString and Polygon geometries are supported",
        )),
    }
}

/// Every position of a geometry, of any type.
pub fn all_positions_mut(value: &mut geojson::Value) -> Vec<&mut Position> {
    use geojson::Value::*;
    match value {
        Point(position) => vec![position],
        MultiPoint(positions) | LineString(positions) => positions.iter_mut().collect(),
        MultiLineString(lines) | Polygon(lines) => lines.iter_mut().flatten().collect(),
        MultiPolygon(polygons) => polygons.iter_mut().flatten().flatten().collect(),
        GeometryCollection(geometries) => geometries
            .iter_mut()
            .flat_map(|geometry| all_positions_mut(&mut geometry.value))
            .collect(),
    }
}

/// Horizontal position of a feature. The `X`/`Y` attributes written by the CAD export are
/// preferred, the geometry of point features is the fallback.
pub fn planar_position(feature: &Feature) -> Option<(f64, f64)> {
    if let (Some(x), Some(y)) = (numeric_property(feature, "X"), numeric_property(feature, "Y")) {
        return Some((x, y));
    }
    match feature.geometry.as_ref().map(|geometry| &geometry.value) {
        Some(geojson::Value::Point(position)) if position.len() >= 2 => {
            Some((position[0], position[1]))
        }
        _ => None,
    }
}

fn unsupported_geometry(feature: &Feature) -> EtlError {
    EtlError::unrecognized(
        geometry_type(feature),
        "only Point, LineString and Polygon geometries are supported",
    )
}
