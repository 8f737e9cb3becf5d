use geojson::Feature;

/// Rename attribute keys in place following `names` (code → output name). Other keys stay as they
/// are. All processing keys on the codes, so this runs right before writing.
pub fn rename_properties(features: &mut [Feature], names: &[(&str, &str)]) {
    for feature in features.iter_mut() {
        let Some(properties) = feature.properties.as_mut() else {
            continue;
        };
        for (code, name) in names {
            if let Some(value) = properties.remove(*code) {
                properties.insert(name.to_string(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use geojson::{Feature, Geometry, Value};
    use serde_json::json;

    use crate::sewers::fields::OUTPUT_NAMES;

    use super::rename_properties;

    #[test]
    fn test_known_codes_are_renamed_others_kept() {
        let mut feature = Feature::from(Geometry::new(Value::Point(vec![0.0, 0.0, 0.0])));
        feature.properties = json!({
            "id": 1,
            "E0101.N01_%": 56.0,
            "Color": "150,150,150",
            "dwg_handle": "1A2B",
        })
        .as_object()
        .cloned();
        let mut features = vec![feature];
        rename_properties(&mut features, OUTPUT_NAMES);

        let properties = features[0].properties.as_ref().unwrap();
        assert_eq!(Some(&json!(56.0)), properties.get("Deckelhöhe [m]"));
        assert_eq!(Some(&json!("150,150,150")), properties.get("Farbe"));
        assert_eq!(Some(&json!("1A2B")), properties.get("dwg_handle"));
        assert_eq!(Some(&json!(1)), properties.get("id"));
        assert!(properties.get("E0101.N01_%").is_none());
        assert!(properties.get("Color").is_none());
        assert_eq!(4, properties.len());
    }
}
