use std::collections::BTreeMap;

use geojson::Feature;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EtlError, EtlResult},
    geofile::feature::{feature_id, surface_positions},
};

/// Axis aligned 3D box given by its two corners. Points get a degenerate box so that clients can
/// treat all geometry types the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "pMin")]
    pub p_min: [f64; 3],
    #[serde(rename = "pMax")]
    pub p_max: [f64; 3],
}

/// Side-channel file content: bounding boxes keyed by the id of the feature they belong to.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxInfo {
    #[serde(rename = "bboxReferences")]
    pub bbox_references: BTreeMap<u64, BoundingBox>,
}

pub fn calculate_bbox(feature: &Feature) -> EtlResult<BoundingBox> {
    let positions = surface_positions(feature)?;
    let mut positions = positions.into_iter();
    let first = positions
        .next()
        .ok_or_else(|| EtlError::unrecognized("geometry", "geometry has no positions"))?;
    let mut bbox = BoundingBox {
        p_min: [first[0], first[1], first[2]],
        p_max: [first[0], first[1], first[2]],
    };
    for position in positions {
        for axis in 0..3 {
            bbox.p_min[axis] = bbox.p_min[axis].min(position[axis]);
            bbox.p_max[axis] = bbox.p_max[axis].max(position[axis]);
        }
    }
    Ok(bbox)
}

pub fn calculate_bbox_info(features: &[Feature]) -> EtlResult<BoundingBoxInfo> {
    let mut info = BoundingBoxInfo::default();
    for feature in features {
        let id = feature_id(feature)
            .ok_or_else(|| EtlError::unrecognized("feature", "feature has no integer id"))?;
        info.bbox_references.insert(id, calculate_bbox(feature)?);
    }
    Ok(info)
}
