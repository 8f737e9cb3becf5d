use gdal::spatial_ref::SpatialRef;

use crate::error::{EtlError, EtlResult};

pub type EpsgCode = u32;

/// CRS tag written into every GeoJSON output. Output coordinates are WGS84 in lon/lat order.
pub const CRS84_URN: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

/// EPSG code of a spatial reference, if it has one. Shapefile `.prj` files carry ESRI WKT without
/// authority, in that case GDAL is asked to identify the code.
pub fn epsg_code_of(spatial_ref: &SpatialRef) -> Option<EpsgCode> {
    if let Ok(code) = spatial_ref.auth_code() {
        if code > 0 {
            return Some(code as EpsgCode);
        }
    }
    let mut identified = spatial_ref.clone();
    identified.auto_identify_epsg().ok()?;
    match identified.auth_code() {
        Ok(code) if code > 0 => Some(code as EpsgCode),
        _ => None,
    }
}

/// Pick the CRS of a source file. A declared code always wins over the one stored in the file.
pub fn resolve_source_crs(
    declared: Option<EpsgCode>,
    stored: Option<EpsgCode>,
    source_name: &str,
) -> EtlResult<EpsgCode> {
    match (declared, stored) {
        (Some(declared), Some(stored)) => {
            if declared != stored {
                log::warn!(
                    "{} declares {}, using configured {} instead",
                    source_name,
                    epsg_code_to_authority_string(stored),
                    epsg_code_to_authority_string(declared)
                );
            }
            Ok(declared)
        }
        (Some(code), None) | (None, Some(code)) => Ok(code),
        (None, None) => Err(EtlError::ConfigMissing(format!(
            "{} has no CRS and no source_epsg is configured",
            source_name
        ))),
    }
}
