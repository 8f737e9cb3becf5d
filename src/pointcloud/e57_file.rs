use std::path::Path;

use e57::{CartesianCoordinate, E57Reader};

use crate::error::EtlResult;

/// Point with intensity and color scaled to the full `u16` range used by LAS.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: u16,
    pub color: Option<[u16; 3]>,
}

/// All scans of a capture merged into one cloud.
#[derive(Debug, Default)]
pub struct PointCloudData {
    pub points: Vec<CloudPoint>,
    /// Only set if every scan carries colors.
    pub has_color: bool,
}

fn normalized_to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}

/// Read every scan of an E57 file with its pose applied. Spherical coordinates are converted to
/// cartesian ones; points without a valid cartesian position are skipped.
pub fn read_e57(filepath: &Path) -> EtlResult<PointCloudData> {
    let mut reader = E57Reader::from_file(filepath)?;
    let scans = reader.pointclouds();
    let mut cloud = PointCloudData {
        points: Vec::new(),
        has_color: !scans.is_empty(),
    };
    let mut num_invalid = 0usize;
    for (i, scan) in scans.iter().enumerate() {
        log::debug!(
            "Reading scan {} of {} ({} records)",
            i + 1,
            scans.len(),
            scan.records
        );
        let has_color = scan.has_color();
        let has_intensity = scan.has_intensity();
        cloud.has_color &= has_color;
        cloud.points.reserve(scan.records as usize);

        let mut scan_reader = reader.pointcloud_simple(scan)?;
        scan_reader.spherical_to_cartesian(true);
        for point in scan_reader {
            let point = point?;
            let CartesianCoordinate::Valid { x, y, z } = point.cartesian else {
                num_invalid += 1;
                continue;
            };
            let intensity = if has_intensity {
                normalized_to_u16(point.intensity)
            } else {
                0
            };
            let color = has_color.then(|| {
                [
                    normalized_to_u16(point.color.red),
                    normalized_to_u16(point.color.green),
                    normalized_to_u16(point.color.blue),
                ]
            });
            cloud.points.push(CloudPoint {
                x,
                y,
                z,
                intensity,
                color,
            });
        }
    }
    if num_invalid > 0 {
        log::warn!(
            "Skipped {} points without position in {:?}",
            num_invalid,
            filepath
        );
    }
    if !cloud.has_color {
        // Mixed captures lose their colors, LAS has one point format per file.
        for point in cloud.points.iter_mut() {
            point.color = None;
        }
    }
    Ok(cloud)
}
