use std::path::Path;

use las::{point::Format, Builder, Color, Point, Transform, Vector, Write, Writer};

use crate::error::EtlResult;

use super::e57_file::{CloudPoint, PointCloudData};

/// LAS point formats 0 (position and intensity) and 2 (with colors).
const FORMAT_WITHOUT_COLOR: u8 = 0;
const FORMAT_WITH_COLOR: u8 = 2;

/// Smallest coordinate per axis. Using it as offset keeps the scaled integers small even for
/// fine scales. An empty cloud gets zero offsets.
pub fn minimum_offsets(points: &[CloudPoint]) -> Vector<f64> {
    if points.is_empty() {
        return Vector {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
    }
    points.iter().fold(
        Vector {
            x: f64::INFINITY,
            y: f64::INFINITY,
            z: f64::INFINITY,
        },
        |min, point| Vector {
            x: min.x.min(point.x),
            y: min.y.min(point.y),
            z: min.z.min(point.z),
        },
    )
}

/// Write a LAS 1.2 file. x and y are stored with `horizontal_scale`, z with `vertical_scale`,
/// the offsets are the minimum coordinates.
pub fn write_las(
    filepath: &Path,
    cloud: &PointCloudData,
    horizontal_scale: f64,
    vertical_scale: f64,
) -> EtlResult<()> {
    let offsets = minimum_offsets(&cloud.points);
    let mut builder = Builder::from((1, 2));
    builder.point_format = Format::new(if cloud.has_color {
        FORMAT_WITH_COLOR
    } else {
        FORMAT_WITHOUT_COLOR
    })?;
    builder.transforms = Vector {
        x: Transform {
            scale: horizontal_scale,
            offset: offsets.x,
        },
        y: Transform {
            scale: horizontal_scale,
            offset: offsets.y,
        },
        z: Transform {
            scale: vertical_scale,
            offset: offsets.z,
        },
    };
    let header = builder.into_header()?;

    let mut writer = Writer::from_path(filepath, header)?;
    for point in &cloud.points {
        writer.write(Point {
            x: point.x,
            y: point.y,
            z: point.z,
            intensity: point.intensity,
            color: point.color.map(|[red, green, blue]| Color { red, green, blue }),
            ..Default::default()
        })?;
    }
    writer.close()?;
    log::info!("Wrote {} points to {:?}", cloud.points.len(), filepath);
    Ok(())
}
