//! Attach the attributes of label points to the shafts and pipes they describe.
//!
//! The CAD export stores the attributes of shafts and pipes in separate text block points
//! (labels). Shafts are matched by identical horizontal position, pipes by their length and by the
//! label lying close to the line. Both scans visit every label for every shaft or pipe, which is
//! fine for the low thousands of features of a survey area. An index in front of the scans has to
//! keep the visiting order: the last matching label wins for shafts, the first one for pipes.

use geo::{EuclideanDistance, EuclideanLength};
use geojson::{Feature, JsonValue};
use indicatif::ProgressBar;

use crate::{
    config::CorrelationConfig,
    error::{EtlError, EtlResult},
    geofile::feature::{
        numeric_property, planar_position, properties_mut, property, string_property,
        to_numeric_value,
    },
};

use super::fields::{self, CopyMode};

/// Points split into shafts and labels. Points that are neither are dropped.
#[derive(Debug, Default)]
pub struct PartitionedPoints {
    pub shafts: Vec<Feature>,
    pub labels: Vec<Feature>,
}

pub fn is_label(point: &Feature, config: &CorrelationConfig) -> bool {
    string_property(point, fields::LAYER)
        .map_or(false, |layer| layer.contains(&config.label_layer_marker))
}

/// A shaft is a point with a surveyed height that is neither a label nor on the ignored layer.
pub fn is_shaft(point: &Feature, config: &CorrelationConfig) -> bool {
    let has_height = numeric_property(point, fields::Z).map_or(false, |z| z.trunc() > 0.0);
    let on_ignored_layer =
        string_property(point, fields::LAYER) == Some(config.ignored_shaft_layer.as_str());
    has_height && !on_ignored_layer && !is_label(point, config)
}

pub fn partition_points(points: Vec<Feature>, config: &CorrelationConfig) -> PartitionedPoints {
    let num_points = points.len();
    let mut partitioned = PartitionedPoints::default();
    for point in points {
        if is_label(&point, config) {
            partitioned.labels.push(point);
        } else if is_shaft(&point, config) {
            partitioned.shafts.push(point);
        }
    }
    log::info!(
        "Out of {} points, {} are shafts and {} are labels",
        num_points,
        partitioned.shafts.len(),
        partitioned.labels.len()
    );
    partitioned
}

fn copy_label_fields(target: &mut Feature, label: &Feature, label_fields: &[(&str, CopyMode)]) {
    let properties = properties_mut(target);
    for (key, mode) in label_fields {
        let value = property(label, key).cloned().unwrap_or(JsonValue::Null);
        let value = match mode {
            CopyMode::Verbatim => value,
            CopyMode::Numeric => to_numeric_value(&value),
        };
        properties.insert(key.to_string(), value);
    }
}

/// The label of a shaft: the last label with exactly the shaft's horizontal position.
pub fn find_shaft_label<'a>(shaft: &Feature, labels: &'a [Feature]) -> Option<&'a Feature> {
    let shaft_position = planar_position(shaft)?;
    labels
        .iter()
        .filter(|label| planar_position(label) == Some(shaft_position))
        .last()
}

/// Copy label attributes onto the shafts. Shafts that end up without numeric cover and bottom
/// heights are dropped.
pub fn correlate_shafts(
    shafts: Vec<Feature>,
    labels: &[Feature],
    config: &CorrelationConfig,
) -> Vec<Feature> {
    let num_shafts = shafts.len();
    let bar = ProgressBar::new(num_shafts as u64);
    let mut matched = 0;
    let mut correlated = Vec::with_capacity(num_shafts);
    for mut shaft in shafts {
        properties_mut(&mut shaft).insert(
            fields::COLOR.to_string(),
            JsonValue::from(config.default_color.as_str()),
        );
        if let Some(label) = find_shaft_label(&shaft, labels) {
            copy_label_fields(&mut shaft, label, fields::SHAFT_LABEL_FIELDS);
            matched += 1;
        }
        if has_shaft_heights(&shaft) {
            correlated.push(shaft);
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    log::info!(
        "Found labels for {} of {} shafts, kept {} shafts with cover and bottom height",
        matched,
        num_shafts,
        correlated.len()
    );
    correlated
}

pub fn has_shaft_heights(shaft: &Feature) -> bool {
    numeric_property(shaft, fields::SHAFT_COVER_HEIGHT).is_some()
        && numeric_property(shaft, fields::SHAFT_BOTTOM_HEIGHT).is_some()
}

/// Scales by a power of ten and rounds half away from zero. The scaling itself rounds, so a value
/// stored just below a decimal half (2.675 is 2.67499..) lands on the half and rounds up. Exact
/// decimal rounding would give 2.67 there, and 0.12 for 0.125 (half to even).
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn pipe_line(pipe: &Feature) -> EtlResult<geo::LineString> {
    match pipe.geometry.as_ref().map(|geometry| &geometry.value) {
        Some(geojson::Value::LineString(positions)) => Ok(positions
            .iter()
            .map(|position| (position[0], position[1]))
            .collect::<Vec<_>>()
            .into()),
        _ => Err(EtlError::unrecognized(
            crate::geofile::feature::geometry_type(pipe),
            "pipes must be LineStrings",
        )),
    }
}

/// The label of a pipe: the first label whose stated length is within the tolerance of the pipe's
/// horizontal length and which lies inside the buffer around the pipe.
pub fn find_pipe_label<'a>(
    pipe: &Feature,
    labels: &'a [Feature],
    config: &CorrelationConfig,
) -> EtlResult<Option<&'a Feature>> {
    let line = pipe_line(pipe)?;
    if line.0.len() < 2 {
        log::warn!("Pipe with less than two vertices, it cannot be matched");
        return Ok(None);
    }
    let length = round_to(line.euclidean_length(), 3);
    let min_length = length - config.pipe_length_tolerance;
    let max_length = length + config.pipe_length_tolerance;

    Ok(labels.iter().find(|label| {
        let Some(label_length) = numeric_property(label, fields::PIPE_LENGTH) else {
            return false;
        };
        let label_length = round_to(label_length, 2);
        if label_length < min_length || max_length < label_length {
            return false;
        }
        match planar_position(label) {
            // Inside a buffer with round caps and joins means closer to the line than its radius.
            Some((x, y)) => {
                geo::Point::new(x, y).euclidean_distance(&line) < config.pipe_buffer_radius
            }
            None => false,
        }
    }))
}

/// Set pipe defaults and copy the attributes of matching labels onto the pipes.
pub fn correlate_pipes(
    pipes: &mut [Feature],
    labels: &[Feature],
    config: &CorrelationConfig,
) -> EtlResult<()> {
    let bar = ProgressBar::new(pipes.len() as u64);
    let mut matched = 0;
    for pipe in pipes.iter_mut() {
        let properties = properties_mut(pipe);
        properties.insert(
            fields::COLOR.to_string(),
            JsonValue::from(config.default_color.as_str()),
        );
        properties.insert(
            fields::PIPE_WIDTH.to_string(),
            JsonValue::from(config.default_pipe_diameter),
        );
        if let Some(label) = find_pipe_label(pipe, labels, config)? {
            copy_label_fields(pipe, label, fields::PIPE_LABEL_FIELDS);
            matched += 1;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    log::info!("Found labels for {} of {} pipes", matched, pipes.len());
    Ok(())
}
