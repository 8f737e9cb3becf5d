use gdal::Dataset;

use crate::error::EtlResult;

/// A cell is valid if it is neither the band's nodata value nor above `threshold`. Some inputs mark
/// missing cells with huge values instead of the declared nodata value.
pub fn is_valid_cell(value: f64, no_data: Option<f64>, threshold: f64) -> bool {
    !value.is_nan() && Some(value) != no_data && value <= threshold
}

pub fn add_offset_to_valid_cells(values: &mut [f64], no_data: Option<f64>, offset: f64) {
    for value in values.iter_mut() {
        if !value.is_nan() && Some(*value) != no_data {
            *value += offset;
        }
    }
}

/// Replace all invalid cells with the mean of the valid ones and return the mean. Without any valid
/// cell nothing is changed.
pub fn fill_invalid_cells_with_mean(
    values: &mut [f64],
    no_data: Option<f64>,
    threshold: f64,
) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|value| is_valid_cell(**value, no_data, threshold))
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    for value in values.iter_mut() {
        if !is_valid_cell(*value, no_data, threshold) {
            *value = mean;
        }
    }
    Some(mean)
}

/// Read the first band as `f64`, let `update` modify the cells and write them back.
pub fn update_first_band<F>(dataset: &Dataset, update: F) -> EtlResult<()>
where
    F: FnOnce(&mut [f64], Option<f64>),
{
    let mut band = dataset.rasterband(1)?;
    let no_data = band.no_data_value();
    let mut buffer = band.read_band_as::<f64>()?;
    update(&mut buffer.data, no_data);
    band.write((0, 0), buffer.size, &buffer)?;
    Ok(())
}
