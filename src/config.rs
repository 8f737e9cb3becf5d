use std::{fs::read_to_string, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::{
    crs::crs_utils::EpsgCode,
    error::{EtlError, EtlResult},
};

/// Cesium uses the GRS80 ellipsoid as height reference, the survey heights refer to the German
/// geoid. Average undulation over 10 points in Herne.
pub const DEFAULT_GEOID_UNDULATION: f64 = 45.43;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub sewers: SewerConfig,
    pub database: Option<DatabaseConfig>,
    pub dem: Option<DemConfig>,
    pub point_cloud: Option<PointCloudConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SewerConfig {
    pub input_dir: PathBuf,
    pub processing_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Prefix of the output file names, e.g. `sewers` → `sewers_point.geojson`.
    pub dataset_name: String,
    /// Overrides the CRS declared by the shapefiles. Required when they declare none.
    pub source_epsg: Option<EpsgCode>,
    pub target_epsg: EpsgCode,
    pub geoid_undulation: f64,
    /// Horizontal offset (degrees) of the upper vertex of derived shaft lines.
    pub shaft_line_perturbation: f64,
    pub correlation: CorrelationConfig,
}

impl Default for SewerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("sewers/input"),
            processing_dir: PathBuf::from("sewers/processing"),
            output_dir: PathBuf::from("sewers/output"),
            dataset_name: "sewers".to_string(),
            source_epsg: Some(4647),
            target_epsg: 4326,
            geoid_undulation: DEFAULT_GEOID_UNDULATION,
            shaft_line_perturbation: 1e-12,
            correlation: CorrelationConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationConfig {
    /// Points whose layer contains this marker are labels (text blocks) carrying attributes.
    pub label_layer_marker: String,
    /// Point layer that is neither shaft nor label.
    pub ignored_shaft_layer: String,
    /// Height value marking points whose real height could not be determined.
    pub height_sentinel: f64,
    /// Allowed absolute difference between the pipe length and the length stated by a label.
    pub pipe_length_tolerance: f64,
    /// Radius of the buffer around a pipe that must contain the label, in source CRS units.
    pub pipe_buffer_radius: f64,
    pub default_color: String,
    /// Profile width in millimeters for pipes without a label.
    pub default_pipe_diameter: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            label_layer_marker: "_TXT".to_string(),
            ignored_shaft_layer: "Abwasser-Haltungen-Insp-Symbole-DWA-SK".to_string(),
            height_sentinel: 100.0,
            pipe_length_tolerance: 0.1,
            pipe_buffer_radius: 1.0,
            default_color: "150,150,150".to_string(),
            default_pipe_diameter: 300.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub server: String,
    pub port: u16,
    pub database: String,
    /// Prefix of all collection names, e.g. `sewerData` → `sewerData.shafts`.
    pub collection: String,
    /// Directory holding the files to load. Defaults to the sewer output directory.
    pub input_dir: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}/", self.server, self.port)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct DemConfig {
    pub input_dir: PathBuf,
    pub processing_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source_epsg: EpsgCode,
    pub target_epsg: EpsgCode,
    pub geoid_undulation: f64,
    /// Resampling factors relative to the pixel size of the input grid.
    pub resolutions: Vec<u32>,
    /// Cells above this value are treated as nodata in addition to the band's nodata value.
    pub no_data_threshold: f64,
}

impl Default for DemConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("dem/input"),
            processing_dir: PathBuf::from("dem/processing"),
            output_dir: PathBuf::from("dem/output"),
            source_epsg: 25832,
            target_epsg: 4326,
            geoid_undulation: DEFAULT_GEOID_UNDULATION,
            resolutions: vec![1, 10, 25, 50],
            no_data_threshold: 1e7,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct PointCloudConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// CRS of E57 files, which carry no CRS themselves.
    pub source_epsg: EpsgCode,
    pub target_epsg: EpsgCode,
    /// LAS scale of x and y. 1e-7 degrees are about 1cm.
    pub horizontal_scale: f64,
    pub vertical_scale: f64,
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("pointcloud/input"),
            output_dir: PathBuf::from("pointcloud/output"),
            source_epsg: 4647,
            target_epsg: 4326,
            horizontal_scale: 1e-7,
            vertical_scale: 0.01,
        }
    }
}

impl Config {
    /// Read the config file. JSON files are accepted as well since YAML is a superset of JSON.
    pub fn from_file(filepath: &Path) -> EtlResult<Self> {
        if !filepath.is_file() {
            return Err(EtlError::ConfigMissing(format!(
                "Config file {:?} not found",
                filepath
            )));
        }
        let config_contents = read_to_string(filepath)?;
        Self::from_yaml_str(&config_contents)
    }

    pub fn from_yaml_str(contents: &str) -> EtlResult<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    pub fn database(&self) -> EtlResult<&DatabaseConfig> {
        self.database
            .as_ref()
            .ok_or_else(|| EtlError::ConfigMissing("No 'database' section in config".to_string()))
    }

    pub fn dem(&self) -> EtlResult<&DemConfig> {
        self.dem
            .as_ref()
            .ok_or_else(|| EtlError::ConfigMissing("No 'dem' section in config".to_string()))
    }

    pub fn point_cloud(&self) -> EtlResult<&PointCloudConfig> {
        self.point_cloud.as_ref().ok_or_else(|| {
            EtlError::ConfigMissing("No 'point_cloud' section in config".to_string())
        })
    }
}
