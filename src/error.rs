use std::path::PathBuf;

/// A single document rejected by a bulk insert. `index` is the position of the document in the
/// batch that was handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertFailure {
    pub index: usize,
    pub code: i32,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Could not convert {path:?}: {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("Unrecognized input {input}: {reason}")]
    UnrecognizedInput { input: String, reason: String },

    #[error(
        "{} of {} documents could not be inserted into {collection}",
        .failures.len(),
        .inserted_count + .failures.len()
    )]
    PartialInsertFailure {
        collection: String,
        inserted_count: usize,
        failures: Vec<InsertFailure>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[error(transparent)]
    ProjCreate(#[from] proj::ProjCreateError),

    #[error(transparent)]
    Proj(#[from] proj::ProjError),

    #[error(transparent)]
    E57(#[from] e57::Error),

    #[error(transparent)]
    Las(#[from] las::Error),

    #[error(transparent)]
    Database(#[from] mongodb::error::Error),

    #[error(transparent)]
    Bson(#[from] mongodb::bson::ser::Error),
}

impl EtlError {
    pub fn conversion_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EtlError::ConversionFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unrecognized(input: impl ToString, reason: impl ToString) -> Self {
        EtlError::UnrecognizedInput {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
