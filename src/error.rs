use std::path::PathBuf;

/// Failures of the vehicle registry. A plate that is simply not registered is
/// not an error; lookups return `Ok(None)` for that.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error("license plate already registered: {0}")]
    DuplicatePlate(String),
    #[error("corrupt registry row: {0}")]
    CorruptRecord(String),
}

impl RegistryError {
    /// Classify a driver error raised while writing `plate`.
    pub(crate) fn from_write(err: sqlx::Error, plate: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RegistryError::DuplicatePlate(plate.to_string())
            }
            _ => RegistryError::Unavailable(err),
        }
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Unavailable(err)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported vehicle category: {0:?} (expected car, truck or motorcycle)")]
pub struct UnsupportedVehicleCategory(pub String);

#[derive(thiserror::Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to read frame source {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode frame {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
