use thiserror::Error;

/// Errors raised anywhere in the crate.
///
/// The aggregation core only ever raises [`VizError::UnknownCategory`]. The remaining variants belong to the
/// catalogue loader, the ingestion handler and the terminal front end.
#[derive(Debug, Error)]
pub enum VizError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("invalid catalogue: {0}")]
    InvalidCatalogue(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("warehouse unavailable: {0}")]
    BackendUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error(transparent)]
    Builder(#[from] fieldx::error::FieldXError),
}

impl VizError {
    /// HTTP status code an endpoint reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedInput(_) | Self::Json(_) => 400,
            _ => 500,
        }
    }
}

impl From<sea_orm::DbErr> for VizError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

pub type Result<T, E = VizError> = std::result::Result<T, E>;
