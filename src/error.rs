//! Error types for feeds, configuration and export

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed on read the input: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "csv")]
    #[error("Failed on read the CSV: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "json")]
    #[error("Failed on parse the JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed on parse the config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Failed on parse the time `{raw}`: {reason}")]
    Timestamp { raw: String, reason: String },

    #[error("{0} header not found")]
    MissingHeader(String),

    #[error("Invalid {field}: `{value}`")]
    InvalidField { field: String, value: String },

    #[error("Failed on write the GPX: {0}")]
    Gpx(String),
}

pub type Result<T> = std::result::Result<T, Error>;
