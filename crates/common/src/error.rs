use std::path::PathBuf;

use rust_decimal::Decimal;

/// The upstream row schema drifted. Never recovered; the caller gets it as-is.
#[derive(Debug, thiserror::Error)]
pub enum DataContractError {
    #[error("row {row}: column `{column}` is not a number: {value}")]
    NonNumericVolume {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column `{column}` is negative: {value}")]
    NegativeVolume {
        row: usize,
        column: &'static str,
        value: Decimal,
    },

    #[error("row {row}: missing timestamp")]
    MissingTimestamp { row: usize },

    #[error("row {row}: unparseable timestamp: {value}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: volume total exceeds the representable decimal range")]
    VolumeOverflow { row: usize },

    #[error("row {row}: expected an object, got {kind}")]
    NotAnObject { row: usize, kind: &'static str },

    #[error("table payload must be an array of rows or an object with a `result` array")]
    InvalidEnvelope,

    #[error("malformed table payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to obtain a table from a query executor.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Contract(#[from] DataContractError),
}

impl SourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Contract(_) => "contract",
        }
    }
}
