use catsync_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to access catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog layout: {0}")]
    Schema(String),

    #[error("record {record}: {reason}")]
    RowDecode { record: usize, reason: String },

    #[error("record {record}: rate plan references unknown product '{sku}'")]
    UnknownProduct { record: usize, sku: String },

    #[error("{entity} '{key}': value {value:?} cannot be exported")]
    Unencodable {
        entity: &'static str,
        key: String,
        value: String,
    },

    #[error("sanity check failed: {0}")]
    Sanity(#[from] CoreError),
}
