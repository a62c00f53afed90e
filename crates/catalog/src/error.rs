use std::path::PathBuf;

/// Reasons a single dataset record is rejected at load time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("unknown category prefix in id {0:?}")]
    UnknownPrefix(String),
    #[error("invalid coordinates for {id}: lat={lat} lon={lon}")]
    InvalidCoordinates { id: String, lat: f64, lon: f64 },
    #[error("empty name for {0}")]
    EmptyName(String),
    #[error("duplicate id {0}")]
    DuplicateId(String),
    #[error("malformed record #{index}: {reason}")]
    Malformed { index: usize, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decompress dataset: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("decode dataset: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("dataset contains no valid points ({rejected} rejected)")]
    Empty { rejected: usize },
}
