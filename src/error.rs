use std::path::PathBuf;

use crate::markets::Market;

pub type Result<T, E = InsightsError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum InsightsError {
    #[error("unknown market key {0:?}")]
    UnknownMarket(String),
    #[error("no model loaded for market {0}")]
    ModelNotLoaded(Market),
    /// A tree node that is neither a complete split nor a leaf.
    #[error("malformed tree node in {market} at {path}")]
    MalformedNode { market: String, path: String },
    #[error("feature vector has {actual} values, model expects {expected}")]
    FeatureCountMismatch { expected: usize, actual: usize },
    #[error("model {market} declares features unknown to the schema: {}", names.join(", "))]
    UnknownFeatures { market: String, names: Vec<String> },
    #[error("{path} is stored as the {expected} model but declares market {declared}")]
    MarketMismatch {
        path: PathBuf,
        expected: Market,
        declared: Market,
    },
    #[error("unsupported objective {0:?}")]
    InvalidObjective(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid model json in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
