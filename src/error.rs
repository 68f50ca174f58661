//! Error types for the sync engine.

use crate::types::Path;
use thiserror::Error;

/// Main error type for engine and table operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No such key: {0}")]
    NoSuchKey(String),

    #[error("Path not found: {0}")]
    PathNotFound(Path),

    #[error("Not a sequence: {0}")]
    NotASequence(Path),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;
        // Only the parser attaches a position; encoder errors report line 0
        match e.classify() {
            Category::Io => SyncError::Serialization(e.to_string()),
            _ if e.line() == 0 => SyncError::Serialization(e.to_string()),
            Category::Syntax | Category::Data | Category::Eof => {
                SyncError::Deserialization(e.to_string())
            }
        }
    }
}

impl From<rmp_serde::encode::Error> for SyncError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SyncError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        SyncError::Deserialization(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_parse_errors_are_deserialization() {
        let inputs: [&[u8]; 4] = [b"not json", b"{\"op\": \"init\"", b"{\"op\": 7}", b""];
        for input in inputs {
            let e = serde_json::from_slice::<BTreeMap<String, String>>(input).unwrap_err();
            let err = SyncError::from(e);
            assert!(matches!(err, SyncError::Deserialization(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_json_encode_errors_are_serialization() {
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], 1);
        let err = SyncError::from(serde_json::to_vec(&bad).unwrap_err());
        assert!(matches!(err, SyncError::Serialization(_)), "{:?}", err);
    }
}
