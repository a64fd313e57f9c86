//! FILENAME: engine/src/error.rs

use query_parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Property '{path}' cannot be resolved: '{segment}' is not a member of {type_name}")]
    PathResolution {
        path: String,
        segment: String,
        type_name: String,
    },

    #[error("Failed to parse filter '{text}': {source}")]
    Parse {
        text: String,
        #[source]
        source: ParseError,
    },

    #[error("Custom filter on '{property}' is invalid: {source}")]
    CustomExpression {
        property: String,
        #[source]
        source: Box<QueryError>,
    },

    #[error("Invalid index '{index}' in path '{path}'")]
    InvalidIndex { path: String, index: String },

    #[error("Unsupported filter expression: {0}")]
    Unsupported(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
