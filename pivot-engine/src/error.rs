//! FILENAME: pivot-engine/src/error.rs

use query_engine::{GroupPath, QueryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PivotError {
    #[error("Pivot field is invalid: {0}")]
    Query(#[from] QueryError),

    #[error("Group path '{path}' is deeper than the {levels} {axis} level(s)")]
    PathTooDeep {
        axis: &'static str,
        path: GroupPath,
        levels: usize,
    },
}

pub type Result<T> = std::result::Result<T, PivotError>;
