//! FILENAME: pivot-engine/src/lib.rs
//! Pivot table subsystem.
//!
//! Cross-tabulates a list of items on row and column group fields, with
//! aggregated value fields and per-node collapse state. It depends on
//! `query-engine` for the item model, property paths and grouping.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot table IS)
//! - `aggregate`: Value-field aggregation over item sets
//! - `state`: Collapse/expand state per axis
//! - `view`: Renderable output (WHAT we display)
//! - `engine`: Calculation engine (HOW we calculate)

pub mod aggregate;
pub mod definition;
pub mod engine;
pub mod error;
pub mod state;
pub mod view;

pub use aggregate::{aggregate, Aggregator};
pub use definition::*;
pub use engine::{calculate_pivot, PivotEngine};
pub use error::{PivotError, Result};
pub use state::{Axis, CollapseState};
pub use view::*;
