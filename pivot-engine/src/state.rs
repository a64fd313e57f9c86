//! FILENAME: pivot-engine/src/state.rs
//! Collapse/expand state per group node, kept separately for each axis.
//!
//! Nodes are identified by their `GroupPath`, never by a joined string, so
//! key values that contain the display separator cannot collide. A path
//! absent from the set is expanded.

use query_engine::GroupPath;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Which axis a group path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Rows,
    Columns,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::Rows => "row",
            Axis::Columns => "column",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollapseState {
    #[serde(default)]
    pub rows: FxHashSet<GroupPath>,
    #[serde(default)]
    pub columns: FxHashSet<GroupPath>,
}

impl CollapseState {
    pub fn new() -> Self {
        CollapseState::default()
    }

    fn set(&self, axis: Axis) -> &FxHashSet<GroupPath> {
        match axis {
            Axis::Rows => &self.rows,
            Axis::Columns => &self.columns,
        }
    }

    fn set_mut(&mut self, axis: Axis) -> &mut FxHashSet<GroupPath> {
        match axis {
            Axis::Rows => &mut self.rows,
            Axis::Columns => &mut self.columns,
        }
    }

    pub fn is_collapsed(&self, axis: Axis, path: &GroupPath) -> bool {
        self.set(axis).contains(path)
    }

    /// Flips the node's state. Returns true when it is now collapsed.
    pub fn toggle(&mut self, axis: Axis, path: &GroupPath) -> bool {
        let set = self.set_mut(axis);
        if set.remove(path) {
            false
        } else {
            set.insert(path.clone());
            true
        }
    }

    /// Returns true when the state changed.
    pub fn set_collapsed(&mut self, axis: Axis, path: &GroupPath, collapsed: bool) -> bool {
        let set = self.set_mut(axis);
        if collapsed {
            set.insert(path.clone())
        } else {
            set.remove(path)
        }
    }

    pub fn expand_all(&mut self) {
        self.rows.clear();
        self.columns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine::Value;

    #[test]
    fn toggle_round_trips() {
        let mut state = CollapseState::new();
        let west = GroupPath::from_keys([Value::from("West")]);
        assert!(state.toggle(Axis::Rows, &west));
        assert!(state.is_collapsed(Axis::Rows, &west));
        assert!(!state.is_collapsed(Axis::Columns, &west));
        assert!(!state.toggle(Axis::Rows, &west));
        assert!(state.is_empty());
    }

    #[test]
    fn separator_inside_keys_does_not_collide() {
        let mut state = CollapseState::new();
        let joined = GroupPath::from_keys([Value::from("a/b")]);
        let nested = GroupPath::from_keys([Value::from("a"), Value::from("b")]);
        state.set_collapsed(Axis::Rows, &joined, true);
        assert_eq!(joined.to_path_key("/"), nested.to_path_key("/"));
        assert!(!state.is_collapsed(Axis::Rows, &nested));
    }
}
