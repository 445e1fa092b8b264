//! Expanded/collapsed state for a displayed category tree.
//!
//! The set belongs to whoever renders one loaded tree. It is rebuilt with
//! [`ExpansionState::for_forest`] whenever the tree is rebuilt from new data:
//! every node with children starts expanded.

use crate::catalog::{Category, CategoryId};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionState {
    expanded: HashSet<CategoryId>,
}

/// One renderable row of the tree
#[derive(Debug, Clone, Copy)]
pub struct VisibleRow<'a> {
    pub node: &'a Category,
    pub depth: usize,
    pub expanded: bool,
}

impl ExpansionState {
    /// Initial state for a freshly built tree: all parents open
    pub fn for_forest(forest: &[Category]) -> Self {
        let mut state = Self::default();
        state.expand_all(forest);
        state
    }

    /// Flip `id`. Returns whether it is expanded afterwards.
    pub fn toggle(&mut self, id: CategoryId) -> bool {
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    pub fn is_expanded(&self, id: CategoryId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expand(&mut self, id: CategoryId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: CategoryId) {
        self.expanded.remove(&id);
    }

    pub fn expand_all(&mut self, forest: &[Category]) {
        for node in forest {
            if node.has_children() {
                self.expanded.insert(node.id);
                self.expand_all(&node.children);
            }
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    /// Rows a renderer shows: roots always, children only under expanded nodes
    pub fn visible_rows<'a>(&self, forest: &'a [Category]) -> Vec<VisibleRow<'a>> {
        let mut rows = Vec::new();
        self.collect_rows(forest, 0, &mut rows);
        rows
    }

    fn collect_rows<'a>(&self, nodes: &'a [Category], depth: usize, rows: &mut Vec<VisibleRow<'a>>) {
        for node in nodes {
            let expanded = node.has_children() && self.is_expanded(node.id);
            rows.push(VisibleRow { node, depth, expanded });
            if expanded {
                self.collect_rows(&node.children, depth + 1, rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_tree;
    use crate::hierarchy::tests::{category, scenario_a};

    fn nested() -> Vec<Category> {
        build_tree(&[
            category(1, None, "Bath", true),
            category(2, Some(1), "Soap", true),
            category(3, Some(2), "Bars", true),
            category(4, None, "Kitchen", true),
        ])
    }

    #[test]
    fn test_parents_start_expanded_leaves_absent() {
        let state = ExpansionState::for_forest(&nested());

        assert!(state.is_expanded(1));
        assert!(state.is_expanded(2));
        assert!(!state.is_expanded(3));
        assert!(!state.is_expanded(4));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let forest = build_tree(&scenario_a());
        let original = ExpansionState::for_forest(&forest);

        for id in [1, 2, 3, 99] {
            let mut state = original.clone();
            let before = state.is_expanded(id);
            assert_eq!(state.toggle(id), !before);
            assert_eq!(state.toggle(id), before);
            assert_eq!(state, original);
        }
    }

    #[test]
    fn test_toggle_does_not_cascade() {
        let mut state = ExpansionState::for_forest(&nested());
        state.toggle(1);

        assert!(!state.is_expanded(1));
        assert!(state.is_expanded(2));
    }

    #[test]
    fn test_visible_rows_follow_expansion() {
        let forest = nested();
        let mut state = ExpansionState::for_forest(&forest);

        let rows: Vec<(usize, CategoryId)> = state.visible_rows(&forest).iter().map(|r| (r.depth, r.node.id)).collect();
        assert_eq!(rows, vec![(0, 1), (1, 2), (2, 3), (0, 4)]);

        state.collapse(2);
        let rows: Vec<CategoryId> = state.visible_rows(&forest).iter().map(|r| r.node.id).collect();
        assert_eq!(rows, vec![1, 2, 4]);

        state.collapse_all();
        assert!(state.is_empty());
        let rows: Vec<CategoryId> = state.visible_rows(&forest).iter().map(|r| r.node.id).collect();
        assert_eq!(rows, vec![1, 4]);
    }

    #[test]
    fn test_rebuild_resets_state() {
        let forest = nested();
        let mut state = ExpansionState::for_forest(&forest);
        state.collapse_all();
        state.expand(4);

        let rebuilt = build_tree(&[category(4, None, "Kitchen", true), category(5, Some(4), "Pans", true)]);
        let state = ExpansionState::for_forest(&rebuilt);
        assert!(state.is_expanded(4));
        assert!(!state.is_expanded(1));
    }
}
