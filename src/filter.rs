//! Tree filtering with ancestor context
//!
//! Every filter is the same bottom-up pass: children are filtered first, and
//! a node survives when it matches on its own or still has a surviving
//! descendant. A surviving ancestor keeps only its surviving children, and
//! depth is never collapsed.

use crate::catalog::Category;
use crate::hierarchy::count_nodes;

/// Filter a forest with a per-node predicate.
///
/// The predicate only sees the node itself; inheritance from descendants is
/// handled here. The input forest is left untouched.
pub fn filter_tree<F>(forest: &[Category], matches: &F) -> Vec<Category>
where
    F: Fn(&Category) -> bool,
{
    let kept = prune(forest, matches);
    tracing::debug!(
        input = count_nodes(forest),
        kept = count_nodes(&kept),
        roots = kept.len(),
        "filtered category tree"
    );
    kept
}

fn prune<F>(forest: &[Category], matches: &F) -> Vec<Category>
where
    F: Fn(&Category) -> bool,
{
    forest
        .iter()
        .filter_map(|node| {
            let children = prune(&node.children, matches);
            if matches(node) || !children.is_empty() {
                let mut kept = node.detached();
                kept.children = children;
                Some(kept)
            } else {
                None
            }
        })
        .collect()
}

/// Keep nodes whose `is_active` equals `active`, plus their ancestors
pub fn filter_by_status(forest: &[Category], active: bool) -> Vec<Category> {
    filter_tree(forest, &status_predicate(active))
}

/// Keep nodes whose name or description contains `query` (case-insensitive), plus their ancestors
pub fn filter_by_search(forest: &[Category], query: &str) -> Vec<Category> {
    filter_tree(forest, &search_predicate(query))
}

pub fn status_predicate(active: bool) -> impl Fn(&Category) -> bool {
    move |node| node.is_active == active
}

pub fn search_predicate(query: &str) -> impl Fn(&Category) -> bool {
    let needle = query.to_lowercase();
    move |node| {
        node.name.to_lowercase().contains(&needle)
            || node
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}
