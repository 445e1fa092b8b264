//! Category tree construction
//!
//! Builds the navigable forest from a flat, normalized batch:
//! 1. Index every record by id so parent lookup is O(1)
//! 2. Walk the batch in its original order and attach each record to its
//!    parent's children, or to the root list when the parent is missing
//!
//! Parents own their children by value. Nothing here keeps a back-pointer;
//! upward navigation goes through `parent_id` on the flat records instead
//! (see [`ancestors`]).
//!
//! A `parent_id` that does not resolve inside the batch (partial page,
//! deleted parent, self reference) makes the record a root. That is the
//! policy, not an error. Two safety valves also produce roots, both logged:
//! a parent cycle is cut at its earliest member, and a chain deeper than
//! [`MAX_TREE_DEPTH`] is cut into stacked subtrees.

use crate::catalog::{Category, CategoryId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Deepest nesting the builder produces. A record that would sit below this
/// level is planted as a root of its own, with a warning, so every walk over
/// the forest (filtering, sorting, serialization, drop) stays shallow.
pub const MAX_TREE_DEPTH: usize = 256;

/// Build the forest for a batch of categories.
///
/// Every input record appears exactly once in the output. Sibling order
/// follows input order. The input is only read; each output node is a fresh
/// copy.
pub fn build_tree(records: &[Category]) -> Vec<Category> {
    if records.is_empty() {
        return Vec::new();
    }

    // Pass 1: id -> position. First occurrence wins if the batch repeats an id.
    let mut index: HashMap<CategoryId, usize> = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        index.entry(record.id).or_insert(i);
    }

    // Pass 2: resolve parents in input order
    let mut parent_of: Vec<Option<usize>> = vec![None; records.len()];
    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let resolved = record
            .parent_id
            .filter(|parent| *parent != record.id)
            .and_then(|parent| index.get(&parent).copied())
            .filter(|&p| p != i);

        match resolved {
            Some(p) => {
                parent_of[i] = Some(p);
                children_of[p].push(i);
            }
            None => {
                if let Some(parent) = record.parent_id {
                    tracing::debug!(id = record.id, parent, "unresolved parent, placing category at root");
                }
                roots.push(i);
            }
        }
    }

    let mut assembly = Assembly {
        records,
        children_of: &children_of,
        visited: vec![false; records.len()],
        deferred: VecDeque::new(),
    };
    let mut forest: Vec<Category> = Vec::with_capacity(roots.len());
    for &i in &roots {
        assembly.plant(i, &mut forest);
    }

    // Anything still unvisited hangs off a parent cycle (A -> B -> A). Break
    // each cycle at its earliest member so the records are not lost.
    for i in 0..records.len() {
        if assembly.visited[i] {
            continue;
        }
        let entry = cycle_entry(i, &parent_of);
        tracing::warn!(
            id = records[entry].id,
            parent = ?records[entry].parent_id,
            "category parent chain forms a cycle, promoting to root"
        );
        assembly.plant(entry, &mut forest);
    }

    tracing::debug!(records = records.len(), roots = forest.len(), "built category tree");
    forest
}

/// Owned-tree assembly state for one `build_tree` call
struct Assembly<'a> {
    records: &'a [Category],
    children_of: &'a [Vec<usize>],
    visited: Vec<bool>,
    // subtrees cut at MAX_TREE_DEPTH, waiting to be planted as roots
    deferred: VecDeque<usize>,
}

impl Assembly<'_> {
    /// Assemble `i` as a root, then every subtree that was cut off beneath it
    fn plant(&mut self, i: usize, forest: &mut Vec<Category>) {
        forest.push(self.assemble(i, 0));
        while let Some(next) = self.deferred.pop_front() {
            forest.push(self.assemble(next, 0));
        }
    }

    fn assemble(&mut self, i: usize, depth: usize) -> Category {
        self.visited[i] = true;
        let mut node = self.records[i].detached();
        let children_of = self.children_of;
        for &child in &children_of[i] {
            if self.visited[child] {
                continue;
            }
            if depth + 1 >= MAX_TREE_DEPTH {
                self.visited[child] = true;
                tracing::warn!(
                    id = self.records[child].id,
                    parent = self.records[i].id,
                    max_depth = MAX_TREE_DEPTH,
                    "category nested too deep, promoting to root"
                );
                self.deferred.push_back(child);
                continue;
            }
            node.children.push(self.assemble(child, depth + 1));
        }
        node
    }
}

/// Earliest (by input position) member of the cycle reached by walking up from `start`
fn cycle_entry(start: usize, parent_of: &[Option<usize>]) -> usize {
    let mut path: Vec<usize> = Vec::new();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut current = start;
    loop {
        if !seen.insert(current) {
            let from = path.iter().position(|&p| p == current).unwrap_or(0);
            return path[from..].iter().copied().min().unwrap_or(current);
        }
        path.push(current);
        match parent_of[current] {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

/// Generic bottom-up fold over one subtree.
///
/// `f` receives the node, its depth, and the folded results of its children
/// in order.
pub fn fold_tree<'a, B, F>(node: &'a Category, depth: usize, f: &F) -> B
where
    F: Fn(&'a Category, usize, Vec<B>) -> B,
{
    let child_results: Vec<B> = node
        .children
        .iter()
        .map(|child| fold_tree(child, depth + 1, f))
        .collect();
    f(node, depth, child_results)
}

/// Total number of nodes in a forest
pub fn count_nodes(forest: &[Category]) -> usize {
    forest
        .iter()
        .map(|root| fold_tree(root, 0, &|_, _, counts: Vec<usize>| 1 + counts.iter().sum::<usize>()))
        .sum()
}

/// Number of levels in the forest (0 when empty, 1 when every node is a root)
pub fn max_depth(forest: &[Category]) -> usize {
    forest
        .iter()
        .map(|root| {
            fold_tree(root, 0, &|_, _, depths: Vec<usize>| 1 + depths.into_iter().max().unwrap_or(0))
        })
        .max()
        .unwrap_or(0)
}

/// Pre-order rows of `(depth, node)`, roots at depth 0
pub fn flatten(forest: &[Category]) -> Vec<(usize, &Category)> {
    fn visit<'a>(nodes: &'a [Category], depth: usize, out: &mut Vec<(usize, &'a Category)>) {
        for node in nodes {
            out.push((depth, node));
            visit(&node.children, depth + 1, out);
        }
    }

    let mut rows = Vec::new();
    visit(forest, 0, &mut rows);
    rows
}

/// Copy of the forest keeping only the first `levels` levels
pub fn truncate_depth(forest: &[Category], levels: usize) -> Vec<Category> {
    if levels == 0 {
        return Vec::new();
    }
    forest
        .iter()
        .map(|node| {
            let mut copy = node.detached();
            copy.children = truncate_depth(&node.children, levels - 1);
            copy
        })
        .collect()
}

/// Find a node anywhere in the forest
pub fn find(forest: &[Category], id: CategoryId) -> Option<&Category> {
    for node in forest {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Ancestors of `id` resolved through `lookup`, outermost first.
///
/// Stops at the first parent that does not resolve, and at a repeated id
/// so cyclic data cannot loop forever.
pub fn ancestor_chain<'a, L>(id: CategoryId, lookup: L) -> Vec<&'a Category>
where
    L: Fn(CategoryId) -> Option<&'a Category>,
{
    let mut chain = Vec::new();
    let mut seen: HashSet<CategoryId> = HashSet::from([id]);
    let mut current = lookup(id).and_then(|c| c.parent_id);
    while let Some(parent) = current {
        if !seen.insert(parent) {
            break;
        }
        let Some(record) = lookup(parent) else { break };
        chain.push(record);
        current = record.parent_id;
    }
    chain.reverse();
    chain
}
