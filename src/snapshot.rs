//! One refresh cycle's worth of category data.
//!
//! The forest and the flat table are both derived from the same normalized
//! batch held here, so the two views can never disagree about which records
//! exist. A refresh replaces the whole snapshot.

use crate::catalog::{normalize_records, Category, CategoryId, RejectedRecord};
use crate::expansion::ExpansionState;
use crate::hierarchy;
use crate::query::{paginate, CategoryQuery, Page};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CategorySnapshot {
    records: Vec<Category>,
    index: HashMap<CategoryId, usize>,  // id -> position in records, first occurrence
    forest: Vec<Category>,
    rejected: Vec<RejectedRecord>,
    loaded_at: DateTime<Utc>,
}

/// Summary numbers for status displays
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub roots: usize,
    pub orphans: usize,   // roots whose parent_id points outside the batch
    pub max_depth: usize,
    pub rejected: usize,
}

/// A record with its resolved ancestor chain, outermost first
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDetail {
    pub category: Category,
    pub ancestors: Vec<Category>,
    pub child_count: usize,
}

impl CategorySnapshot {
    /// Normalize and build from the entries of a fetched dump
    pub fn from_raw(entries: &[Value]) -> Self {
        let batch = normalize_records(entries);
        let mut snapshot = Self::from_categories(batch.categories);
        snapshot.rejected = batch.rejected;
        snapshot
    }

    /// Build from records that are already normalized
    pub fn from_categories(records: Vec<Category>) -> Self {
        let forest = hierarchy::build_tree(&records);
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            index.entry(record.id).or_insert(i);
        }
        Self {
            records,
            index,
            forest,
            rejected: Vec::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[Category] {
        &self.records
    }

    pub fn forest(&self) -> &[Category] {
        &self.forest
    }

    pub fn rejected(&self) -> &[RejectedRecord] {
        &self.rejected
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Fresh expansion state for this snapshot's tree
    pub fn initial_expansion(&self) -> ExpansionState {
        ExpansionState::for_forest(&self.forest)
    }

    /// Hierarchical view under `query` (status, search, sort; paging does not apply)
    pub fn tree_view(&self, query: &CategoryQuery) -> Vec<Category> {
        query.apply_to_forest(&self.forest)
    }

    /// Flat, paginated view under `query`
    pub fn table_page(&self, query: &CategoryQuery) -> Page<Category> {
        let rows: Vec<Category> = query
            .apply_to_records(&self.records)
            .into_iter()
            .cloned()
            .collect();
        paginate(&rows, query.page, query.page_size)
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    pub fn detail(&self, id: CategoryId) -> Option<CategoryDetail> {
        let category = self.get(id)?.detached();
        let ancestors = hierarchy::ancestor_chain(id, |key| self.get(key))
            .into_iter()
            .map(Category::detached)
            .collect();
        let child_count = hierarchy::find(&self.forest, id).map_or(0, |node| node.children.len());
        Some(CategoryDetail { category, ancestors, child_count })
    }

    pub fn stats(&self) -> SnapshotStats {
        let active = self.records.iter().filter(|c| c.is_active).count();
        let orphans = self
            .forest
            .iter()
            .filter(|root| root.parent_id.is_some_and(|p| !self.index.contains_key(&p)))
            .count();

        SnapshotStats {
            total: self.records.len(),
            active,
            inactive: self.records.len() - active,
            roots: self.forest.len(),
            orphans,
            max_depth: hierarchy::max_depth(&self.forest),
            rejected: self.rejected.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::StatusFilter;
    use serde_json::json;
    use std::collections::HashSet;

    fn raw_batch() -> Vec<Value> {
        serde_json::from_value(json!([
            {"id": 1, "parent_id": null, "name": "Bath", "is_active": true},
            {"id": 2, "parent_id": 1, "name": "Soap Bars", "is_active": false},
            {"id": 3, "parent_id": 1, "name": "Shampoo", "is_active": true},
            {"id": 4, "parent_id": 99, "name": "Orphan"},
            {"name": "No id at all"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_snapshot_views_share_records() {
        let snapshot = CategorySnapshot::from_raw(&raw_batch());

        let tree_ids: HashSet<CategoryId> = hierarchy::flatten(snapshot.forest()).iter().map(|(_, c)| c.id).collect();
        let query = CategoryQuery { page_size: 100, ..CategoryQuery::default() };
        let table_ids: HashSet<CategoryId> = snapshot.table_page(&query).items.iter().map(|c| c.id).collect();

        assert_eq!(tree_ids, table_ids);
        assert_eq!(tree_ids.len(), 4);
        assert_eq!(snapshot.rejected().len(), 1);
    }

    #[test]
    fn test_stats() {
        let stats = CategorySnapshot::from_raw(&raw_batch()).stats();
        assert_eq!(
            stats,
            SnapshotStats { total: 4, active: 3, inactive: 1, roots: 2, orphans: 1, max_depth: 2, rejected: 1 }
        );
    }

    #[test]
    fn test_tree_view_filters_with_context() {
        let snapshot = CategorySnapshot::from_raw(&raw_batch());
        let query = CategoryQuery { status: StatusFilter::Inactive, ..CategoryQuery::default() };
        let view = snapshot.tree_view(&query);

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, 1);
        assert_eq!(view[0].children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2]);
        // the snapshot's own forest is untouched
        assert_eq!(snapshot.forest()[0].children.len(), 2);
    }

    #[test]
    fn test_table_page_paginates_flat_records() {
        let snapshot = CategorySnapshot::from_raw(&raw_batch());
        let query = CategoryQuery { page: 2, page_size: 3, ..CategoryQuery::default() };
        let page = snapshot.table_page(&query);

        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_detail_and_expansion() {
        let snapshot = CategorySnapshot::from_raw(&raw_batch());

        let detail = snapshot.detail(3).unwrap();
        assert_eq!(detail.ancestors.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(snapshot.detail(1).unwrap().child_count, 2);
        assert!(snapshot.detail(42).is_none());

        let expansion = snapshot.initial_expansion();
        assert!(expansion.is_expanded(1));
        assert_eq!(expansion.len(), 1);
    }

    #[test]
    fn test_wrong_typed_entry_only_rejects_itself() {
        let mut entries = raw_batch();
        entries.push(json!(null));
        entries.push(json!({"id": 6, "parent_id": 3, "name": "Travel size", "description": 12, "updated_at": 1714557600}));
        let snapshot = CategorySnapshot::from_raw(&entries);

        assert_eq!(snapshot.records().len(), 5);
        assert_eq!(snapshot.rejected().iter().map(|r| r.index).collect::<Vec<_>>(), vec![4, 5]);
        let detail = snapshot.detail(6).unwrap();
        assert_eq!(detail.ancestors.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(detail.category.description.as_deref(), Some("12"));
    }

    #[test]
    fn test_get_uses_first_occurrence() {
        let mut first = crate::hierarchy::tests::category(1, None, "First", true);
        first.sort_order = 1;
        let second = crate::hierarchy::tests::category(1, None, "Second", true);
        let snapshot = CategorySnapshot::from_categories(vec![first, second]);

        assert_eq!(snapshot.get(1).map(|c| c.name.as_str()), Some("First"));
        assert!(snapshot.get(2).is_none());
        assert_eq!(snapshot.forest().len(), 2);
    }
}
