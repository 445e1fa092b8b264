//! Listing parameters: search, status, parent, sort and paging.
//!
//! These mirror the parameters the catalog service accepts for its category
//! listing, so one value can describe both what was fetched and how the
//! loaded snapshot is viewed.

use crate::catalog::{Category, CategoryId};
use crate::filter::{filter_tree, search_predicate, status_predicate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("unknown status filter '{0}' (expected all, active or inactive)")]
    UnknownStatus(String),
    #[error("unknown sort field '{0}' (expected sort_order, name, created_at, updated_at or products_count)")]
    UnknownSortField(String),
    #[error("unknown sort direction '{0}' (expected asc or desc)")]
    UnknownSortDirection(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    /// The `is_active` value to keep, or None for no status filtering
    pub fn requested(self) -> Option<bool> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Active => Some(true),
            StatusFilter::Inactive => Some(false),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "active" | "true" | "1" => Ok(StatusFilter::Active),
            "inactive" | "false" | "0" => Ok(StatusFilter::Inactive),
            other => Err(QueryError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    SortOrder,
    Name,
    CreatedAt,
    UpdatedAt,
    ProductsCount,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::SortOrder => "sort_order",
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::ProductsCount => "products_count",
        }
    }

    fn compare(&self, a: &Category, b: &Category) -> Ordering {
        match self {
            SortField::SortOrder => a.sort_order.cmp(&b.sort_order),
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::ProductsCount => a.products_count.cmp(&b.products_count),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Explicit ordering request. Without one, input order is kept everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDirective {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn compare(&self, a: &Category, b: &Category) -> Ordering {
        let ordering = self.field.compare(a, b);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// `field` or `field:asc|desc`, e.g. `name:desc`
impl FromStr for SortDirective {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(':') {
            Some((field, direction)) => (field, Some(direction)),
            None => (s, None),
        };

        let field = match field.trim().to_ascii_lowercase().as_str() {
            "sort_order" | "order" => SortField::SortOrder,
            "name" => SortField::Name,
            "created_at" => SortField::CreatedAt,
            "updated_at" => SortField::UpdatedAt,
            "products_count" => SortField::ProductsCount,
            other => return Err(QueryError::UnknownSortField(other.to_string())),
        };

        let direction = match direction.map(|d| d.trim().to_ascii_lowercase()) {
            None => SortDirection::Asc,
            Some(d) if d == "asc" => SortDirection::Asc,
            Some(d) if d == "desc" => SortDirection::Desc,
            Some(d) => return Err(QueryError::UnknownSortDirection(d)),
        };

        Ok(SortDirective { field, direction })
    }
}

impl fmt::Display for SortDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{}", self.field.as_str(), direction)
    }
}

/// Category listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryQuery {
    pub search: Option<String>,
    pub status: StatusFilter,
    pub parent_id: Option<CategoryId>,
    pub sort: Option<SortDirective>,
    pub page: usize,      // 1-based
    pub page_size: usize,
}

impl Default for CategoryQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: StatusFilter::All,
            parent_id: None,
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CategoryQuery {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// True when `node` passes the status and search parts of the query on its own
    pub fn matches(&self, node: &Category) -> bool {
        let status_ok = self
            .status
            .requested()
            .map_or(true, |active| status_predicate(active)(node));
        status_ok && self.search_term().map_or(true, |term| search_predicate(term)(node))
    }

    /// Tree view: status and search filters with ancestor context, then the sort directive
    pub fn apply_to_forest(&self, forest: &[Category]) -> Vec<Category> {
        let filtered = match (self.status.requested(), self.search_term()) {
            (None, None) => forest.to_vec(),
            (Some(active), None) => filter_tree(forest, &status_predicate(active)),
            (None, Some(term)) => filter_tree(forest, &search_predicate(term)),
            (Some(_), Some(_)) => filter_tree(forest, &|node: &Category| self.matches(node)),
        };
        match self.sort {
            Some(directive) => sort_forest(&filtered, directive),
            None => filtered,
        }
    }

    /// Table view: matching records in input order (or sorted), optionally restricted to one parent
    pub fn apply_to_records<'a>(&self, records: &'a [Category]) -> Vec<&'a Category> {
        let mut rows: Vec<&Category> = records
            .iter()
            .filter(|c| self.parent_id.map_or(true, |p| c.parent_id == Some(p)))
            .filter(|c| self.matches(c))
            .collect();
        if let Some(directive) = self.sort {
            rows.sort_by(|a, b| directive.compare(a, b));
        }
        rows
    }
}

/// Sort siblings at every level. Stable, so ties keep input order.
pub fn sort_forest(forest: &[Category], directive: SortDirective) -> Vec<Category> {
    let mut sorted: Vec<Category> = forest
        .iter()
        .map(|node| {
            let mut copy = node.detached();
            copy.children = sort_forest(&node.children, directive);
            copy
        })
        .collect();
    sorted.sort_by(|a, b| directive.compare(a, b));
    sorted
}

/// One page of a flat listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Slice `items` into the 1-based `page`. Page 0 is treated as page 1; a page
/// past the end is empty but still reports the totals.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let total_pages = total.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);

    Page {
        items: items[start..end].to_vec(),
        page,
        page_size,
        total,
        total_pages,
    }
}
