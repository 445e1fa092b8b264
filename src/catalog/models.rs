use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type CategoryId = i64;

// Canonical category shape consumed by the hierarchy builder.
// children is runtime-only: filled by hierarchy::build_tree, empty everywhere else.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,   // None = root (or unresolved, decided by the builder)
    pub image: Option<String>,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub products_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Category>,
}

impl Category {
    /// Copy of this node with an empty children list
    pub fn detached(&self) -> Category {
        Category {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            parent_id: self.parent_id,
            image: self.image.clone(),
            is_active: self.is_active,
            sort_order: self.sort_order,
            created_at: self.created_at,
            updated_at: self.updated_at,
            products_count: self.products_count,
            children: Vec::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Record as returned by the catalog service, before normalization.
///
/// Everything is optional and loosely typed: the admin API has been seen
/// sending ids as strings, `is_active` as 0/1 and timestamps as epoch
/// seconds. Unknown fields are ignored, and `children` is deliberately absent
/// so it can never be trusted from input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCategory {
    pub id: Option<Value>,
    pub name: Option<Value>,
    pub slug: Option<Value>,
    pub description: Option<Value>,
    pub parent_id: Option<Value>,
    pub image: Option<Value>,
    pub is_active: Option<Value>,
    pub sort_order: Option<Value>,
    pub created_at: Option<Value>,
    pub updated_at: Option<Value>,
    pub products_count: Option<Value>,
}

/// Paginated list envelope used by the catalog API.
///
/// Entries stay untyped here so one bad entry is rejected on its own
/// instead of failing the whole page.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordEnvelope {
    pub data: Vec<Value>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
}
