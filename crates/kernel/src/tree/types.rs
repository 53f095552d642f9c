//! Display tree types.
//!
//! Provides type definitions for tree assembly:
//! - CategoryDescriptor: One level of a display path (real or virtual)
//! - DisplayConfig: Bucketing, sorting and trimming options
//! - TreeNode: A node of the assembled forest

use serde::{Deserialize, Serialize};

use crate::models::{DEFAULT_CATEGORY_ID, Entry};

/// Stable identity of a tree node.
///
/// Real categories and date buckets live in separate key spaces, so a
/// category id never collides with a bucket's start timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKey {
    /// A stored category, by id.
    Category(i64),
    /// A date bucket, by the epoch-millisecond start of the bucket.
    Bucket(i64),
    /// A provider-defined virtual node.
    Virtual(String),
}

/// One level of a display path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub key: NodeKey,
    pub name: String,
    /// Explicit sibling position for the `order` category sort.
    #[serde(default)]
    pub order: Option<i64>,
}

impl CategoryDescriptor {
    /// Descriptor for a stored category.
    pub fn category(id: i64, name: impl Into<String>, order: Option<i64>) -> Self {
        Self {
            key: NodeKey::Category(id),
            name: name.into(),
            order,
        }
    }

    /// Descriptor for a date bucket starting at `start_ms`.
    pub fn bucket(start_ms: i64, name: impl Into<String>) -> Self {
        Self {
            key: NodeKey::Bucket(start_ms),
            name: name.into(),
            order: Some(start_ms),
        }
    }

    /// Descriptor for a provider-defined virtual node.
    pub fn virtual_node(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: NodeKey::Virtual(key.into()),
            name: name.into(),
            order: None,
        }
    }

    /// Descriptor for the sentinel root, used for entries whose display path
    /// is empty.
    pub fn sentinel() -> Self {
        Self::category(DEFAULT_CATEGORY_ID, "default", None)
    }

    /// Whether this descriptor is the sentinel root category.
    pub fn is_sentinel(&self) -> bool {
        self.key == NodeKey::Category(DEFAULT_CATEGORY_ID)
    }

    /// Category id, if this descriptor is a stored category.
    pub fn category_id(&self) -> Option<i64> {
        match self.key {
            NodeKey::Category(id) => Some(id),
            _ => None,
        }
    }
}

/// Date bucketing mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateBucket {
    #[default]
    None,
    Day,
    Week,
    Month,
}

/// Rule for virtual categories inserted after the date bucket.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VirtualCategory {
    #[default]
    None,
    /// Derive nodes from the named tags.
    Tag { tags: Vec<String> },
}

/// Sibling category ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CategorySort {
    #[default]
    NameAsc,
    NameDesc,
    Order,
}

/// Ordering of a node's own entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntrySort {
    /// Keep insertion order.
    #[default]
    None,
    /// Most recent effective date first.
    Date,
    Name,
    Order,
}

/// Levels removed from a category chain before grouping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChainTrim {
    #[serde(default)]
    pub drop_from_start: usize,
    #[serde(default)]
    pub drop_from_end: usize,
}

/// Display configuration for tree assembly.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    #[serde(default)]
    pub date_bucket: DateBucket,

    #[serde(default)]
    pub virtual_category: VirtualCategory,

    #[serde(default)]
    pub category_sort: CategorySort,

    #[serde(default)]
    pub entry_sort: EntrySort,

    #[serde(default)]
    pub chain_trim: ChainTrim,

    /// Use the update time (when present) instead of the creation time for
    /// bucketing and date sorting.
    #[serde(default)]
    pub use_updated_date: bool,
}

/// A node of the display forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Full path from the forest root to this node, inclusive.
    pub category_path: Vec<CategoryDescriptor>,

    /// Entries whose display path ends at this node.
    pub entries: Vec<Entry>,

    pub children: Vec<TreeNode>,

    /// Zero for forest roots.
    pub depth: usize,
}

impl TreeNode {
    pub(crate) fn new(category_path: Vec<CategoryDescriptor>) -> Self {
        let depth = category_path.len().saturating_sub(1);
        Self {
            category_path,
            entries: Vec::new(),
            children: Vec::new(),
            depth,
        }
    }

    /// The descriptor this node stands for.
    pub fn descriptor(&self) -> Option<&CategoryDescriptor> {
        self.category_path.last()
    }

    /// Display name of this node.
    pub fn name(&self) -> &str {
        self.descriptor().map(|d| d.name.as_str()).unwrap_or_default()
    }

    /// Number of entries in this node and all of its descendants.
    pub fn entry_count(&self) -> usize {
        self.entries.len() + self.children.iter().map(TreeNode::entry_count).sum::<usize>()
    }
}
