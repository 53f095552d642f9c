//! Row linearizer.
//!
//! Storage returns each entry with its category and a nested `parent` chain.
//! The assembler wants that chain as a flat, root-first descriptor list.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::CategoryDescriptor;
use crate::gather::CategoryIndex;
use crate::models::Entry;

/// Upper bound on walked chain length; only a cyclic chain can reach it.
pub const MAX_CHAIN_DEPTH: usize = 256;

/// A category with its parent link, as a storage join returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLink {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub parent: Option<Box<CategoryLink>>,
}

/// An entry joined with its category chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRow {
    pub entry: Entry,
    #[serde(default)]
    pub category: Option<CategoryLink>,
}

/// An entry with its flattened, root-first category chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearizedRow {
    pub entry: Entry,
    pub chain: Vec<CategoryDescriptor>,
}

/// Flatten a joined row's parent chain, root first.
///
/// Walks from the entry's own category outward until the parent link is
/// absent, so chains of any depth are supported. An entry without a category
/// yields an empty chain.
pub fn linearize(row: JoinedRow) -> LinearizedRow {
    let mut chain = Vec::new();
    let mut current = row.category.as_ref();

    while let Some(link) = current {
        if chain.len() == MAX_CHAIN_DEPTH {
            warn!(
                entry = row.entry.id,
                depth = MAX_CHAIN_DEPTH,
                "category chain exceeds maximum depth; truncating"
            );
            break;
        }
        chain.push(CategoryDescriptor::category(
            link.id,
            link.name.clone(),
            link.sort_order,
        ));
        current = link.parent.as_deref();
    }

    chain.reverse();
    LinearizedRow {
        entry: row.entry,
        chain,
    }
}

/// Linearize every row.
pub fn linearize_all(rows: impl IntoIterator<Item = JoinedRow>) -> Vec<LinearizedRow> {
    rows.into_iter().map(linearize).collect()
}

/// Build the chain from a category index instead of a nested join.
pub fn linearize_with_index(entry: Entry, index: &CategoryIndex) -> LinearizedRow {
    let chain = entry
        .category_id
        .map(|id| index.ancestor_chain(id))
        .unwrap_or_default();
    LinearizedRow { entry, chain }
}
