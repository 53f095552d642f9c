//! In-memory category index.
//!
//! Built once from the full flat category set. Answers ancestor, descendant
//! and path-walk queries without I/O. The index is a snapshot: whoever caches
//! it must rebuild it after any category row changes.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::models::{CategoryRow, DEFAULT_CATEGORY_ID};
use crate::tree::{CategoryDescriptor, CategoryLink};

/// Index over all category rows.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    rows: HashMap<i64, CategoryRow>,
    /// Parent id -> child ids, in input order.
    children: HashMap<i64, Vec<i64>>,
    /// Rows without a (known) parent, in input order.
    roots: Vec<i64>,
}

impl CategoryIndex {
    /// Build the index from every category row.
    ///
    /// A row whose parent is unknown is treated as a root.
    pub fn new(rows: impl IntoIterator<Item = CategoryRow>) -> Self {
        let rows: Vec<CategoryRow> = rows.into_iter().collect();
        let known: HashSet<i64> = rows.iter().map(|r| r.id).collect();

        let mut index = Self::default();
        for row in rows {
            match row.parent_id {
                Some(parent) if parent != row.id && known.contains(&parent) => {
                    index.children.entry(parent).or_default().push(row.id);
                }
                Some(parent) => {
                    warn!(
                        category = row.id,
                        parent, "category parent is missing; treating as root"
                    );
                    index.roots.push(row.id);
                }
                None => index.roots.push(row.id),
            }
            index.rows.insert(row.id, row);
        }

        debug!(
            categories = index.rows.len(),
            roots = index.roots.len(),
            "built category index"
        );
        index
    }

    /// Get a category row by ID.
    pub fn get(&self, id: i64) -> Option<&CategoryRow> {
        self.rows.get(&id)
    }

    /// Descriptor for a category.
    pub fn descriptor(&self, id: i64) -> Option<CategoryDescriptor> {
        self.get(id)
            .map(|row| CategoryDescriptor::category(row.id, row.name.clone(), row.sort_order))
    }

    /// Root category rows.
    pub fn roots(&self) -> Vec<&CategoryRow> {
        self.roots
            .iter()
            .filter_map(|id| self.rows.get(id))
            .collect()
    }

    /// Direct children of a category.
    pub fn children(&self, id: i64) -> Vec<&CategoryRow> {
        self.child_ids(id)
            .iter()
            .filter_map(|child| self.rows.get(child))
            .collect()
    }

    fn child_ids(&self, id: i64) -> &[i64] {
        self.children
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of indexed categories.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the index holds no categories.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a name path against the forest.
    ///
    /// Returns the longest prefix of `names` that matches an actual parent
    /// chain, stopping at the first name that does not match. Top-level
    /// names are looked up among the roots and among the sentinel root's
    /// children; the sentinel itself never appears in the result. Compare the
    /// returned length with `names.len()` to detect a partial match.
    pub fn resolve_path<S: AsRef<str>>(&self, names: &[S]) -> Vec<CategoryDescriptor> {
        let mut level: Vec<i64> = self
            .roots
            .iter()
            .copied()
            .filter(|id| *id != DEFAULT_CATEGORY_ID)
            .chain(self.child_ids(DEFAULT_CATEGORY_ID).iter().copied())
            .collect();

        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let found = level
                .iter()
                .copied()
                .find(|id| self.rows.get(id).is_some_and(|row| row.name == name));
            let Some(id) = found else {
                break;
            };
            if let Some(descriptor) = self.descriptor(id) {
                resolved.push(descriptor);
            }
            level = self.child_ids(id).to_vec();
        }
        resolved
    }

    /// Ancestor chain of a category, root first, ending with the category
    /// itself. Empty for an unknown id.
    pub fn ancestor_chain(&self, id: i64) -> Vec<CategoryDescriptor> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(cid) = current {
            if !seen.insert(cid) {
                warn!(category = id, at = cid, "category parent cycle detected");
                break;
            }
            let Some(row) = self.rows.get(&cid) else {
                break;
            };
            chain.push(CategoryDescriptor::category(
                row.id,
                row.name.clone(),
                row.sort_order,
            ));
            current = row.parent_id;
        }

        chain.reverse();
        chain
    }

    /// Ids of a category and all of its descendants, breadth first.
    ///
    /// Query compilation does not use this; `rec` filters expand the subtree
    /// inside the store so they always see the live tree.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        if !self.rows.contains_key(&id) {
            return Vec::new();
        }

        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(cid) = queue.pop_front() {
            if !seen.insert(cid) {
                continue;
            }
            ids.push(cid);
            queue.extend(self.child_ids(cid).iter().copied());
        }
        ids
    }

    /// Human-readable path like `Work/Projects`, without the sentinel root.
    pub fn path_string(&self, id: i64, separator: &str) -> String {
        self.ancestor_chain(id)
            .into_iter()
            .filter(|d| !d.is_sentinel())
            .map(|d| d.name)
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Nested parent-link form of a category, as storage joins return it.
    pub fn link(&self, id: i64) -> Option<CategoryLink> {
        self.ancestor_chain(id)
            .into_iter()
            .fold(None, |parent, descriptor| {
                descriptor.category_id().map(|cid| CategoryLink {
                    id: cid,
                    name: descriptor.name,
                    sort_order: descriptor.order,
                    parent: parent.map(Box::new),
                })
            })
    }
}
