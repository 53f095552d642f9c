//! Tree assembler.
//!
//! Turns linearized rows into a sorted display forest in three passes:
//! 1. `build_display_path`: chain minus sentinel root, trimmed, prefixed
//!    with the date bucket and any virtual descriptors
//! 2. `insert_entry`: find-or-create nodes along the path, first-seen order,
//!    entry attached at the terminal node only
//! 3. `sort_forest`: recursive sibling and entry sort with id tie-breakers

use std::cmp::Ordering;

use tracing::debug;

use super::bucket::bucket_for;
use super::linearize::LinearizedRow;
use super::types::{
    CategoryDescriptor, CategorySort, DisplayConfig, EntrySort, TreeNode, VirtualCategory,
};
use super::virtual_category::{NoVirtualCategories, VirtualCategoryProvider};
use crate::models::Entry;

/// Assemble a sorted forest with the default (no-op) virtual provider.
pub fn assemble(rows: Vec<LinearizedRow>, config: &DisplayConfig) -> Vec<TreeNode> {
    assemble_with(rows, config, &NoVirtualCategories)
}

/// Assemble a sorted forest using `provider` for virtual categories.
pub fn assemble_with(
    rows: Vec<LinearizedRow>,
    config: &DisplayConfig,
    provider: &dyn VirtualCategoryProvider,
) -> Vec<TreeNode> {
    let row_count = rows.len();
    let mut forest = Vec::new();

    for row in rows {
        let path = build_display_path(&row, config, provider);
        insert_entry(&mut forest, &path, row.entry);
    }
    sort_forest(&mut forest, config);

    debug!(
        rows = row_count,
        roots = forest.len(),
        "assembled display forest"
    );
    forest
}

/// Display path for one row.
///
/// Order: date bucket, then virtual descriptors, then the trimmed real chain.
pub fn build_display_path(
    row: &LinearizedRow,
    config: &DisplayConfig,
    provider: &dyn VirtualCategoryProvider,
) -> Vec<CategoryDescriptor> {
    let chain = match row.chain.split_first() {
        Some((first, rest)) if first.is_sentinel() => rest,
        _ => row.chain.as_slice(),
    };

    let trim = config.chain_trim;
    let end = chain.len().saturating_sub(trim.drop_from_end);
    let start = trim.drop_from_start.min(end);
    let chain = &chain[start..end];

    let mut path = Vec::with_capacity(chain.len() + 1);
    let date = row.entry.effective_date(config.use_updated_date);
    if let Some(bucket) = bucket_for(date, config.date_bucket) {
        path.push(bucket);
    }
    if config.virtual_category != VirtualCategory::None {
        path.extend(provider.descriptors(&row.entry, &config.virtual_category));
    }
    path.extend_from_slice(chain);
    path
}

/// Insert an entry at the end of `path`, creating missing nodes.
///
/// New nodes are appended in first-seen order. An empty path files the
/// entry under the sentinel root node.
pub fn insert_entry(forest: &mut Vec<TreeNode>, path: &[CategoryDescriptor], entry: Entry) {
    let sentinel = [CategoryDescriptor::sentinel()];
    let path = if path.is_empty() { &sentinel[..] } else { path };

    let mut node = find_or_create(forest, &path[..1]);
    for depth in 2..=path.len() {
        node = find_or_create(&mut node.children, &path[..depth]);
    }
    node.entries.push(entry);
}

fn find_or_create<'a>(
    level: &'a mut Vec<TreeNode>,
    prefix: &[CategoryDescriptor],
) -> &'a mut TreeNode {
    let key = prefix.last().map(|d| &d.key);
    let position = level
        .iter()
        .position(|node| node.descriptor().map(|d| &d.key) == key);

    let index = match position {
        Some(index) => index,
        None => {
            level.push(TreeNode::new(prefix.to_vec()));
            level.len() - 1
        }
    };
    &mut level[index]
}

/// Sort siblings and entries at every level.
///
/// Every comparator ends with a key or id tie-breaker, so sorting an
/// already sorted forest changes nothing.
pub fn sort_forest(forest: &mut [TreeNode], config: &DisplayConfig) {
    forest.sort_by(|a, b| compare_nodes(a, b, config.category_sort));
    for node in forest.iter_mut() {
        sort_entries(&mut node.entries, config);
        sort_forest(&mut node.children, config);
    }
}

fn compare_nodes(a: &TreeNode, b: &TreeNode, sort: CategorySort) -> Ordering {
    let (Some(da), Some(db)) = (a.descriptor(), b.descriptor()) else {
        return a.category_path.len().cmp(&b.category_path.len());
    };

    let primary = match sort {
        CategorySort::NameAsc => compare_names(&da.name, &db.name),
        CategorySort::NameDesc => compare_names(&db.name, &da.name),
        CategorySort::Order => present_first(da.order, db.order)
            .then_with(|| compare_names(&da.name, &db.name)),
    };
    primary.then_with(|| da.key.cmp(&db.key))
}

fn sort_entries(entries: &mut [Entry], config: &DisplayConfig) {
    let use_updated = config.use_updated_date;
    match config.entry_sort {
        EntrySort::None => {}
        EntrySort::Date => entries.sort_by(|a, b| {
            b.effective_date(use_updated)
                .cmp(&a.effective_date(use_updated))
                .then_with(|| a.id.cmp(&b.id))
        }),
        EntrySort::Name => entries.sort_by(|a, b| {
            let names = match (&a.header, &b.header) {
                (Some(x), Some(y)) => compare_names(x, y),
                (x, y) => x.is_none().cmp(&y.is_none()),
            };
            names.then_with(|| a.id.cmp(&b.id))
        }),
        EntrySort::Order => entries.sort_by(|a, b| {
            present_first(a.sort_order, b.sort_order).then_with(|| a.id.cmp(&b.id))
        }),
    }
}

/// Case-insensitive comparison, falling back to exact comparison.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Orders present values ascending, missing values last.
fn present_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
