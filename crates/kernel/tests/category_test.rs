#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Category index integration tests.

use sheaf_kernel::gather::CategoryIndex;
use sheaf_kernel::models::{CategoryRow, DEFAULT_CATEGORY_ID};
use sheaf_kernel::tree::{JoinedRow, linearize, linearize_with_index};
use sheaf_test_utils::{category, standard_fixture};

fn index() -> CategoryIndex {
    CategoryIndex::new(standard_fixture().categories)
}

#[test]
fn resolve_path_walks_from_roots() {
    let idx = index();

    let full = idx.resolve_path(&["Work", "Projects", "Sheaf", "Deep"]);
    assert_eq!(full.len(), 4);
    assert_eq!(full[3].category_id(), Some(5));

    let partial = idx.resolve_path(&["Work", "Projects", "Missing", "Deep"]);
    let names: Vec<_> = partial.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Work", "Projects"]);

    // Names must follow a real parent chain.
    assert!(idx.resolve_path(&["Projects"]).is_empty());
    assert_eq!(idx.resolve_path(&["Work", "Home"]).len(), 1);
}

#[test]
fn resolve_path_is_case_sensitive() {
    assert!(index().resolve_path(&["work"]).is_empty());
}

#[test]
fn subtree_covers_all_descendants() {
    let idx = index();
    let mut ids = idx.subtree_ids(DEFAULT_CATEGORY_ID);
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(idx.subtree_ids(10), vec![10]);
}

#[test]
fn every_chain_ends_at_its_category() {
    let idx = index();
    for row in standard_fixture().categories {
        let chain = idx.ancestor_chain(row.id);
        assert_eq!(chain.last().unwrap().category_id(), Some(row.id));
        let root = chain.first().unwrap().category_id().unwrap();
        assert!(idx.get(root).unwrap().parent_id.is_none());
    }
}

#[test]
fn linearized_forms_agree_for_every_entry() {
    let fixture = standard_fixture();
    let idx = CategoryIndex::new(fixture.categories.clone());

    for entry in fixture.kernel_entries() {
        let joined = JoinedRow {
            category: entry.category_id.and_then(|id| idx.link(id)),
            entry: entry.clone(),
        };
        assert_eq!(linearize(joined), linearize_with_index(entry, &idx));
    }
}

#[test]
fn path_strings() {
    let idx = index();
    assert_eq!(idx.path_string(5, " > "), "Work > Projects > Sheaf > Deep");
    assert_eq!(idx.path_string(DEFAULT_CATEGORY_ID, "/"), "");
    assert_eq!(idx.path_string(99, "/"), "");
}

#[test]
fn sibling_order_comes_from_sort_order() {
    let rows: Vec<CategoryRow> = vec![
        CategoryRow {
            sort_order: Some(2),
            ..category(1, None, "first")
        },
        CategoryRow {
            sort_order: Some(1),
            ..category(2, None, "second")
        },
    ];
    let idx = CategoryIndex::new(rows);
    assert_eq!(idx.descriptor(1).unwrap().order, Some(2));
    assert_eq!(idx.descriptor(2).unwrap().order, Some(1));
    assert_eq!(idx.roots().len(), 2);
}
