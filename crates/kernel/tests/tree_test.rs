#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Display tree integration tests.
//!
//! Rows come from the standard fixture, linearized through a category index
//! the same way the gather service and CLI do it.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use sheaf_kernel::gather::CategoryIndex;
use sheaf_kernel::models::Entry;
use sheaf_kernel::tree::{
    CategoryDescriptor, CategorySort, ChainTrim, DateBucket, DisplayConfig, EntrySort,
    LinearizedRow, NodeKey, TreeNode, VirtualCategory, assemble, assemble_with,
    linearize_with_index, sort_forest,
};
use sheaf_test_utils::{Fixture, category, standard_fixture, test_entry};

fn rows(fixture: &Fixture) -> Vec<LinearizedRow> {
    let index = CategoryIndex::new(fixture.categories.clone());
    fixture
        .kernel_entries()
        .into_iter()
        .map(|entry| linearize_with_index(entry, &index))
        .collect()
}

/// Entry id -> number of times it appears anywhere in the forest.
fn placements(forest: &[TreeNode]) -> HashMap<i64, usize> {
    fn walk(nodes: &[TreeNode], seen: &mut HashMap<i64, usize>) {
        for node in nodes {
            for entry in &node.entries {
                *seen.entry(entry.id).or_default() += 1;
            }
            walk(&node.children, seen);
        }
    }
    let mut seen = HashMap::new();
    walk(forest, &mut seen);
    seen
}

fn names(nodes: &[TreeNode]) -> Vec<&str> {
    nodes.iter().map(TreeNode::name).collect()
}

fn find<'a>(nodes: &'a [TreeNode], name: &str) -> &'a TreeNode {
    nodes.iter().find(|n| n.name() == name).unwrap()
}

// -------------------------------------------------------------------------
// Structural properties
// -------------------------------------------------------------------------

#[test]
fn every_entry_appears_exactly_once() {
    let fixture = standard_fixture();
    let configs = [
        DisplayConfig::default(),
        DisplayConfig {
            date_bucket: DateBucket::Week,
            ..Default::default()
        },
        DisplayConfig {
            chain_trim: ChainTrim {
                drop_from_start: 1,
                drop_from_end: 1,
            },
            ..Default::default()
        },
    ];

    for config in &configs {
        let forest = assemble(rows(&fixture), config);
        let total: usize = forest.iter().map(TreeNode::entry_count).sum();
        assert_eq!(total, fixture.entries.len());
        let seen = placements(&forest);
        assert_eq!(seen.len(), fixture.entries.len());
        assert!(seen.values().all(|n| *n == 1));
    }
}

#[test]
fn sorting_is_idempotent() {
    let config = DisplayConfig {
        date_bucket: DateBucket::Day,
        category_sort: CategorySort::NameDesc,
        entry_sort: EntrySort::Name,
        ..Default::default()
    };
    let forest = assemble(rows(&standard_fixture()), &config);
    let mut again = forest.clone();
    sort_forest(&mut again, &config);
    assert_eq!(forest, again);
}

#[test]
fn standard_fixture_roots() {
    let forest = assemble(rows(&standard_fixture()), &DisplayConfig::default());
    assert_eq!(names(&forest), vec!["Archive", "default", "Home", "Work"]);

    // Uncategorized entries and entries filed directly under the sentinel
    // root share the sentinel node.
    let sentinel = find(&forest, "default");
    let mut ids: Vec<_> = sentinel.entries.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![7, 9]);
    assert!(sentinel.children.is_empty());

    let work = find(&forest, "Work");
    assert_eq!(names(&work.children), vec!["Meetings", "Projects"]);
    let projects = find(&work.children, "Projects");
    let deep = find(&find(&projects.children, "Sheaf").children, "Deep");
    assert_eq!(deep.depth, 3);
    assert_eq!(deep.entries[0].id, 4);
    let path: Vec<_> = deep.category_path.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(path, vec!["Work", "Projects", "Sheaf", "Deep"]);
}

#[test]
fn entries_attach_at_their_own_depth() {
    let fixture = Fixture {
        categories: vec![
            category(0, None, "default"),
            category(1, Some(0), "A"),
            category(2, Some(1), "B"),
            category(3, Some(1), "C"),
        ],
        tags: vec![],
        entries: vec![
            test_entry(1, "in A").in_category(1),
            test_entry(2, "in B").in_category(2),
            test_entry(3, "in C").in_category(3),
        ],
    };
    let forest = assemble(rows(&fixture), &DisplayConfig::default());

    assert_eq!(forest.len(), 1);
    let a = &forest[0];
    assert_eq!(a.name(), "A");
    assert_eq!(a.entries.len(), 1);
    assert_eq!(a.entries[0].id, 1);
    assert_eq!(names(&a.children), vec!["B", "C"]);
    assert_eq!(a.children[0].entries[0].id, 2);
    assert_eq!(a.children[1].entries[0].id, 3);
}

#[test]
fn chain_trim_lifts_subtrees() {
    let config = DisplayConfig {
        chain_trim: ChainTrim {
            drop_from_start: 1,
            drop_from_end: 0,
        },
        ..Default::default()
    };
    let forest = assemble(rows(&standard_fixture()), &config);
    // Work and Home collapse into the sentinel; their children become roots.
    assert_eq!(names(&forest), vec!["default", "Meetings", "Projects"]);
    let sentinel = find(&forest, "default");
    let mut ids: Vec<_> = sentinel.entries.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 6, 7, 8, 9, 10]);
}

// -------------------------------------------------------------------------
// Date buckets
// -------------------------------------------------------------------------

#[test]
fn day_boundary_groups_late_night_with_previous_day() {
    let fixture = Fixture {
        categories: vec![],
        tags: vec![],
        entries: vec![
            test_entry(1, "after midnight")
                .created(Utc.with_ymd_and_hms(2023, 2, 3, 1, 30, 0).unwrap()),
            test_entry(2, "before midnight")
                .created(Utc.with_ymd_and_hms(2023, 2, 2, 23, 0, 0).unwrap()),
            test_entry(3, "next morning")
                .created(Utc.with_ymd_and_hms(2023, 2, 3, 9, 0, 0).unwrap()),
        ],
    };
    let config = DisplayConfig {
        date_bucket: DateBucket::Day,
        entry_sort: EntrySort::Date,
        ..Default::default()
    };
    let forest = assemble(rows(&fixture), &config);

    assert_eq!(names(&forest), vec!["2023-02-02", "2023-02-03"]);
    let first = &forest[0];
    // An empty category chain leaves the bucket as the terminal node.
    assert!(first.children.is_empty());
    let ids: Vec<_> = first.entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(
        first.descriptor().unwrap().key,
        NodeKey::Bucket(Utc.with_ymd_and_hms(2023, 2, 2, 5, 0, 0).unwrap().timestamp_millis())
    );
}

#[test]
fn buckets_prefix_category_chains() {
    let config = DisplayConfig {
        date_bucket: DateBucket::Month,
        ..Default::default()
    };
    let forest = assemble(rows(&standard_fixture()), &config);
    // Every fixture entry was created in January 2023.
    assert_eq!(names(&forest), vec!["2023-01"]);
    assert_eq!(names(&forest[0].children), vec!["Archive", "Home", "Work"]);
    assert_eq!(forest[0].children[0].depth, 1);
    // Uncategorized entries stop at the bucket itself.
    let mut ids: Vec<_> = forest[0].entries.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![7, 9]);
}

#[test]
fn updated_date_drives_buckets_when_asked() {
    let config = DisplayConfig {
        date_bucket: DateBucket::Month,
        use_updated_date: true,
        ..Default::default()
    };
    let mut fixture = standard_fixture();
    fixture.entries[9].updated_at = Some(Utc.with_ymd_and_hms(2023, 3, 15, 12, 0, 0).unwrap());
    let forest = assemble(rows(&fixture), &config);
    assert_eq!(names(&forest), vec!["2023-01", "2023-03"]);
    assert_eq!(forest[1].entry_count(), 1);
}

// -------------------------------------------------------------------------
// Virtual categories
// -------------------------------------------------------------------------

#[test]
fn virtual_provider_inserts_after_bucket() {
    let provider = |entry: &Entry, rule: &VirtualCategory| -> Vec<CategoryDescriptor> {
        match rule {
            VirtualCategory::Tag { tags } => entry
                .tags
                .iter()
                .filter(|t| tags.contains(&t.name))
                .take(1)
                .map(|t| CategoryDescriptor::virtual_node(format!("tag:{}", t.name), &t.name))
                .collect(),
            VirtualCategory::None => Vec::new(),
        }
    };
    let config = DisplayConfig {
        virtual_category: VirtualCategory::Tag {
            tags: vec!["docs".to_string()],
        },
        ..Default::default()
    };
    let forest = assemble_with(rows(&standard_fixture()), &config, &provider);

    let docs = find(&forest, "docs");
    assert_eq!(docs.entry_count(), 3);
    let total: usize = forest.iter().map(TreeNode::entry_count).sum();
    assert_eq!(total, 10);
}

#[test]
fn forest_serializes_to_json() {
    let forest = assemble(rows(&standard_fixture()), &DisplayConfig::default());
    let json = serde_json::to_value(&forest).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 4);
    assert_eq!(json[0]["category_path"][0]["name"], "Archive");
    assert_eq!(json[0]["category_path"][0]["key"]["category"], 10);
}
