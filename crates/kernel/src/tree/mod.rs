//! Display tree assembly.
//!
//! Turns a flat list of fetched entries into a sorted forest of category
//! nodes. Pure and synchronous; nothing here touches the database.

pub mod assembler;
pub mod bucket;
pub mod linearize;
pub mod types;
pub mod virtual_category;

pub use assembler::{assemble, assemble_with, build_display_path, insert_entry, sort_forest};
pub use bucket::{DAY_BOUNDARY_OFFSET_HOURS, bucket_for};
pub use linearize::{
    CategoryLink, JoinedRow, LinearizedRow, MAX_CHAIN_DEPTH, linearize, linearize_all,
    linearize_with_index,
};
pub use types::{
    CategoryDescriptor, CategorySort, ChainTrim, DateBucket, DisplayConfig, EntrySort, NodeKey,
    TreeNode, VirtualCategory,
};
pub use virtual_category::{NoVirtualCategories, VirtualCategoryProvider};
