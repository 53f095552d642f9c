//! Database models.

pub mod category;
pub mod entry;

pub use category::{CategoryRow, CreateCategory, DEFAULT_CATEGORY_ID, TagRow};
pub use entry::Entry;
