//! Virtual category providers.
//!
//! A provider turns an entry into zero or more synthetic descriptors that
//! are placed after the date bucket and before the entry's real categories.

use super::types::{CategoryDescriptor, VirtualCategory};
use crate::models::Entry;

/// Source of virtual descriptors for the display path.
pub trait VirtualCategoryProvider: Send + Sync {
    /// Descriptors to insert for `entry` under `rule`, outermost first.
    fn descriptors(&self, entry: &Entry, rule: &VirtualCategory) -> Vec<CategoryDescriptor>;
}

/// Default provider: never inserts anything, whatever the rule says.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVirtualCategories;

impl VirtualCategoryProvider for NoVirtualCategories {
    fn descriptors(&self, _entry: &Entry, _rule: &VirtualCategory) -> Vec<CategoryDescriptor> {
        Vec::new()
    }
}

impl<F> VirtualCategoryProvider for F
where
    F: Fn(&Entry, &VirtualCategory) -> Vec<CategoryDescriptor> + Send + Sync,
{
    fn descriptors(&self, entry: &Entry, rule: &VirtualCategory) -> Vec<CategoryDescriptor> {
        self(entry, rule)
    }
}
