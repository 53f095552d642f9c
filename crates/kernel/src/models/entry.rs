//! Entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::TagRow;

/// A stored entry as the kernel reads it.
///
/// `body` is only selected in full column mode; preview rows leave it `None`.
/// `tags` is attached after the main query runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,

    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    #[sqlx(default)]
    pub body: Option<String>,

    pub created_at: DateTime<Utc>,

    /// `None` means the entry was never updated.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub archived: bool,

    /// `None` places the entry in the sentinel root.
    #[serde(default)]
    pub category_id: Option<i64>,

    /// Explicit position among sibling entries, used by the `order` sort.
    #[serde(default)]
    pub sort_order: Option<i64>,

    #[serde(default)]
    #[sqlx(skip)]
    pub tags: Vec<TagRow>,
}

impl Entry {
    /// Date used for bucketing and date sorting.
    ///
    /// With `use_updated` the update time wins when present; otherwise the
    /// creation time is used.
    pub fn effective_date(&self, use_updated: bool) -> DateTime<Utc> {
        if use_updated {
            self.updated_at.unwrap_or(self.created_at)
        } else {
            self.created_at
        }
    }
}
