//! Category and tag models.
//!
//! Categories form a forest through `parent_id`; the sentinel "default" root
//! has id [`DEFAULT_CATEGORY_ID`] and no parent. Tags are flat and attach to
//! entries through the `entry_tag` join table.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Id of the sentinel root category. Entries without a category belong here.
pub const DEFAULT_CATEGORY_ID: i64 = 0;

/// A category row with its parent link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,

    /// Parent category (NULL for roots).
    #[serde(default)]
    pub parent_id: Option<i64>,

    pub name: String,

    /// Explicit position among siblings, used by the `order` sort.
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// A tag row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub parent_id: Option<i64>,
    pub name: String,
    pub sort_order: Option<i64>,
}

impl CategoryRow {
    /// List every category. The Category Index is built from this set.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let categories = sqlx::query_as::<_, Self>(
            "SELECT id, parent_id, name, sort_order FROM category ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .context("failed to list categories")?;

        Ok(categories)
    }

    /// Create a new category under `parent_id`.
    pub async fn create(pool: &PgPool, input: CreateCategory) -> Result<Self> {
        let category = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO category (parent_id, name, sort_order)
            VALUES ($1, $2, $3)
            RETURNING id, parent_id, name, sort_order
            "#,
        )
        .bind(input.parent_id)
        .bind(&input.name)
        .bind(input.sort_order)
        .fetch_one(pool)
        .await
        .context("failed to create category")?;

        Ok(category)
    }

    /// Rename a category. Renaming is the only mutation categories support.
    pub async fn rename(pool: &PgPool, id: i64, name: &str) -> Result<Option<Self>> {
        let category = sqlx::query_as::<_, Self>(
            "UPDATE category SET name = $1 WHERE id = $2 RETURNING id, parent_id, name, sort_order",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to rename category")?;

        Ok(category)
    }

    /// Delete a category that has no children and no entries.
    ///
    /// Returns `false` when the category is missing or still in use.
    pub async fn delete_unused(pool: &PgPool, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM category
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM category c WHERE c.parent_id = $1)
              AND NOT EXISTS (SELECT 1 FROM entry e WHERE e.category_id = $1)
            "#,
        )
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete category")?;

        Ok(result.rows_affected() > 0)
    }
}

impl TagRow {
    /// List all tags ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>("SELECT id, name FROM tag ORDER BY name")
            .fetch_all(pool)
            .await
            .context("failed to list tags")?;

        Ok(tags)
    }

    /// Find tags by exact name. Callers use this to turn names into the ids
    /// a tag filter takes.
    pub async fn find_by_names(pool: &PgPool, names: &[String]) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Self>("SELECT id, name FROM tag WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(pool)
            .await
            .context("failed to find tags by name")?;

        Ok(tags)
    }

    /// Load the tags attached to each of `entry_ids`, as `(entry_id, tag)` pairs.
    pub async fn for_entries(pool: &PgPool, entry_ids: &[i64]) -> Result<Vec<(i64, Self)>> {
        #[derive(sqlx::FromRow)]
        struct EntryTagRow {
            entry_id: i64,
            id: i64,
            name: String,
        }

        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, EntryTagRow>(
            r#"
            SELECT et.entry_id, t.id, t.name
            FROM entry_tag et
            INNER JOIN tag t ON t.id = et.tag_id
            WHERE et.entry_id = ANY($1)
            ORDER BY et.entry_id, t.name
            "#,
        )
        .bind(entry_ids)
        .fetch_all(pool)
        .await
        .context("failed to load entry tags")?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.entry_id,
                    TagRow {
                        id: r.id,
                        name: r.name,
                    },
                )
            })
            .collect())
    }
}
