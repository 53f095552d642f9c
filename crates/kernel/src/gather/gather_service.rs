//! Gather service for executing filters against PostgreSQL.
//!
//! Provides high-level retrieval with:
//! - Filter compilation and typed parameter binding
//! - Tag attachment for result rows
//! - Cached category index for ancestor chains
//! - Tree assembly for display

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use sqlx::PgPool;
use tracing::{debug, info};

use super::category_index::CategoryIndex;
use super::query_builder::{compile, compile_count};
use super::types::{Dialect, Filter};
use crate::bind_params;
use crate::models::{CategoryRow, CreateCategory, Entry, TagRow};
use crate::tree::{
    DisplayConfig, JoinedRow, LinearizedRow, NoVirtualCategories, TreeNode,
    VirtualCategoryProvider, assemble_with, linearize,
};

/// Service for executing gather filters.
pub struct GatherService {
    pool: PgPool,
    /// Loaded on first use; cleared by `invalidate_categories`.
    index: RwLock<Option<Arc<CategoryIndex>>>,
    provider: Arc<dyn VirtualCategoryProvider>,
}

impl GatherService {
    /// Create a new GatherService.
    pub fn new(pool: PgPool) -> Arc<Self> {
        Self::with_provider(pool, Arc::new(NoVirtualCategories))
    }

    /// Create a GatherService that resolves virtual categories with `provider`.
    pub fn with_provider(pool: PgPool, provider: Arc<dyn VirtualCategoryProvider>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            index: RwLock::new(None),
            provider,
        })
    }

    /// The category index, loading it from storage if it is not cached.
    pub async fn category_index(&self) -> Result<Arc<CategoryIndex>> {
        let cached = self.index.read().clone();
        if let Some(index) = cached {
            return Ok(index);
        }

        let rows = CategoryRow::list(&self.pool).await?;
        let index = Arc::new(CategoryIndex::new(rows));
        *self.index.write() = Some(Arc::clone(&index));

        info!(categories = index.len(), "loaded category index");
        Ok(index)
    }

    /// Drop the cached category index. Call after any category row changes.
    pub fn invalidate_categories(&self) {
        *self.index.write() = None;
        debug!("category index invalidated");
    }

    /// Create a category and drop the cached index.
    pub async fn create_category(&self, input: CreateCategory) -> Result<CategoryRow> {
        let row = CategoryRow::create(&self.pool, input).await?;
        self.invalidate_categories();
        Ok(row)
    }

    /// Rename a category and drop the cached index.
    pub async fn rename_category(&self, id: i64, name: &str) -> Result<Option<CategoryRow>> {
        let row = CategoryRow::rename(&self.pool, id, name).await?;
        if row.is_some() {
            self.invalidate_categories();
        }
        Ok(row)
    }

    /// Delete a childless, unused category. Returns `false` if it was kept.
    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        let deleted = CategoryRow::delete_unused(&self.pool, id).await?;
        if deleted {
            self.invalidate_categories();
        }
        Ok(deleted)
    }

    /// Resolve tag names to ids for building a tag filter. Unknown names are
    /// skipped.
    pub async fn tag_ids(&self, names: &[String]) -> Result<Vec<i64>> {
        let tags = TagRow::find_by_names(&self.pool, names).await?;
        Ok(tags.into_iter().map(|t| t.id).collect())
    }

    /// Run `filter` and return the matching rows with tags and chains.
    pub async fn fetch(&self, filter: &Filter) -> Result<Vec<LinearizedRow>> {
        let compiled = compile(filter, Dialect::Postgres).context("failed to compile filter")?;

        let query = bind_params!(sqlx::query_as::<_, Entry>(&compiled.sql), &compiled.params);
        let mut entries = query
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch entries")?;

        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        let tags = TagRow::for_entries(&self.pool, &ids).await?;
        attach_tags(&mut entries, tags);

        let index = self.category_index().await?;
        let rows = entries
            .into_iter()
            .map(|entry| {
                let category = entry.category_id.and_then(|id| index.link(id));
                linearize(JoinedRow { entry, category })
            })
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), "fetched entries");
        Ok(rows)
    }

    /// Total number of entries matching `filter`, ignoring its pager.
    pub async fn count(&self, filter: &Filter) -> Result<i64> {
        let compiled =
            compile_count(filter, Dialect::Postgres).context("failed to compile count")?;

        let query = bind_params!(
            sqlx::query_scalar::<_, i64>(&compiled.sql),
            &compiled.params
        );
        let total = query
            .fetch_one(&self.pool)
            .await
            .context("failed to count entries")?;

        Ok(total)
    }

    /// Run `filter` and assemble the results into a display forest.
    pub async fn gather(&self, filter: &Filter, display: &DisplayConfig) -> Result<Vec<TreeNode>> {
        let rows = self.fetch(filter).await?;
        Ok(assemble_with(rows, display, self.provider.as_ref()))
    }
}

/// Attach `(entry_id, tag)` pairs to their entries, preserving pair order.
fn attach_tags(entries: &mut [Entry], tags: Vec<(i64, TagRow)>) {
    let mut by_entry: HashMap<i64, Vec<TagRow>> = HashMap::new();
    for (entry_id, tag) in tags {
        by_entry.entry(entry_id).or_default().push(tag);
    }
    for entry in entries {
        if let Some(tags) = by_entry.remove(&entry.id) {
            entry.tags = tags;
        }
    }
}
