//! Gather query engine module.
//!
//! This module provides:
//! - CategoryIndex: In-memory category forest lookups
//! - Query compiler: `Filter` to parameterized SQL via SeaQuery
//! - GatherService: Executes compiled filters against PostgreSQL
//! - Types: Filter, CatQuery, Pager, CompiledQuery, etc.

mod category_index;
mod gather_service;
mod query_builder;
pub mod types;

pub use category_index::CategoryIndex;
pub use gather_service::GatherService;
pub use query_builder::{compile, compile_count};
pub use types::{
    CatQuery, ColumnMode, CompiledQuery, DateRange, Dialect, Filter, Pager, QueryValue,
    SearchQuery, TagQuery, UpdatedQuery,
};
