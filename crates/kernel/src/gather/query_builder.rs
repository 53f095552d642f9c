//! Gather query compiler using SeaQuery.
//!
//! Compiles a [`Filter`] into parameterized SQL with support for:
//! - Recursive category subtree matches (`WITH RECURSIVE` closure)
//! - Tag groups, AND within a group and OR across groups (`HAVING` counts)
//! - Archive, date and substring predicates
//! - Pagination with a fixed newest-first order
//!
//! Every value is emitted as a positional parameter.

use std::collections::BTreeSet;

use sea_query::{
    Alias, Asterisk, BinOper, CommonTableExpression, Cond, Expr, Func, Iden, Order,
    PostgresQueryBuilder, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder, UnionType,
    Value, Values, WithClause,
};
use tracing::debug;

use super::types::{
    CatQuery, ColumnMode, CompiledQuery, DateRange, Dialect, Filter, QueryValue, SearchQuery,
    TagQuery, UpdatedQuery,
};
use crate::error::Result;
use crate::models::DEFAULT_CATEGORY_ID;

#[derive(Iden, Clone, Copy)]
enum EntryIden {
    #[iden = "entry"]
    Table,
    Id,
    Header,
    Body,
    CreatedAt,
    UpdatedAt,
    Archived,
    CategoryId,
    SortOrder,
}

#[derive(Iden)]
enum CategoryIden {
    #[iden = "category"]
    Table,
    Id,
    ParentId,
}

#[derive(Iden)]
enum EntryTagIden {
    #[iden = "entry_tag"]
    Table,
    EntryId,
    TagId,
}

/// Name of the recursive closure over `rec` categories.
const CLOSURE_TABLE: &str = "category_closure";

/// Compile a filter into a paged entry query.
pub fn compile(filter: &Filter, dialect: Dialect) -> Result<CompiledQuery> {
    filter.validate()?;

    let (mut query, with) = filtered_select(filter);
    add_columns(&mut query, filter.mode);
    query
        .order_by((EntryIden::Table, EntryIden::CreatedAt), Order::Desc)
        .order_by((EntryIden::Table, EntryIden::Id), Order::Desc);

    if let Some(pager) = &filter.pager {
        let (limit, offset) = pager.limit_offset();
        if let Some(limit) = limit {
            query.limit(limit);
        }
        if let Some(offset) = offset {
            query.offset(offset);
        }
    }

    render(query, with, dialect)
}

/// Compile a filter into a `COUNT(*)` query with the same predicates.
///
/// Ordering and paging are ignored.
pub fn compile_count(filter: &Filter, dialect: Dialect) -> Result<CompiledQuery> {
    filter.validate()?;

    let (mut query, with) = filtered_select(filter);
    query.expr(Expr::col(Asterisk).count());

    render(query, with, dialect)
}

/// Base `SELECT ... FROM entry WHERE ...` with every predicate applied.
fn filtered_select(filter: &Filter) -> (SelectStatement, Option<WithClause>) {
    let mut query = Query::select();
    query.from(EntryIden::Table);

    let mut with = None;
    if let Some(categories) = &filter.categories {
        let (condition, closure) = category_condition(categories);
        query.and_where(condition);
        with = closure;
    }

    if let Some(tags) = &filter.tags {
        query.and_where(tag_condition(tags));
    }

    if let Some(archived) = filter.archived {
        query.and_where(Expr::col((EntryIden::Table, EntryIden::Archived)).eq(archived));
    }

    if let Some(range) = &filter.date_created {
        add_range(&mut query, EntryIden::CreatedAt, range);
    }

    match &filter.date_updated {
        Some(UpdatedQuery::Never) => {
            query.and_where(Expr::col((EntryIden::Table, EntryIden::UpdatedAt)).is_null());
        }
        Some(UpdatedQuery::Range(range)) => add_range(&mut query, EntryIden::UpdatedAt, range),
        None => {}
    }

    if let Some(search) = &filter.search {
        add_search(&mut query, search);
    }

    (query, with)
}

fn add_columns(query: &mut SelectStatement, mode: ColumnMode) {
    let mut columns = vec![
        EntryIden::Id,
        EntryIden::Header,
        EntryIden::CreatedAt,
        EntryIden::UpdatedAt,
        EntryIden::Archived,
        EntryIden::CategoryId,
        EntryIden::SortOrder,
    ];
    if mode == ColumnMode::Full {
        columns.push(EntryIden::Body);
    }
    query.columns(columns.into_iter().map(|c| (EntryIden::Table, c)));
}

/// Category membership condition and, for `rec` ids, the recursive closure
/// it reads from.
///
/// A NULL `category_id` is compared as the sentinel root, so `term: [0]`
/// and `rec: [0]` both match uncategorized entries.
fn category_condition(categories: &CatQuery) -> (SimpleExpr, Option<WithClause>) {
    if categories.is_empty() {
        return (Expr::cust("FALSE"), None);
    }

    let category = || {
        Expr::expr(Func::coalesce([
            SimpleExpr::from(Expr::col((EntryIden::Table, EntryIden::CategoryId))),
            SimpleExpr::from(Expr::val(DEFAULT_CATEGORY_ID)),
        ]))
    };

    let mut any = Cond::any();
    let mut with = None;

    if !categories.rec.is_empty() {
        let closure = Alias::new(CLOSURE_TABLE);
        any = any.add(
            category().in_subquery(
                Query::select()
                    .column((closure.clone(), Alias::new("id")))
                    .from(closure)
                    .to_owned(),
            ),
        );
        with = Some(closure_clause(&categories.rec));
    }

    if !categories.term.is_empty() {
        let term: BTreeSet<i64> = categories.term.iter().copied().collect();
        any = any.add(category().is_in(term));
    }

    (any.into(), with)
}

/// `WITH RECURSIVE category_closure(id)`: the `rec` ids plus every category
/// whose parent is already in the closure.
///
/// `UNION` (not `UNION ALL`) discards repeated rows, so a parent cycle in
/// stored data still terminates.
fn closure_clause(rec: &[i64]) -> WithClause {
    let closure = Alias::new(CLOSURE_TABLE);
    let rec: BTreeSet<i64> = rec.iter().copied().collect();

    let step = Query::select()
        .column((CategoryIden::Table, CategoryIden::Id))
        .from(CategoryIden::Table)
        .inner_join(
            closure.clone(),
            Expr::col((CategoryIden::Table, CategoryIden::ParentId))
                .equals((closure.clone(), Alias::new("id"))),
        )
        .to_owned();

    let seed = Query::select()
        .column((CategoryIden::Table, CategoryIden::Id))
        .from(CategoryIden::Table)
        .and_where(Expr::col((CategoryIden::Table, CategoryIden::Id)).is_in(rec))
        .union(UnionType::Distinct, step)
        .to_owned();

    let cte = CommonTableExpression::new()
        .query(seed)
        .column(Alias::new("id"))
        .table_name(closure)
        .to_owned();

    WithClause::new().recursive(true).cte(cte).to_owned()
}

/// Tag condition: any group satisfied.
///
/// A non-empty group holds when the entry carries every tag in it. An empty
/// group matches entries with no tags at all. An empty group list matches
/// nothing.
fn tag_condition(tags: &TagQuery) -> SimpleExpr {
    if tags.is_empty() {
        return Expr::cust("FALSE");
    }

    let groups: Vec<BTreeSet<i64>> = tags
        .iter()
        .map(|group| group.iter().copied().collect())
        .collect();

    let mut any = Cond::any();

    if groups.iter().any(BTreeSet::is_empty) {
        any = any.add(
            Expr::col((EntryIden::Table, EntryIden::Id)).not_in_subquery(
                Query::select()
                    .column((EntryTagIden::Table, EntryTagIden::EntryId))
                    .from(EntryTagIden::Table)
                    .to_owned(),
            ),
        );
    }

    let mut having = Cond::any();
    let mut wanted = BTreeSet::new();
    for group in groups.iter().filter(|g| !g.is_empty()) {
        wanted.extend(group.iter().copied());
        let tag = || Expr::col((EntryTagIden::Table, EntryTagIden::TagId));
        let matched = Func::count_distinct(Expr::case(tag().is_in(group.iter().copied()), tag()));
        having = having.add(Expr::expr(matched).eq(group.len() as i64));
    }

    if !wanted.is_empty() {
        any = any.add(
            Expr::col((EntryIden::Table, EntryIden::Id)).in_subquery(
                Query::select()
                    .column((EntryTagIden::Table, EntryTagIden::EntryId))
                    .from(EntryTagIden::Table)
                    .and_where(Expr::col((EntryTagIden::Table, EntryTagIden::TagId)).is_in(wanted))
                    .group_by_col((EntryTagIden::Table, EntryTagIden::EntryId))
                    .cond_having(having)
                    .to_owned(),
            ),
        );
    }

    any.into()
}

fn add_range(query: &mut SelectStatement, column: EntryIden, range: &DateRange) {
    let col = || Expr::col((EntryIden::Table, column));
    if let Some(from) = range.from {
        query.and_where(col().gte(from));
    }
    if let Some(to) = range.to {
        query.and_where(col().lt(to));
    }
}

fn add_search(query: &mut SelectStatement, search: &SearchQuery) {
    if let Some(term) = &search.header {
        query.and_where(contains(EntryIden::Header, term));
    }
    if let Some(term) = &search.body {
        query.and_where(contains(EntryIden::Body, term));
    }
    if let Some(term) = &search.text {
        query.and_where(
            Cond::any()
                .add(contains(EntryIden::Header, term))
                .add(contains(EntryIden::Body, term))
                .into(),
        );
    }
}

/// Case-insensitive substring match:
/// `LOWER(col) LIKE LOWER('%term%') ESCAPE '\'`.
///
/// Both sides are folded by the store so they agree on what "lowercase" means.
fn contains(column: EntryIden, term: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like_wildcards(term));
    let escaped = SimpleExpr::Binary(
        Box::new(Func::lower(Expr::val(pattern)).into()),
        BinOper::Escape,
        Box::new(SimpleExpr::Constant(Value::Char(Some('\\')))),
    );
    Expr::expr(Func::lower(Expr::col((EntryIden::Table, column)))).binary(BinOper::Like, escaped)
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn render(
    query: SelectStatement,
    with: Option<WithClause>,
    dialect: Dialect,
) -> Result<CompiledQuery> {
    let (sql, Values(values)) = match (with, dialect) {
        (Some(with), Dialect::Postgres) => query.with(with).build(PostgresQueryBuilder),
        (Some(with), Dialect::Sqlite) => query.with(with).build(SqliteQueryBuilder),
        (None, Dialect::Postgres) => query.build(PostgresQueryBuilder),
        (None, Dialect::Sqlite) => query.build(SqliteQueryBuilder),
    };

    let params = values
        .into_iter()
        .map(QueryValue::try_from)
        .collect::<Result<Vec<_>>>()?;

    debug!(%dialect, params = params.len(), "compiled filter");
    Ok(CompiledQuery { sql, params })
}
