//! Gather filter types.
//!
//! Provides type definitions for the query compiler:
//! - Filter: Category, tag, date, archive, search and paging predicates
//! - Dialect / ColumnMode: Rendering target and selected columns
//! - QueryValue / CompiledQuery: Compiler output, ready for binding

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Structured retrieval filter. Every `None` means "do not filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub categories: Option<CatQuery>,

    #[serde(default)]
    pub tags: Option<TagQuery>,

    #[serde(default)]
    pub date_created: Option<DateRange>,

    #[serde(default)]
    pub date_updated: Option<UpdatedQuery>,

    /// `Some(false)` keeps live entries only, `Some(true)` archived only.
    #[serde(default)]
    pub archived: Option<bool>,

    #[serde(default)]
    pub search: Option<SearchQuery>,

    #[serde(default)]
    pub pager: Option<Pager>,

    #[serde(default)]
    pub mode: ColumnMode,
}

/// Category membership. `rec` and `term` are combined with OR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatQuery {
    /// Match these categories and all of their descendants.
    #[serde(default)]
    pub rec: Vec<i64>,

    /// Match these categories exactly.
    #[serde(default)]
    pub term: Vec<i64>,
}

impl CatQuery {
    pub fn is_empty(&self) -> bool {
        self.rec.is_empty() && self.term.is_empty()
    }
}

/// Tag groups: outer list is OR, each inner list is AND.
pub type TagQuery = Vec<Vec<i64>>;

/// Half-open time range: `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,

    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    fn validate(&self, field: &'static str) -> Result<()> {
        match (self.from, self.to) {
            (None, None) => Err(Error::validation(field, "range needs at least one bound")),
            (Some(from), Some(to)) if from >= to => {
                Err(Error::validation(field, "range start must be before its end"))
            }
            _ => Ok(()),
        }
    }
}

/// Update-time predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatedQuery {
    /// Entries that were never updated.
    Never,
    Range(DateRange),
}

/// Case-insensitive substring search.
///
/// `header` and `body` must both hold when given. `text` matches either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub text: Option<String>,
}

/// One-based pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    #[serde(default)]
    pub page: Option<i64>,

    #[serde(default)]
    pub size: Option<i64>,
}

impl Pager {
    /// `(limit, offset)` for a validated pager.
    pub fn limit_offset(&self) -> (Option<u64>, Option<u64>) {
        let size = self.size.and_then(|s| u64::try_from(s).ok());
        let offset = match (self.page, size) {
            (Some(page), Some(size)) => {
                u64::try_from(page - 1).ok().map(|p| p.saturating_mul(size))
            }
            _ => None,
        };
        (size, offset)
    }
}

/// Which entry columns are selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMode {
    /// Everything but `body`.
    #[default]
    Preview,
    Full,
}

impl FromStr for ColumnMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(ColumnMode::Preview),
            "full" => Ok(ColumnMode::Full),
            other => Err(Error::validation(
                "mode",
                format!("unknown column mode '{other}'"),
            )),
        }
    }
}

/// SQL rendering target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(Error::validation(
                "dialect",
                format!("unknown dialect '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => f.write_str("postgres"),
            Dialect::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// A positional query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryValue {
    Integer(i64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl TryFrom<sea_query::Value> for QueryValue {
    type Error = Error;

    fn try_from(value: sea_query::Value) -> Result<Self> {
        use sea_query::Value;

        match value {
            Value::Bool(Some(b)) => Ok(QueryValue::Boolean(b)),
            Value::Int(Some(i)) => Ok(QueryValue::Integer(i64::from(i))),
            Value::BigInt(Some(i)) => Ok(QueryValue::Integer(i)),
            Value::BigUnsigned(Some(u)) => i64::try_from(u)
                .map(QueryValue::Integer)
                .map_err(|_| Error::UnsupportedParameter(format!("{u} overflows i64"))),
            Value::String(Some(s)) => Ok(QueryValue::Text(*s)),
            Value::ChronoDateTimeUtc(Some(ts)) => Ok(QueryValue::Timestamp(*ts)),
            other => Err(Error::UnsupportedParameter(format!("{other:?}"))),
        }
    }
}

/// Bind a [`CompiledQuery`]'s parameters to a sqlx query in order.
///
/// Works for `query`, `query_as` and `query_scalar` on any backend whose
/// arguments accept `i64`, `&str`, `bool` and `DateTime<Utc>`.
///
/// ```ignore
/// let rows = sheaf_kernel::bind_params!(sqlx::query_as::<_, Entry>(&q.sql), &q.params)
///     .fetch_all(&pool)
///     .await?;
/// ```
#[macro_export]
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                $crate::gather::QueryValue::Integer(v) => query.bind(*v),
                $crate::gather::QueryValue::Text(v) => query.bind(v.as_str()),
                $crate::gather::QueryValue::Boolean(v) => query.bind(*v),
                $crate::gather::QueryValue::Timestamp(v) => query.bind(*v),
            };
        }
        query
    }};
}

/// Compiled query text with its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryValue>,
}

impl Filter {
    /// Check the filter for values that cannot be compiled.
    ///
    /// Filters that are valid but match nothing (an empty category query,
    /// an empty tag list) pass.
    pub fn validate(&self) -> Result<()> {
        if let Some(categories) = &self.categories
            && categories.rec.iter().chain(&categories.term).any(|id| *id < 0)
        {
            return Err(Error::validation("categories", "category ids must not be negative"));
        }

        if let Some(tags) = &self.tags
            && tags.iter().flatten().any(|id| *id < 0)
        {
            return Err(Error::validation("tags", "tag ids must not be negative"));
        }

        if let Some(range) = &self.date_created {
            range.validate("date_created")?;
        }
        if let Some(UpdatedQuery::Range(range)) = &self.date_updated {
            range.validate("date_updated")?;
        }

        if let Some(search) = &self.search {
            let terms = [
                ("search.header", &search.header),
                ("search.body", &search.body),
                ("search.text", &search.text),
            ];
            for (field, term) in terms {
                if term.as_deref().is_some_and(|t| t.trim().is_empty()) {
                    return Err(Error::validation(field, "search term is empty"));
                }
            }
        }

        if let Some(pager) = &self.pager {
            match (pager.page, pager.size) {
                (_, Some(size)) if size < 1 => {
                    return Err(Error::validation("pager.size", "must be at least 1"));
                }
                (Some(page), _) if page < 1 => {
                    return Err(Error::validation("pager.page", "must be at least 1"));
                }
                (Some(_), None) => {
                    return Err(Error::validation("pager.page", "a page needs a page size"));
                }
                (Some(page), Some(size)) if (page - 1).checked_mul(size).is_none() => {
                    return Err(Error::validation("pager.page", "page offset is out of range"));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_filter_is_valid() {
        assert!(Filter::default().validate().is_ok());
    }

    #[test]
    fn filter_from_json() {
        let json = r#"{
            "categories": {"rec": [1], "term": [4]},
            "tags": [[1, 5], [3]],
            "date_updated": "never",
            "archived": false,
            "search": {"text": "rust"},
            "pager": {"page": 2, "size": 20},
            "mode": "full"
        }"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.categories.as_ref().unwrap().rec, vec![1]);
        assert_eq!(filter.tags.as_ref().unwrap().len(), 2);
        assert_eq!(filter.date_updated, Some(UpdatedQuery::Never));
        assert_eq!(filter.mode, ColumnMode::Full);
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn updated_range_from_json() {
        let json = r#"{"date_updated": {"range": {"from": "2023-01-01T00:00:00Z"}}}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(
            filter.date_updated,
            Some(UpdatedQuery::Range(DateRange {
                from: Some(at(2023, 1, 1)),
                to: None,
            }))
        );
    }

    #[test]
    fn pager_validation() {
        let cases = [
            (Some(1), Some(0), Some("pager.size")),
            (Some(0), Some(10), Some("pager.page")),
            (Some(2), None, Some("pager.page")),
            (None, Some(10), None),
            (Some(3), Some(10), None),
        ];
        for (page, size, expected) in cases {
            let filter = Filter {
                pager: Some(Pager { page, size }),
                ..Default::default()
            };
            assert_eq!(filter.validate().err().and_then(|e| e.field()), expected);
        }
    }

    #[test]
    fn oversized_page_fails_validation_not_compilation() {
        let huge = Filter {
            pager: Some(Pager {
                page: Some(i64::MAX),
                size: Some(10),
            }),
            ..Default::default()
        };
        assert_eq!(huge.validate().unwrap_err().field(), Some("pager.page"));
        let err = crate::gather::compile(&huge, Dialect::Postgres).unwrap_err();
        assert_eq!(err.field(), Some("pager.page"));

        // The last page whose offset still fits in an i64.
        let last = Filter {
            pager: Some(Pager {
                page: Some(i64::MAX / 10 + 1),
                size: Some(10),
            }),
            ..Default::default()
        };
        assert!(last.validate().is_ok());
        assert!(crate::gather::compile(&last, Dialect::Postgres).is_ok());
    }

    #[test]
    fn date_range_validation() {
        let unbounded = Filter {
            date_created: Some(DateRange::default()),
            ..Default::default()
        };
        assert_eq!(unbounded.validate().unwrap_err().field(), Some("date_created"));

        let inverted = Filter {
            date_updated: Some(UpdatedQuery::Range(DateRange {
                from: Some(at(2023, 2, 1)),
                to: Some(at(2023, 1, 1)),
            })),
            ..Default::default()
        };
        assert_eq!(inverted.validate().unwrap_err().field(), Some("date_updated"));
    }

    #[test]
    fn negative_ids_rejected() {
        let filter = Filter {
            categories: Some(CatQuery {
                rec: vec![],
                term: vec![-1],
            }),
            ..Default::default()
        };
        assert_eq!(filter.validate().unwrap_err().field(), Some("categories"));

        let filter = Filter {
            tags: Some(vec![vec![1, -2]]),
            ..Default::default()
        };
        assert_eq!(filter.validate().unwrap_err().field(), Some("tags"));
    }

    #[test]
    fn blank_search_rejected() {
        let filter = Filter {
            search: Some(SearchQuery {
                body: Some("   ".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(filter.validate().unwrap_err().field(), Some("search.body"));
    }

    #[test]
    fn empty_category_and_tag_queries_are_valid() {
        let filter = Filter {
            categories: Some(CatQuery::default()),
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn pager_limit_offset() {
        let pager = Pager {
            page: Some(3),
            size: Some(20),
        };
        assert_eq!(pager.limit_offset(), (Some(20), Some(40)));
        let size_only = Pager {
            page: None,
            size: Some(5),
        };
        assert_eq!(size_only.limit_offset(), (Some(5), None));
    }

    #[test]
    fn dialect_and_mode_parse() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("SQLite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("mysql".parse::<Dialect>().is_err());
        assert_eq!("full".parse::<ColumnMode>().unwrap(), ColumnMode::Full);
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn query_value_from_sea_query() {
        use sea_query::Value;

        assert_eq!(
            QueryValue::try_from(Value::BigInt(Some(7))).unwrap(),
            QueryValue::Integer(7)
        );
        assert_eq!(
            QueryValue::try_from(Value::BigUnsigned(Some(20))).unwrap(),
            QueryValue::Integer(20)
        );
        assert_eq!(
            QueryValue::try_from(Value::Bool(Some(true))).unwrap(),
            QueryValue::Boolean(true)
        );
        assert_eq!(
            QueryValue::try_from(Value::String(Some(Box::new("x".to_string())))).unwrap(),
            QueryValue::Text("x".to_string())
        );
        assert!(matches!(
            QueryValue::try_from(Value::Double(Some(1.5))),
            Err(Error::UnsupportedParameter(_))
        ));
    }
}
