//! Sheaf test utilities.
//!
//! Helpers for integration testing: entry and category fixtures, an
//! in-memory SQLite harness that runs compiled filters, a PostgreSQL
//! harness for the gather service, and assertion helpers.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sheaf_kernel::bind_params;
use sheaf_kernel::gather::CompiledQuery;
use sheaf_kernel::models::{CategoryRow, Entry, TagRow};
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Base timestamp for fixture entries: 2023-01-01T12:00:00Z.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Create a category row.
pub fn category(id: i64, parent_id: Option<i64>, name: &str) -> CategoryRow {
    CategoryRow {
        id,
        parent_id,
        name: name.to_string(),
        sort_order: None,
    }
}

/// Create a tag row.
pub fn tag(id: i64, name: &str) -> TagRow {
    TagRow {
        id,
        name: name.to_string(),
    }
}

/// Create a test entry with default values, created `id` days after
/// [`base_time`].
pub fn test_entry(id: i64, header: &str) -> TestEntry {
    TestEntry {
        id,
        header: Some(header.to_string()),
        body: None,
        created_at: base_time() + Duration::days(id),
        updated_at: None,
        archived: false,
        category_id: None,
        sort_order: None,
        tag_ids: Vec::new(),
    }
}

/// A test entry builder for creating fixtures.
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub id: i64,
    pub header: Option<String>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub category_id: Option<i64>,
    pub sort_order: Option<i64>,
    pub tag_ids: Vec<i64>,
}

impl TestEntry {
    /// Place the entry in a category.
    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Attach tags by id.
    pub fn with_tags(mut self, tag_ids: &[i64]) -> Self {
        self.tag_ids = tag_ids.to_vec();
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    /// Remove the header.
    pub fn without_header(mut self) -> Self {
        self.header = None;
        self
    }

    /// Set the creation time.
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Set the update time.
    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Mark as archived.
    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }

    /// Set the explicit sort position.
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// The entry as the kernel reads it, with tags resolved from `tags`.
    pub fn to_entry(&self, tags: &[TagRow]) -> Entry {
        Entry {
            id: self.id,
            header: self.header.clone(),
            body: self.body.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            archived: self.archived,
            category_id: self.category_id,
            sort_order: self.sort_order,
            tags: tags
                .iter()
                .filter(|t| self.tag_ids.contains(&t.id))
                .cloned()
                .collect(),
        }
    }
}

/// A complete data set: categories, tags and entries.
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub categories: Vec<CategoryRow>,
    pub tags: Vec<TagRow>,
    pub entries: Vec<TestEntry>,
}

impl Fixture {
    /// Entries as the kernel reads them.
    pub fn kernel_entries(&self) -> Vec<Entry> {
        self.entries.iter().map(|e| e.to_entry(&self.tags)).collect()
    }
}

/// The standard fixture.
///
/// ```text
/// default(0)
/// ├── Work(1)
/// │   ├── Projects(2)
/// │   │   └── Sheaf(4)
/// │   │       └── Deep(5)
/// │   └── Meetings(3)
/// └── Home(6)
/// Archive(10)
/// ```
///
/// Tags: rust(1), sql(3), tree(5), cli(7), docs(20).
pub fn standard_fixture() -> Fixture {
    Fixture {
        categories: vec![
            category(0, None, "default"),
            category(1, Some(0), "Work"),
            category(2, Some(1), "Projects"),
            category(3, Some(1), "Meetings"),
            category(4, Some(2), "Sheaf"),
            category(5, Some(4), "Deep"),
            category(6, Some(0), "Home"),
            category(10, None, "Archive"),
        ],
        tags: vec![
            tag(1, "rust"),
            tag(3, "sql"),
            tag(5, "tree"),
            tag(7, "cli"),
            tag(20, "docs"),
        ],
        entries: vec![
            test_entry(1, "Rust tree notes")
                .in_category(1)
                .with_tags(&[1, 5])
                .with_body("About forests"),
            test_entry(2, "Query planner")
                .in_category(2)
                .with_tags(&[3, 7, 20]),
            test_entry(3, "Sheaf design")
                .in_category(4)
                .with_tags(&[1, 3, 5])
                .with_body("Recursive closures"),
            test_entry(4, "Deep thought").in_category(5),
            test_entry(5, "Standup").in_category(3).with_tags(&[1]),
            test_entry(6, "Garden").in_category(6).with_tags(&[5]),
            test_entry(7, "Loose 50% note").with_body("no category at all"),
            test_entry(8, "Old stuff")
                .in_category(10)
                .archived()
                .with_tags(&[20]),
            test_entry(9, "Explicit default").in_category(0).with_tags(&[7]),
            test_entry(10, "Everything")
                .in_category(6)
                .with_tags(&[1, 5, 3, 7, 20])
                .updated(base_time() + Duration::days(30)),
        ],
    }
}

/// Schema the compiled queries expect.
pub const SCHEMA: &str = r#"
CREATE TABLE category (
    id INTEGER PRIMARY KEY,
    parent_id INTEGER,
    name TEXT NOT NULL,
    sort_order INTEGER
);
CREATE TABLE tag (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE entry (
    id INTEGER PRIMARY KEY,
    header TEXT,
    body TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT,
    archived BOOLEAN NOT NULL DEFAULT 0,
    category_id INTEGER,
    sort_order INTEGER
);
CREATE TABLE entry_tag (
    entry_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    UNIQUE (entry_id, tag_id)
);
"#;

/// In-memory SQLite database for running compiled filters.
pub struct SqliteHarness {
    pool: SqlitePool,
}

impl SqliteHarness {
    /// Create an empty database with the schema applied.
    pub async fn new() -> Result<Self, sqlx::Error> {
        // One connection: every connection to `:memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Create a database seeded with `fixture`.
    pub async fn with_fixture(fixture: &Fixture) -> Result<Self, sqlx::Error> {
        let harness = Self::new().await?;
        harness.seed(fixture).await?;
        Ok(harness)
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert every row of `fixture`.
    pub async fn seed(&self, fixture: &Fixture) -> Result<(), sqlx::Error> {
        for row in &fixture.categories {
            self.insert_category(row).await?;
        }
        for row in &fixture.tags {
            sqlx::query("INSERT INTO tag (id, name) VALUES (?, ?)")
                .bind(row.id)
                .bind(&row.name)
                .execute(&self.pool)
                .await?;
        }
        for entry in &fixture.entries {
            self.insert_entry(entry).await?;
        }
        Ok(())
    }

    /// Insert a category row.
    pub async fn insert_category(&self, row: &CategoryRow) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO category (id, parent_id, name, sort_order) VALUES (?, ?, ?, ?)")
            .bind(row.id)
            .bind(row.parent_id)
            .bind(&row.name)
            .bind(row.sort_order)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert an entry and its tag links.
    pub async fn insert_entry(&self, entry: &TestEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO entry (id, header, body, created_at, updated_at, archived, category_id, sort_order)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.header)
        .bind(&entry.body)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.archived)
        .bind(entry.category_id)
        .bind(entry.sort_order)
        .execute(&self.pool)
        .await?;

        for tag_id in &entry.tag_ids {
            sqlx::query("INSERT INTO entry_tag (entry_id, tag_id) VALUES (?, ?)")
                .bind(entry.id)
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Run a compiled entry query and return the decoded rows in order.
    pub async fn entries(&self, compiled: &CompiledQuery) -> Result<Vec<Entry>, sqlx::Error> {
        bind_params!(sqlx::query_as::<_, Entry>(&compiled.sql), &compiled.params)
            .fetch_all(&self.pool)
            .await
    }

    /// Run a compiled entry query and return the matching ids in order.
    pub async fn ids(&self, compiled: &CompiledQuery) -> Result<Vec<i64>, sqlx::Error> {
        Ok(self
            .entries(compiled)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect())
    }

    /// Run a compiled count query.
    pub async fn count(&self, compiled: &CompiledQuery) -> Result<i64, sqlx::Error> {
        bind_params!(
            sqlx::query_scalar::<_, i64>(&compiled.sql),
            &compiled.params
        )
        .fetch_one(&self.pool)
        .await
    }
}

/// PostgreSQL flavour of [`SCHEMA`]. Category ids are generated from 1000
/// so rows created by the service never collide with fixture ids.
pub const PG_SCHEMA: &str = r#"
CREATE TABLE category (
    id BIGINT GENERATED BY DEFAULT AS IDENTITY (START WITH 1000) PRIMARY KEY,
    parent_id BIGINT,
    name TEXT NOT NULL,
    sort_order BIGINT
);
CREATE TABLE tag (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE entry (
    id BIGINT PRIMARY KEY,
    header TEXT,
    body TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ,
    archived BOOLEAN NOT NULL DEFAULT FALSE,
    category_id BIGINT,
    sort_order BIGINT
);
CREATE TABLE entry_tag (
    entry_id BIGINT NOT NULL,
    tag_id BIGINT NOT NULL,
    UNIQUE (entry_id, tag_id)
);
"#;

static PG_SCHEMA_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A private PostgreSQL schema on `DATABASE_URL`, seeded from a fixture.
///
/// Every pool connection has its `search_path` pinned to the schema, so
/// harnesses in concurrent tests never see each other's rows.
pub struct PgHarness {
    pool: PgPool,
    admin: PgPool,
    schema: String,
}

impl PgHarness {
    /// Create and seed a schema, or return `None` when `DATABASE_URL` is unset.
    pub async fn from_env(fixture: &Fixture) -> Result<Option<Self>, sqlx::Error> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return Ok(None);
        };

        let schema = format!(
            "sheaf_test_{}_{}",
            std::process::id(),
            PG_SCHEMA_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let admin = PgPoolOptions::new().max_connections(1).connect(&url).await?;
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await?;

        let set_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .after_connect(move |conn, _meta| {
                let sql = set_path.clone();
                Box::pin(async move {
                    sqlx::query(&sql).execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await?;
        sqlx::raw_sql(PG_SCHEMA).execute(&pool).await?;

        let harness = Self {
            pool,
            admin,
            schema,
        };
        harness.seed(fixture).await?;
        Ok(Some(harness))
    }

    /// Pool whose connections resolve tables in this harness's schema.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn seed(&self, fixture: &Fixture) -> Result<(), sqlx::Error> {
        for row in &fixture.categories {
            sqlx::query(
                "INSERT INTO category (id, parent_id, name, sort_order) VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(row.parent_id)
            .bind(&row.name)
            .bind(row.sort_order)
            .execute(&self.pool)
            .await?;
        }
        for row in &fixture.tags {
            sqlx::query("INSERT INTO tag (id, name) VALUES ($1, $2)")
                .bind(row.id)
                .bind(&row.name)
                .execute(&self.pool)
                .await?;
        }
        for entry in &fixture.entries {
            sqlx::query(
                r#"
                INSERT INTO entry (id, header, body, created_at, updated_at, archived, category_id, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.id)
            .bind(&entry.header)
            .bind(&entry.body)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .bind(entry.archived)
            .bind(entry.category_id)
            .bind(entry.sort_order)
            .execute(&self.pool)
            .await?;

            for tag_id in &entry.tag_ids {
                sqlx::query("INSERT INTO entry_tag (entry_id, tag_id) VALUES ($1, $2)")
                    .bind(entry.id)
                    .bind(tag_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Close the pools and drop the schema.
    pub async fn cleanup(self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await?;
        self.admin.close().await;
        Ok(())
    }
}

/// Assertion helpers for result sets.
pub mod assert {
    /// Assert that two id lists hold the same ids, ignoring order.
    pub fn same_ids(actual: &[i64], expected: &[i64]) {
        let mut actual = actual.to_vec();
        let mut expected = expected.to_vec();
        actual.sort_unstable();
        expected.sort_unstable();
        assert_eq!(actual, expected, "id sets differ");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
