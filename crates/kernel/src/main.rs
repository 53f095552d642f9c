//! Sheaf command-line tool.
//!
//! Compiles filters to SQL, assembles display trees from row dumps, and runs
//! filters end to end against PostgreSQL.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sheaf_kernel::Config;
use sheaf_kernel::db;
use sheaf_kernel::gather::{
    CategoryIndex, ColumnMode, Dialect, Filter, GatherService, compile, compile_count,
};
use sheaf_kernel::models::{CategoryRow, Entry};
use sheaf_kernel::tree::{DisplayConfig, assemble, linearize_with_index};

#[derive(Debug, Parser)]
#[command(name = "sheaf", version, about = "Categorized entry filters and display trees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a JSON filter and print the SQL and its parameters.
    Compile {
        /// Filter file, or `-` for stdin.
        filter: PathBuf,

        /// Target dialect (default: SHEAF_DIALECT).
        #[arg(long)]
        dialect: Option<Dialect>,

        /// Compile the COUNT(*) form instead.
        #[arg(long)]
        count: bool,
    },

    /// Assemble a JSON entry dump into a display tree.
    Assemble {
        /// Entry rows, or `-` for stdin.
        rows: PathBuf,

        /// Category rows used to build ancestor chains.
        #[arg(long)]
        categories: PathBuf,

        /// Display configuration (default: no buckets, name sort).
        #[arg(long)]
        display: Option<PathBuf>,
    },

    /// Run a filter against DATABASE_URL and print the display tree.
    Gather {
        /// Filter file, or `-` for stdin.
        filter: PathBuf,

        #[arg(long)]
        display: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Compile {
            filter,
            dialect,
            count,
        } => {
            let filter = read_filter(&filter, config.column_mode)?;
            let dialect = dialect.unwrap_or(config.dialect);
            let compiled = if count {
                compile_count(&filter, dialect)
            } else {
                compile(&filter, dialect)
            }
            .context("failed to compile filter")?;

            println!("{}", compiled.sql);
            println!("{}", serde_json::to_string_pretty(&compiled.params)?);
        }
        Command::Assemble {
            rows,
            categories,
            display,
        } => {
            let entries: Vec<Entry> = read_json(&rows)?;
            let categories: Vec<CategoryRow> = read_json(&categories)?;
            let display = read_display(display.as_deref())?;

            let index = CategoryIndex::new(categories);
            let rows = entries
                .into_iter()
                .map(|entry| linearize_with_index(entry, &index))
                .collect();
            let tree = assemble(rows, &display);

            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Command::Gather { filter, display } => {
            let filter = read_filter(&filter, config.column_mode)?;
            let display = read_display(display.as_deref())?;

            let pool = db::create_pool(&config).await?;
            if !db::check_health(&pool).await {
                anyhow::bail!("database health check failed");
            }
            db::check_schema(&pool).await?;
            let service = GatherService::new(pool);

            let total = service.count(&filter).await?;
            let tree = service.gather(&filter, &display).await?;
            info!(total, roots = tree.len(), "gather complete");

            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_input(path)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Read a filter, falling back to the configured column mode when the file
/// does not set one.
fn read_filter(path: &Path, default_mode: ColumnMode) -> Result<Filter> {
    let value: serde_json::Value = read_json(path)?;
    let has_mode = value.get("mode").is_some();
    let mut filter: Filter = serde_json::from_value(value)
        .with_context(|| format!("invalid filter in {}", path.display()))?;
    if !has_mode {
        filter.mode = default_mode;
    }
    Ok(filter)
}

fn read_display(path: Option<&Path>) -> Result<DisplayConfig> {
    path.map(read_json::<DisplayConfig>)
        .transpose()
        .map(Option::unwrap_or_default)
}
