//! Sheaf Kernel Library
//!
//! Filter compilation, category indexing and display-tree assembly for a
//! categorized entry store. The `sheaf` binary wraps this library as a CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod gather;
pub mod models;
pub mod tree;

pub use config::Config;
pub use error::{Error, Result};
