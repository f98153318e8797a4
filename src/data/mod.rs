//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Staged ingestion transactions

mod database;
mod models;

pub use database::{Database, PostIngest};
pub use models::*;

#[cfg(test)]
pub(crate) use database::seed_post;
