//! Record storage.
//!
//! The worker only needs list/read/update over the `checks` collection; the
//! store keeps records as opaque JSON documents so it never has to agree with
//! the validator about their shape.

pub mod migrations;
pub mod repository;

pub use repository::{CHECKS, DataStore, LibsqlDataStore, StoreError};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
