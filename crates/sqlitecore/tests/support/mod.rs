//! Shared test helpers for sqlitecore integration tests.

use sqlitecore::{ConnectOptions, Connection};

pub mod db;

pub use db::tdb;

/// Open a fresh in-memory connection for a test.
pub async fn connection() -> anyhow::Result<Connection> {
    Ok(ConnectOptions::new().open_in_memory().await?)
}
