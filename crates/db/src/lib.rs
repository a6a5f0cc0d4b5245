//! Database layer with `SeaORM` entities and the Postgres workflow store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the procurement schema
//! - [`PgStore`], the transactional implementation of the core store and
//!   notification ports
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::PgStore;

use std::time::Duration;

use procura_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);
    tracing::info!(
        max_connections = config.max_connections,
        "connecting to database"
    );
    Database::connect(options).await
}
