//! Database migration runner for Procura.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Roll back the procurement schema
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations

use procura_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    // DATABASE_URL may come from .env
    dotenvy::dotenv().ok();

    cli::run_cli(Migrator).await;
}
