//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

use crate::traits::BillingDatabaseError;

pub mod activity;
pub mod invoices;
pub mod processed_events;
pub mod vendors;

const SQLITE_DB_URL: &str = "sqlite://data/vendor_billing.db";

pub fn db_url() -> String {
    let result = env::var("VB_DATABASE_URL").unwrap_or_else(|_| {
        info!("VB_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Maps a unique-constraint violation onto `on_conflict`, and anything else onto a generic database error.
pub(crate) fn map_unique_violation(e: SqlxError, on_conflict: BillingDatabaseError) -> BillingDatabaseError {
    match &e {
        SqlxError::Database(db_err) if db_err.is_unique_violation() => on_conflict,
        _ => BillingDatabaseError::from(e),
    }
}
