//! SQLite backend for the billing engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
