//! Persistent upload dedup cache.
//!
//! SQLite-backed mapping from a payload's content hash to the remote URL a
//! previous upload produced. Entries never expire implicitly; only an
//! explicit `clear` removes them. Losing this table is safe — dedup precision
//! degrades and identical content re-uploads once.

pub mod db;
pub mod error;
pub mod schema;

pub use db::{CacheStatus, SqliteUploadCache, UploadCache};
pub use error::CacheError;
