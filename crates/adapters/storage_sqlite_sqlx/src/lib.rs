//! # rfremote-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `rfremote-app::ports`
//!   (`SessionStore`, `SavedCodeRepository`)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! Everything lives in one `kv` table mapping a string key to a string
//! value; structured values are stored as JSON.
//!
//! ## Dependency rule
//! Depends on `rfremote-app` (for port traits) and `rfremote-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod kv;
mod pool;
mod saved_codes;
mod session_store;

pub use error::StorageError;
pub use kv::SqliteKeyValueStore;
pub use pool::{Config, Database};
pub use saved_codes::SqliteSavedCodeRepository;
pub use session_store::SqliteSessionStore;
