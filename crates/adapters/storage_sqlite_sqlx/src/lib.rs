//! # kisslight-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`DeviceStore`](kisslight_app::ports::DeviceStore) port
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! ## Dependency rule
//! Depends on `kisslight-app` (for port traits) and `kisslight-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod device_store;
mod error;
mod pool;

pub use device_store::SqliteDeviceStore;
pub use error::StorageError;
pub use pool::{Config, Database};
