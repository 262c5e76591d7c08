//! Diesel-backed persistence for the entity store and user directory
//! ports.
//!
//! [`DbPool`] wraps a bb8 connection pool over `diesel-async`, and
//! [`DieselSession`] is the per-request handle implementing both
//! [`crate::domain::ports::EntityStore`] and
//! [`crate::domain::directory::UserDirectory`].

mod entity_store;
mod error_mapping;
mod pool;
pub mod schema;
mod user_directory;

pub(crate) mod models;

pub use pool::{DbPool, DieselSession, PoolConfig, PoolError};
