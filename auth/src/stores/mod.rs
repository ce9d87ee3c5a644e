//! Storage implementations for session validation.
//!
//! - **Session Cache** (Redis) - account ID → token version with TTL
//! - **Token Version Store** (PostgreSQL) - the authoritative version column

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod session_redis;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::PostgresTokenVersionStore;
pub use session_redis::RedisSessionCache;
