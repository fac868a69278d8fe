//! Token value types stored in the cache.

pub mod credential;
pub mod secret;
