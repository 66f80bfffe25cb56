//! Two-tier in-memory attribute store
//!
//! `Memory` answers "is this attribute cached" and "what is it" for opaque
//! keys. `ReadContext` carries a positive existence check over to the read
//! that follows it.

pub mod core;
pub mod eviction;
pub mod read_context;

pub use self::core::Memory;
pub use eviction::{MAX_SAMPLE, sample_size};
pub use read_context::ReadContext;
