//! Conversational memory
//!
//! Short-lived per-user exchange history: appended after each completed
//! turn, read back as context for the next one, expired by TTL.

pub mod context;
pub mod store;

pub use context::build_context;
pub use store::{build_memory_store, InMemoryMemoryStore, MemoryStore, PostgresMemoryStore};
