//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory repository backs ephemeral catalogs and unit tests. The
//! persistent adapter lives in its own crate (`sqlite-adapter`).

pub mod memory_repo;
