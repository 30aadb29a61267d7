//! Infrastructure layer implementations
//!
//! Concrete storage backends behind the [`GraphStorage`](crate::storage::GraphStorage)
//! boundary.

mod memory_storage;

pub use memory_storage::{InMemoryGraphStorage, InMemoryTransaction};
