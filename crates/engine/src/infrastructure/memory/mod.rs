//! In-memory adapters for the repository ports.
//!
//! The shipped default: session state for a single-process deployment.
//! Anything implementing the port traits (a document database, a graph
//! store) can replace these without touching the use cases.

mod entity_pool_repo;
mod execution_repo;
mod mapping_repo;

pub use entity_pool_repo::MemoryEntityPoolRepo;
pub use execution_repo::MemoryExecutionRepo;
pub use mapping_repo::MemoryMappingRepo;
