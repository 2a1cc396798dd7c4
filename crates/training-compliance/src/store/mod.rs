//! In-memory implementations of the lifecycle storage traits.

mod memory;
mod sequences;

pub use memory::InMemoryComplianceStore;
pub use sequences::InMemorySequenceStore;
