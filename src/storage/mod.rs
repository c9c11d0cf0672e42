pub mod engine;
pub mod memory;

pub use engine::StorageBackend;
pub use memory::MemoryBackend;
