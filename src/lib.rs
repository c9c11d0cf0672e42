// ============================================================================
// uowdb Library
// ============================================================================
//
// An in-memory unit-of-work persistence engine. Entities are tracked in an
// insertion-ordered pending registry, flushed through a shared FIFO work
// queue, and observed via per-type lifecycle listeners that may safely
// re-enter the flush while it is draining.
//
// ============================================================================

pub mod core;
pub mod entity;
pub mod event;
pub mod metadata;
pub mod projection;
pub mod storage;
pub mod uow;

// Re-export main types for convenience
pub use core::{Attributes, EntityKey, Result, UowError, Value};
pub use entity::{ChangeState, EntityId, PendingEntity};
pub use event::{EventKind, EventLog, LifecycleListener};
pub use metadata::{EntityDescriptor, MetadataRegistry};
pub use projection::{ProjectionRule, ReadModelProjector};
pub use storage::{MemoryBackend, StorageBackend};
pub use uow::{PendingRegistry, Session};
