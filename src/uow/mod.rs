// ============================================================================
// Unit of Work
// ============================================================================
//
// The pending registry (identity map), the shared flush queue, and the
// session that drains them. The hazard this module is built around is
// logical re-entrancy on one thread: a lifecycle hook may register,
// mutate, or flush while an outer flush is still iterating.
//
// ============================================================================

pub mod queue;
pub mod registry;
pub mod session;

pub use queue::FlushQueue;
pub use registry::{PendingRegistry, SnapshotCursor};
pub use session::Session;
