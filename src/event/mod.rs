// ============================================================================
// Lifecycle Events
// ============================================================================
//
// Listeners are registered per entity type via the metadata registry and
// fired by the session while it drains its flush queue. A listener may
// re-enter the session (persist / set / flush) from inside a hook; the
// session releases its internal borrow before dispatching, so nested calls
// are safe.
//
// ============================================================================

pub mod listener;
pub mod log;

pub use listener::{EventKind, LifecycleListener};
pub use self::log::EventLog;
