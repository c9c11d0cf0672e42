// ============================================================================
// Tracked Entity Model
// ============================================================================
//
// A PendingEntity is one unit of work: an identity, an attribute payload,
// and a change-state tag. The change epoch guards against a stale queue
// entry ever being processed twice.
//
// ============================================================================

pub mod pending;
pub mod state;

pub use pending::{EntityId, PendingEntity};
pub use state::ChangeState;
