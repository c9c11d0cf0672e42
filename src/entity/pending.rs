use super::ChangeState;
use crate::core::{Attributes, EntityKey, Value};
use std::fmt;

/// Session-wide identity of a tracked entity: type tag plus key.
///
/// The type tag is an explicit string carried by every entity; it doubles
/// as the name used in notification log entries (`postPersist Human`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    type_tag: String,
    key: EntityKey,
}

impl EntityId {
    pub fn new(type_tag: impl Into<String>, key: impl Into<EntityKey>) -> Self {
        Self {
            type_tag: type_tag.into(),
            key: key.into(),
        }
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_tag, self.key)
    }
}

/// A tracked unit of work: identity, payload, change state, change epoch.
///
/// The epoch increments every time a CLEAN entity becomes pending again
/// (re-dirtied or removed). Flush-queue entries capture the epoch they were
/// scheduled under; an entry whose epoch no longer matches is stale and is
/// skipped, which is what makes delivery exactly-once per epoch.
#[derive(Debug, Clone)]
pub struct PendingEntity {
    id: EntityId,
    payload: Attributes,
    state: ChangeState,
    epoch: u64,
}

impl PendingEntity {
    pub fn new(id: EntityId, payload: Attributes, state: ChangeState) -> Self {
        Self {
            id,
            payload,
            state,
            epoch: 0,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn type_tag(&self) -> &str {
        self.id.type_tag()
    }

    pub fn key(&self) -> &EntityKey {
        self.id.key()
    }

    pub fn payload(&self) -> &Attributes {
        &self.payload
    }

    pub fn state(&self) -> ChangeState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Read one attribute of the payload.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    pub(crate) fn set_field(&mut self, field: &str, value: Value) {
        self.payload.insert(field.to_string(), value);
    }

    pub(crate) fn set_state(&mut self, state: ChangeState) {
        self.state = state;
    }

    /// CLEAN -> DIRTY transition; opens a new change epoch.
    ///
    /// Returns true if the transition happened, false if the entity was
    /// already pending (no new epoch in that case).
    pub(crate) fn mark_dirty(&mut self) -> bool {
        if self.state == ChangeState::Clean {
            self.state = ChangeState::Dirty;
            self.epoch += 1;
            true
        } else {
            false
        }
    }

    /// Any state -> REMOVED; opens a new change epoch so that queue entries
    /// scheduled before the removal go stale.
    pub(crate) fn mark_removed(&mut self) {
        self.state = ChangeState::Removed;
        self.epoch += 1;
    }
}
