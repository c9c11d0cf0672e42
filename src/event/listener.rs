use crate::core::Result;
use crate::entity::PendingEntity;
use crate::uow::Session;

/// Kind of write a lifecycle notification is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Persist,
    Update,
    Remove,
}

impl EventKind {
    /// Name logged after the write is durable, e.g. `postPersist`.
    pub fn post_name(&self) -> &'static str {
        match self {
            EventKind::Persist => "postPersist",
            EventKind::Update => "postUpdate",
            EventKind::Remove => "postRemove",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Persist => "persist",
            EventKind::Update => "update",
            EventKind::Remove => "remove",
        }
    }
}

/// Per-entity-type lifecycle hooks.
///
/// Pre-hooks fire before the backend write; payload mutations made through
/// the session inside a pre-hook are included in the write. Post-hooks fire
/// after the write is durable and may re-enter the session, including
/// calling [`Session::flush`] while an outer flush is still draining.
///
/// The `entity` argument is a snapshot taken at dispatch time; read it, but
/// go through the session to mutate.
pub trait LifecycleListener {
    fn pre_persist(&self, _entity: &PendingEntity, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn post_persist(&self, _entity: &PendingEntity, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn pre_update(&self, _entity: &PendingEntity, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn post_update(&self, _entity: &PendingEntity, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn pre_remove(&self, _entity: &PendingEntity, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn post_remove(&self, _entity: &PendingEntity, _session: &Session) -> Result<()> {
        Ok(())
    }
}
