// ============================================================================
// Session (Flush Engine)
// ============================================================================
//
// Owns the pending registry, the shared flush queue, the storage backend
// and the notification log. Concurrency model: single-threaded cooperative
// re-entrancy. The one invariant everything here hangs off: no RefCell
// borrow is held across a listener dispatch, so a hook can call back into
// the session (persist / set / remove / flush) freely.
//
// ============================================================================

use super::{FlushQueue, PendingRegistry};
use crate::core::{Attributes, EntityKey, Result, UowError, Value};
use crate::entity::{ChangeState, EntityId, PendingEntity};
use crate::event::{EventKind, EventLog, LifecycleListener};
use crate::metadata::MetadataRegistry;
use crate::storage::StorageBackend;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

/// A unit-of-work session: tracks pending entity changes and flushes them
/// as a batch, firing lifecycle notifications per entity.
///
/// Cloning a session clones the handle, not the state; listeners receive a
/// `&Session` and may keep a clone.
#[derive(Clone)]
pub struct Session {
    inner: Rc<RefCell<SessionInner>>,
}

struct SessionInner {
    metadata: MetadataRegistry,
    registry: PendingRegistry,
    queue: FlushQueue,
    backend: Box<dyn StorageBackend>,
    events: EventLog,
    /// Entities popped from the queue but not yet fully dispatched; the
    /// change-detection pass must not reschedule them.
    processing: HashSet<EntityId>,
    depth: u32,
}

/// One unit of dispatch: the write kind, the entity snapshot handed to
/// hooks, and the listeners registered for its type.
struct Dispatch {
    kind: EventKind,
    snapshot: PendingEntity,
    listeners: Vec<Rc<dyn LifecycleListener>>,
}

impl Session {
    pub fn new(metadata: MetadataRegistry, backend: impl StorageBackend + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SessionInner {
                metadata,
                registry: PendingRegistry::new(),
                queue: FlushQueue::new(),
                backend: Box::new(backend),
                events: EventLog::new(),
                processing: HashSet::new(),
                depth: 0,
            })),
        }
    }

    /// Run a raw write statement against the backend (schema bootstrap).
    pub fn execute_write(&self, statement: &str) -> Result<()> {
        self.inner.borrow_mut().backend.execute_write(statement)
    }

    /// Register a NEW entity and schedule it for the next flush.
    ///
    /// # Errors
    /// `TypeNotRegistered` for an unknown type tag, `FieldNotFound` for an
    /// undeclared payload field, `DuplicateIdentity` if the identity is
    /// already managed.
    pub fn persist(&self, type_tag: &str, payload: Attributes) -> Result<EntityId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        let key = {
            let desc = inner.metadata.descriptor(type_tag)?;
            desc.validate(&payload)?;
            desc.identity_of(&payload)?
        };
        let id = EntityId::new(type_tag, key);
        if inner.registry.contains(&id) {
            return Err(UowError::DuplicateIdentity(id.to_string()));
        }

        let entity = PendingEntity::new(id.clone(), payload, ChangeState::New);
        let epoch = entity.epoch();
        inner.registry.register(entity);
        inner.queue.enqueue(id.clone(), epoch);
        log::debug!("persist {id}");
        Ok(id)
    }

    /// Look an entity up by identity: registry first, then the backend
    /// (loaded rows enter the registry as CLEAN). An entity scheduled for
    /// removal is reported as absent.
    pub fn find(&self, type_tag: &str, key: impl Into<EntityKey>) -> Result<Option<EntityId>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        let key = key.into();
        let id = EntityId::new(type_tag, key.clone());
        if let Some(entity) = inner.registry.get(&id) {
            return Ok(if entity.state().is_removal() {
                None
            } else {
                Some(id)
            });
        }

        let table = inner.metadata.descriptor(type_tag)?.table().to_string();
        match inner.backend.find_by_id(&table, &key)? {
            Some(row) => {
                inner
                    .registry
                    .register(PendingEntity::new(id.clone(), row, ChangeState::Clean));
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Read one attribute of a managed entity (Null if not yet set).
    pub fn get(&self, id: &EntityId, field: &str) -> Result<Value> {
        let guard = self.inner.borrow();
        guard.metadata.descriptor(id.type_tag())?.validate_field(field)?;
        let entity = guard
            .registry
            .get(id)
            .ok_or_else(|| UowError::EntityNotFound(id.to_string()))?;
        Ok(entity.get(field).cloned().unwrap_or(Value::Null))
    }

    /// Write one attribute. Mutating a CLEAN entity auto-dirties it,
    /// opening a new change epoch; the update itself is scheduled by the
    /// next flush's change-detection pass, not here.
    pub fn set(&self, id: &EntityId, field: &str, value: impl Into<Value>) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        inner.metadata.descriptor(id.type_tag())?.validate_field(field)?;
        let entity = inner
            .registry
            .get_mut(id)
            .ok_or_else(|| UowError::EntityNotFound(id.to_string()))?;
        entity.set_field(field, value.into());
        if entity.mark_dirty() {
            log::debug!("{id} marked dirty (epoch {})", entity.epoch());
        }
        Ok(())
    }

    /// Schedule an entity for deletion. A NEW entity that was never flushed
    /// is simply evicted; no delete is issued for a row never inserted.
    pub fn remove(&self, id: &EntityId) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        let entity = inner
            .registry
            .get_mut(id)
            .ok_or_else(|| UowError::EntityNotFound(id.to_string()))?;
        if entity.state() == ChangeState::New {
            inner.registry.unregister(id);
            log::debug!("evicted never-flushed {id}");
            return Ok(());
        }
        entity.mark_removed();
        let epoch = entity.epoch();
        inner.queue.enqueue(id.clone(), epoch);
        Ok(())
    }

    /// Evict an entity from the registry without touching the backend.
    /// Un-flushed changes are discarded; stale queue entries are skipped.
    pub fn detach(&self, id: &EntityId) -> Result<()> {
        self.inner
            .borrow_mut()
            .registry
            .unregister(id)
            .map(|_| ())
            .ok_or_else(|| UowError::EntityNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.borrow().registry.contains(id)
    }

    pub fn state_of(&self, id: &EntityId) -> Option<ChangeState> {
        self.inner.borrow().registry.get(id).map(PendingEntity::state)
    }

    /// Number of entities with un-flushed changes.
    pub fn pending_count(&self) -> usize {
        self.inner
            .borrow()
            .registry
            .iter()
            .filter(|(_, e)| e.state().is_pending())
            .count()
    }

    /// Identity field declared for a type (for consumers that build
    /// payloads dynamically, such as projectors).
    pub fn identity_field(&self, type_tag: &str) -> Result<String> {
        Ok(self
            .inner
            .borrow()
            .metadata
            .descriptor(type_tag)?
            .id_field()
            .to_string())
    }

    /// Ordered log of fired post-notification names (the flush oracle).
    pub fn events(&self) -> Vec<String> {
        self.inner.borrow().events.entries().to_vec()
    }

    /// Ordered statement log of the backend.
    pub fn statements(&self) -> Vec<String> {
        self.inner.borrow().backend.statements().to_vec()
    }

    /// Process all pending entities to CLEAN, firing lifecycle hooks.
    ///
    /// Re-entrant: a hook may call `flush()` again; inner and outer calls
    /// drain the same queue, so every pending entity is delivered exactly
    /// once per change epoch no matter how the calls nest. Entities
    /// registered or dirtied by a hook join the same pending set and are
    /// processed by whichever pass is active when the queue reaches them.
    ///
    /// A hook that unconditionally re-dirties its own entity on every
    /// post-notification will starve this loop; the queue design turns that
    /// caller bug into non-termination, never into duplicate delivery.
    ///
    /// # Errors
    /// A backend write failure propagates immediately; the failed entity
    /// keeps its pending state and is rescheduled by the next flush.
    pub fn flush(&self) -> Result<()> {
        {
            let mut guard = self.inner.borrow_mut();
            guard.depth += 1;
            log::debug!("flush started (depth {})", guard.depth);
        }
        let result = self.drain();
        self.inner.borrow_mut().depth -= 1;
        result
    }

    fn drain(&self) -> Result<()> {
        loop {
            let Some(dispatch) = self.next_dispatch()? else {
                return Ok(());
            };
            let result = self.dispatch_one(&dispatch);
            self.inner
                .borrow_mut()
                .processing
                .remove(dispatch.snapshot.id());
            result?;
        }
    }

    fn dispatch_one(&self, dispatch: &Dispatch) -> Result<()> {
        self.fire_pre(dispatch)?;
        if let Some(done) = self.apply_write(dispatch)? {
            self.fire_post(&done)?;
        }
        Ok(())
    }

    /// Pop the next live queue entry, running change detection when the
    /// queue is empty. Marks the returned entity as processing.
    fn next_dispatch(&self) -> Result<Option<Dispatch>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        loop {
            let entry = match inner.queue.pop() {
                Some(entry) => entry,
                None => {
                    Self::schedule_pending(inner);
                    match inner.queue.pop() {
                        Some(entry) => entry,
                        None => return Ok(None),
                    }
                }
            };
            let (id, epoch) = entry;
            let Some(entity) = inner.registry.get(&id) else {
                log::debug!("skipping queue entry for evicted {id}");
                continue;
            };
            if entity.epoch() != epoch {
                log::debug!("skipping stale queue entry for {id}");
                continue;
            }
            let kind = match entity.state() {
                ChangeState::New => EventKind::Persist,
                ChangeState::Dirty => EventKind::Update,
                ChangeState::Removed => EventKind::Remove,
                ChangeState::Clean => continue,
            };
            let listeners = inner.metadata.descriptor(id.type_tag())?.listeners().to_vec();
            let snapshot = entity.clone();
            inner.processing.insert(id);
            return Ok(Some(Dispatch {
                kind,
                snapshot,
                listeners,
            }));
        }
    }

    /// Change-detection pass: schedule every pending entity that is not
    /// queued and not currently being processed.
    ///
    /// NEW and REMOVED entities enqueue themselves at persist/remove time,
    /// so they only show up here after a failed write. DIRTY entities are
    /// scheduled exclusively here, batched per type tag in lexicographic
    /// order (registration order within a tag) so a backend can reuse one
    /// prepared statement per table and the update pass stays deterministic
    /// regardless of mutation order.
    fn schedule_pending(inner: &mut SessionInner) {
        let mut stragglers: Vec<(EntityId, u64)> = Vec::new();
        let mut dirty: BTreeMap<&str, Vec<(EntityId, u64)>> = BTreeMap::new();
        for (id, entity) in inner.registry.iter() {
            if inner.processing.contains(id) {
                continue;
            }
            match entity.state() {
                ChangeState::New | ChangeState::Removed => {
                    stragglers.push((id.clone(), entity.epoch()));
                }
                ChangeState::Dirty => {
                    dirty
                        .entry(id.type_tag())
                        .or_default()
                        .push((id.clone(), entity.epoch()));
                }
                ChangeState::Clean => {}
            }
        }
        for (id, epoch) in stragglers {
            if inner.queue.enqueue(id.clone(), epoch) {
                log::warn!("rescheduling {id} left pending by an earlier flush");
            }
        }
        for (_, batch) in dirty {
            for (id, epoch) in batch {
                inner.queue.enqueue(id, epoch);
            }
        }
    }

    /// Perform the backend write for one dispatch and transition the
    /// entity. Returns the post-write snapshot to fire post-hooks with, or
    /// None if the entry went stale while the pre-hooks ran.
    fn apply_write(&self, dispatch: &Dispatch) -> Result<Option<Dispatch>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let id = dispatch.snapshot.id();

        // Re-check liveness: a pre-hook, or a nested flush started from
        // one, may have completed or invalidated this entry already.
        let (payload, state, epoch) = match inner.registry.get(id) {
            Some(entity) => (entity.payload().clone(), entity.state(), entity.epoch()),
            None => return Ok(None),
        };
        if epoch != dispatch.snapshot.epoch() {
            return Ok(None);
        }
        let expected = match state {
            ChangeState::New => EventKind::Persist,
            ChangeState::Dirty => EventKind::Update,
            ChangeState::Removed => EventKind::Remove,
            ChangeState::Clean => return Ok(None),
        };
        if expected != dispatch.kind {
            return Ok(None);
        }

        let (table, has_listeners) = {
            let desc = inner.metadata.descriptor(id.type_tag())?;
            (desc.table().to_string(), desc.has_listeners())
        };
        let key = id.key().clone();
        let write = match dispatch.kind {
            EventKind::Persist => inner.backend.persist_row(&table, &key, &payload),
            EventKind::Update => {
                inner
                    .backend
                    .update_row(&table, &key, &payload)
                    .and_then(|updated| {
                        if updated {
                            Ok(())
                        } else {
                            Err(UowError::ExecutionError(format!(
                                "row {id} vanished from table '{table}'"
                            )))
                        }
                    })
            }
            EventKind::Remove => inner.backend.delete_row(&table, &key).map(|_| ()),
        };
        if let Err(e) = write {
            log::warn!("{} write for {id} failed; entity stays pending: {e}", dispatch.kind.as_str());
            return Err(e);
        }

        let snapshot = if dispatch.kind == EventKind::Remove {
            match inner.registry.unregister(id) {
                Some(entity) => entity,
                None => return Ok(None),
            }
        } else {
            match inner.registry.get_mut(id) {
                Some(entity) => {
                    entity.set_state(ChangeState::Clean);
                    entity.clone()
                }
                None => return Ok(None),
            }
        };

        if has_listeners {
            inner.events.append(dispatch.kind.post_name(), id.type_tag());
        }
        Ok(Some(Dispatch {
            kind: dispatch.kind,
            snapshot,
            listeners: dispatch.listeners.clone(),
        }))
    }

    fn fire_pre(&self, dispatch: &Dispatch) -> Result<()> {
        for listener in &dispatch.listeners {
            match dispatch.kind {
                EventKind::Persist => listener.pre_persist(&dispatch.snapshot, self)?,
                EventKind::Update => listener.pre_update(&dispatch.snapshot, self)?,
                EventKind::Remove => listener.pre_remove(&dispatch.snapshot, self)?,
            }
        }
        Ok(())
    }

    fn fire_post(&self, dispatch: &Dispatch) -> Result<()> {
        for listener in &dispatch.listeners {
            match dispatch.kind {
                EventKind::Persist => listener.post_persist(&dispatch.snapshot, self)?,
                EventKind::Update => listener.post_update(&dispatch.snapshot, self)?,
                EventKind::Remove => listener.post_remove(&dispatch.snapshot, self)?,
            }
        }
        Ok(())
    }
}
