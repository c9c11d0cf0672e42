/// Mutation-during-iteration tests
///
/// Hooks that unregister or remove entities while a flush pass is draining
/// must never cause a live, not-yet-visited entity to be skipped, and must
/// never cause one to be delivered twice.
/// Run with: cargo test --test registry_iteration_tests

use std::cell::RefCell;
use std::rc::Rc;
use uowdb::{
    Attributes, EntityDescriptor, EntityId, EntityKey, LifecycleListener, MemoryBackend,
    MetadataRegistry, PendingEntity, Result, Session, Value,
};

#[derive(Clone, Default)]
struct Recorder {
    seen: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn log(&self, name: &str, entity: &PendingEntity) {
        self.seen.borrow_mut().push(format!("{name} {}", entity.id()));
    }

    fn entries(&self) -> Vec<String> {
        self.seen.borrow().clone()
    }
}

impl LifecycleListener for Recorder {
    fn post_persist(&self, entity: &PendingEntity, _session: &Session) -> Result<()> {
        self.log("postPersist", entity);
        Ok(())
    }

    fn post_update(&self, entity: &PendingEntity, _session: &Session) -> Result<()> {
        self.log("postUpdate", entity);
        Ok(())
    }

    fn post_remove(&self, entity: &PendingEntity, _session: &Session) -> Result<()> {
        self.log("postRemove", entity);
        Ok(())
    }
}

fn node(id: i64) -> Attributes {
    let mut payload = Attributes::new();
    payload.insert("id".to_string(), Value::Integer(id));
    payload
}

fn node_session(extra: Vec<Rc<dyn LifecycleListener>>) -> (Session, Recorder) {
    let recorder = Recorder::default();
    let mut descriptor = EntityDescriptor::new("Node", "nodes", "id")
        .with_field("label")
        .with_listener(Rc::new(recorder.clone()));
    for listener in extra {
        descriptor = descriptor.with_listener(listener);
    }
    let session = Session::new(
        MetadataRegistry::new().register(descriptor),
        MemoryBackend::new(),
    );
    session
        .execute_write("CREATE TABLE nodes (id INTEGER, label CHAR(255))")
        .unwrap();
    (session, recorder)
}

/// Removes the (still NEW) second entity while the first one's post-persist
/// hook runs.
struct RemoveSecondOnFirst;

impl LifecycleListener for RemoveSecondOnFirst {
    fn post_persist(&self, entity: &PendingEntity, session: &Session) -> Result<()> {
        if entity.key() == &EntityKey::Int(1) {
            session.remove(&EntityId::new("Node", 2))?;
        }
        Ok(())
    }
}

#[test]
fn test_removing_a_pending_sibling_mid_pass_does_not_skip_survivors() {
    let (session, recorder) = node_session(vec![Rc::new(RemoveSecondOnFirst)]);
    for id in 1..=3 {
        session.persist("Node", node(id)).unwrap();
    }
    session.flush().unwrap();

    // Node#2 was evicted before its turn; Node#3 must still be delivered,
    // and nothing twice.
    assert_eq!(recorder.entries(), ["postPersist Node#1", "postPersist Node#3"]);
}

/// Detaches the second entity while the first one's post-update hook runs.
struct DetachSecondOnFirstUpdate;

impl LifecycleListener for DetachSecondOnFirstUpdate {
    fn post_update(&self, entity: &PendingEntity, session: &Session) -> Result<()> {
        if entity.key() == &EntityKey::Int(1) {
            session.detach(&EntityId::new("Node", 2))?;
        }
        Ok(())
    }
}

#[test]
fn test_detaching_a_scheduled_entity_mid_pass_skips_only_that_entity() {
    let (session, recorder) = node_session(vec![Rc::new(DetachSecondOnFirstUpdate)]);
    let first = session.persist("Node", node(1)).unwrap();
    let second = session.persist("Node", node(2)).unwrap();
    session.flush().unwrap();

    session.set(&first, "label", "a").unwrap();
    session.set(&second, "label", "b").unwrap();
    session.flush().unwrap();

    assert_eq!(
        recorder.entries(),
        ["postPersist Node#1", "postPersist Node#2", "postUpdate Node#1"]
    );
    let updates = session
        .statements()
        .iter()
        .filter(|s| s.starts_with("UPDATE nodes"))
        .count();
    assert_eq!(updates, 1);
}

/// Removes its own entity from the pre-persist hook.
struct SelfRemovingPre;

impl LifecycleListener for SelfRemovingPre {
    fn pre_persist(&self, entity: &PendingEntity, session: &Session) -> Result<()> {
        if entity.key() == &EntityKey::Int(1) {
            session.remove(entity.id())?;
        }
        Ok(())
    }
}

#[test]
fn test_entity_removed_by_its_own_pre_hook_is_not_written() {
    let (session, recorder) = node_session(vec![Rc::new(SelfRemovingPre)]);
    session.persist("Node", node(1)).unwrap();
    session.persist("Node", node(2)).unwrap();
    session.flush().unwrap();

    assert_eq!(recorder.entries(), ["postPersist Node#2"]);
    let inserts = session
        .statements()
        .iter()
        .filter(|s| s.starts_with("INSERT INTO nodes"))
        .count();
    assert_eq!(inserts, 1);
}

#[test]
fn test_removal_and_update_in_one_flush() {
    let (session, recorder) = node_session(vec![]);
    session.persist("Node", node(1)).unwrap();
    let second = session.persist("Node", node(2)).unwrap();
    let third = session.persist("Node", node(3)).unwrap();
    session.flush().unwrap();

    session.remove(&second).unwrap();
    session.set(&third, "label", "c").unwrap();
    session.flush().unwrap();

    assert_eq!(
        recorder.entries(),
        [
            "postPersist Node#1",
            "postPersist Node#2",
            "postPersist Node#3",
            "postRemove Node#2",
            "postUpdate Node#3",
        ]
    );
}
