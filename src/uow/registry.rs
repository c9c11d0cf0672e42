use crate::entity::{EntityId, PendingEntity};
use indexmap::IndexMap;

/// Insertion-ordered identity map of tracked entities.
///
/// Registration order is significant: absent dependency constraints,
/// entities flush in the order they were registered. `unregister` uses
/// `shift_remove` so the survivors keep that order.
///
/// `register` and `unregister` are safe to call while a [`SnapshotCursor`]
/// over the same registry is being advanced; the cursor re-checks liveness
/// on every step instead of trusting sequential positions. Iterating by
/// position over a map whose keys contract on delete is exactly the defect
/// this type exists to rule out: the element shifted into the just-visited
/// slot gets skipped, then revisited by a later pass.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entities: IndexMap<EntityId, PendingEntity>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the entity's identity.
    pub fn register(&mut self, entity: PendingEntity) {
        self.entities.insert(entity.id().clone(), entity);
    }

    /// Remove an entry, preserving the order of the remaining ones.
    pub fn unregister(&mut self, id: &EntityId) -> Option<PendingEntity> {
        self.entities.shift_remove(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&PendingEntity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut PendingEntity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate live entries in registration order.
    ///
    /// This borrows the registry; for passes that mutate it mid-iteration,
    /// use [`PendingRegistry::snapshot`] instead.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &PendingEntity)> {
        self.entities.iter()
    }

    /// Start a snapshot-safe pass over the current entries.
    pub fn snapshot(&self) -> SnapshotCursor {
        SnapshotCursor {
            ids: self.entities.keys().cloned().collect(),
            pos: 0,
        }
    }
}

/// Cursor over a frozen snapshot of registry keys.
///
/// Each key is yielded at most once per cursor, and only if it is still
/// live in the registry at the moment it is reached. Entries registered
/// after the snapshot was taken are not part of this pass.
#[derive(Debug)]
pub struct SnapshotCursor {
    ids: Vec<EntityId>,
    pos: usize,
}

impl SnapshotCursor {
    /// Advance to the next key that is still registered.
    pub fn next_live(&mut self, registry: &PendingRegistry) -> Option<EntityId> {
        while self.pos < self.ids.len() {
            let id = &self.ids[self.pos];
            self.pos += 1;
            if registry.contains(id) {
                return Some(id.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Attributes;
    use crate::entity::ChangeState;

    fn entity(tag: &str, key: i64) -> PendingEntity {
        PendingEntity::new(EntityId::new(tag, key), Attributes::new(), ChangeState::New)
    }

    fn seeded() -> PendingRegistry {
        let mut registry = PendingRegistry::new();
        registry.register(entity("human", 0));
        registry.register(entity("head", 1));
        registry.register(entity("eye", 2));
        registry
    }

    fn ids(registry: &PendingRegistry) -> Vec<String> {
        registry.iter().map(|(id, _)| id.to_string()).collect()
    }

    #[test]
    fn test_unregister_keeps_order() {
        let mut registry = seeded();
        registry.unregister(&EntityId::new("head", 1));
        assert_eq!(ids(&registry), ["human#0", "eye#2"]);

        registry.register(entity("nose", 3));
        assert_eq!(ids(&registry), ["human#0", "eye#2", "nose#3"]);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = seeded();
        registry.register(entity("head", 1));
        assert_eq!(registry.len(), 3);
        assert_eq!(ids(&registry), ["human#0", "head#1", "eye#2"]);
    }

    #[test]
    fn test_cursor_skips_entries_removed_mid_pass() {
        let mut registry = seeded();
        let mut cursor = registry.snapshot();
        let mut visited = Vec::new();

        // Visit the first entry, then remove a not-yet-visited one.
        let first = cursor.next_live(&registry).unwrap();
        visited.push(first.to_string());
        registry.unregister(&EntityId::new("head", 1));

        while let Some(id) = cursor.next_live(&registry) {
            visited.push(id.to_string());
        }
        assert_eq!(visited, ["human#0", "eye#2"]);
    }

    #[test]
    fn test_cursor_removing_current_does_not_skip_successor() {
        let mut registry = seeded();
        let mut cursor = registry.snapshot();
        let mut visited = Vec::new();

        while let Some(id) = cursor.next_live(&registry) {
            visited.push(id.to_string());
            registry.unregister(&id);
        }
        assert_eq!(visited, ["human#0", "head#1", "eye#2"]);
        assert!(registry.is_empty());
    }

    // Reproduction of the skip-then-revisit hazard: each visited entry is
    // unregistered, and visiting the first one re-enters the whole pass.
    // A position-based cursor over the contracting map would skip head#1,
    // then the re-entrant pass would revisit it and eye#2, yielding five
    // visits instead of three.
    fn drain(registry: &mut PendingRegistry, visited: &mut Vec<String>) {
        let mut cursor = registry.snapshot();
        while let Some(id) = cursor.next_live(registry) {
            visited.push(id.to_string());
            registry.unregister(&id);
            if id.type_tag() == "human" {
                drain(registry, visited);
            }
        }
    }

    #[test]
    fn test_reentrant_pass_visits_each_entry_exactly_once() {
        let mut registry = seeded();
        let mut visited = Vec::new();
        drain(&mut registry, &mut visited);
        assert_eq!(visited, ["human#0", "head#1", "eye#2"]);
    }
}
