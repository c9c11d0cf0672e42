use crate::entity::EntityId;
use std::collections::{HashMap, VecDeque};

/// Shared FIFO of flush work, drained by whichever flush pass is active.
///
/// Entries carry the change epoch they were scheduled under. The scheduled
/// map holds the latest epoch queued per entity: enqueueing the same
/// (entity, epoch) twice is a no-op, and popping an entry whose epoch has
/// been superseded drops it silently. Dequeue marks done — an entity popped
/// once cannot be delivered again for that epoch.
#[derive(Debug, Default)]
pub struct FlushQueue {
    queue: VecDeque<(EntityId, u64)>,
    scheduled: HashMap<EntityId, u64>,
}

impl FlushQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an entity for the given epoch. Returns false if it is
    /// already queued for that epoch.
    pub fn enqueue(&mut self, id: EntityId, epoch: u64) -> bool {
        if self.scheduled.get(&id) == Some(&epoch) {
            return false;
        }
        self.scheduled.insert(id.clone(), epoch);
        self.queue.push_back((id, epoch));
        true
    }

    pub fn is_scheduled(&self, id: &EntityId, epoch: u64) -> bool {
        self.scheduled.get(id) == Some(&epoch)
    }

    /// Pop the next live entry, dropping stale ones.
    pub fn pop(&mut self) -> Option<(EntityId, u64)> {
        while let Some((id, epoch)) = self.queue.pop_front() {
            if self.scheduled.get(&id) == Some(&epoch) {
                self.scheduled.remove(&id);
                return Some((id, epoch));
            }
            log::debug!("dropping superseded queue entry for {id} (epoch {epoch})");
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(key: i64) -> EntityId {
        EntityId::new("node", key)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = FlushQueue::new();
        queue.enqueue(id(1), 0);
        queue.enqueue(id(2), 0);
        queue.enqueue(id(3), 0);

        assert_eq!(queue.pop(), Some((id(1), 0)));
        assert_eq!(queue.pop(), Some((id(2), 0)));
        assert_eq!(queue.pop(), Some((id(3), 0)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_enqueue_dedups_per_epoch() {
        let mut queue = FlushQueue::new();
        assert!(queue.enqueue(id(1), 0));
        assert!(!queue.enqueue(id(1), 0));

        assert_eq!(queue.pop(), Some((id(1), 0)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_superseded_entry_is_dropped() {
        let mut queue = FlushQueue::new();
        queue.enqueue(id(1), 0);
        // A new epoch supersedes the queued entry.
        assert!(queue.enqueue(id(1), 1));

        assert_eq!(queue.pop(), Some((id(1), 1)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_reenqueue_after_pop() {
        let mut queue = FlushQueue::new();
        queue.enqueue(id(1), 0);
        assert_eq!(queue.pop(), Some((id(1), 0)));
        assert!(!queue.is_scheduled(&id(1), 0));

        // Popped entries are done; the same epoch may be scheduled again
        // only explicitly (the session never does for a completed epoch).
        assert!(queue.enqueue(id(1), 1));
        assert_eq!(queue.pop(), Some((id(1), 1)));
    }
}
