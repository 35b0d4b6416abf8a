//! # Entity Registry
//!
//! The shared, ordered collection every pass iterates.
//!
//! ## The Problem
//!
//! ```text
//! Render thread:  for entity in entities { draw }      (hot loop)
//! Purge thread:   entities.retain(alive)               (hot loop)
//! Tick thread:    for entity in entities { update }    (every 10ms)
//! Input thread:   for entity in entities { click }     (on mouse press)
//!
//! Plain Vec behind a Mutex: every pass holds the lock for its whole sweep
//! Plain Vec, no lock:       iterator invalidation → CRASH
//! ```
//!
//! ## The Solution: Copy-on-Write Snapshots
//!
//! ```text
//!   RwLock<Arc<Vec<Arc<Slot>>>>
//!        │
//!        ├── read lock:  clone the outer Arc (a few ns), release
//!        │               → the pass iterates its own frozen Vec
//!        │
//!        └── write lock: build the next Vec, swap it in, release
//!                        → passes in flight keep the old Vec alive
//! ```
//!
//! A pass sees exactly the members present when it took its snapshot, in
//! insertion order, each once. Members inserted later join the next pass.
//! Members removed later are still visited by the pass that already holds
//! them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::{Entity, EntityId, Slot, Spawn};

type Members<S> = Arc<Vec<Arc<Slot<S>>>>;

/// The shared entity collection.
pub struct Registry<S: ?Sized + 'static> {
    members: RwLock<Members<S>>,
    next_id: AtomicU64,
}

impl<S: ?Sized + 'static> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + 'static> Registry<S> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Appends `entity`, alive at the origin.
    pub fn insert<E: Entity<S>>(&self, entity: E) -> EntityId {
        self.insert_spawn(Spawn::new(entity))
    }

    /// Appends an entity with an explicit starting state.
    ///
    /// Passes that already hold a snapshot do not see it; the next pass of
    /// every context does.
    pub fn insert_spawn(&self, spawn: Spawn<S>) -> EntityId {
        let mut members = self.members.write();
        // IDs are taken under the write lock so ID order matches member order.
        let id = EntityId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(Slot::new(id, spawn));
        // Copies the vector only if some pass still holds the current one.
        Arc::make_mut(&mut *members).push(slot);
        drop(members);

        tracing::trace!(entity = %id, "entity inserted");
        id
    }

    /// Takes a snapshot of the current members, in insertion order.
    #[must_use]
    pub fn snapshot_ordered(&self) -> Snapshot<S> {
        Snapshot {
            members: Arc::clone(&*self.members.read()),
        }
    }

    /// Calls `visit` on every member of a snapshot taken now.
    ///
    /// Dead members that have not been purged yet are included; callers
    /// that must skip them check [`Slot::is_dead`].
    pub fn for_each_live<F>(&self, mut visit: F)
    where
        F: FnMut(&Arc<Slot<S>>),
    {
        let snapshot = self.snapshot_ordered();
        for slot in snapshot.iter() {
            visit(slot);
        }
    }

    /// Removes every member marked dead. Returns how many were removed.
    ///
    /// Snapshots held by passes in flight are untouched. Entities are
    /// dropped after the write lock is released.
    pub fn purge_dead(&self) -> usize {
        // Purging runs in a hot loop; only take the write lock when needed.
        if !self.members.read().iter().any(|slot| slot.is_dead()) {
            return 0;
        }

        let mut members = self.members.write();
        let (dead, alive): (Vec<_>, Vec<_>) =
            members.iter().cloned().partition(|slot| slot.is_dead());
        if dead.is_empty() {
            return 0;
        }
        let previous = std::mem::replace(&mut *members, Arc::new(alive));
        drop(members);
        drop(previous);

        for slot in &dead {
            tracing::trace!(entity = %slot.id(), kind = slot.kind(), "entity purged");
        }
        dead.len()
    }

    /// Removes the member with `id`, dead or alive. Returns true if found.
    pub fn remove(&self, id: EntityId) -> bool {
        let mut members = self.members.write();
        let Some(index) = members.iter().position(|slot| slot.id() == id) else {
            return false;
        };
        let removed = Arc::make_mut(&mut *members).remove(index);
        drop(members);
        drop(removed);
        true
    }

    /// True if a member with `id` is present.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.members.read().iter().any(|slot| slot.id() == id)
    }

    /// Number of members, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// True if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Number of members not marked dead.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.members.read().iter().filter(|slot| !slot.is_dead()).count()
    }
}

impl<S: ?Sized + 'static> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

/// A frozen, ordered view of the registry.
///
/// Cheap to take and to clone. Later inserts and purges do not affect it.
pub struct Snapshot<S: ?Sized + 'static> {
    members: Members<S>,
}

impl<S: ?Sized + 'static> Clone for Snapshot<S> {
    fn clone(&self) -> Self {
        Self {
            members: Arc::clone(&self.members),
        }
    }
}

impl<S: ?Sized + 'static> Snapshot<S> {
    /// Iterates members in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Slot<S>>> {
        self.members.iter()
    }

    /// Number of members in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<Slot<S>>> {
        self.members.get(index)
    }

    /// IDs in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.members.iter().map(|slot| slot.id()).collect()
    }
}

impl<'a, S: ?Sized + 'static> IntoIterator for &'a Snapshot<S> {
    type Item = &'a Arc<Slot<S>>;
    type IntoIter = std::slice::Iter<'a, Arc<Slot<S>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Draw, Tick};
    use crate::fault::EntityResult;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    struct Inert;

    impl Entity<()> for Inert {
        fn graphical_update(&mut self, _draw: &Draw, _surface: &mut ()) -> EntityResult {
            Ok(())
        }

        fn logical_update(&mut self, _tick: &mut Tick<'_, ()>) -> EntityResult {
            Ok(())
        }
    }

    #[test]
    fn test_insertion_order() {
        let registry: Registry<()> = Registry::new();
        let a = registry.insert(Inert);
        let b = registry.insert(Inert);
        let c = registry.insert(Inert);

        assert_eq!(registry.snapshot_ordered().ids(), vec![a, b, c]);
        assert_eq!(registry.len(), 3);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_for_each_live_includes_dead() {
        let registry: Registry<()> = Registry::new();
        registry.insert(Inert);
        registry.insert_spawn(Spawn::new(Inert).dead());

        let mut visited = 0;
        registry.for_each_live(|_| visited += 1);
        assert_eq!(visited, 2);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_purge_removes_only_dead() {
        let registry: Registry<()> = Registry::new();
        let a = registry.insert(Inert);
        let b = registry.insert_spawn(Spawn::new(Inert).dead());
        let c = registry.insert(Inert);

        assert_eq!(registry.purge_dead(), 1);
        assert_eq!(registry.snapshot_ordered().ids(), vec![a, c]);
        assert!(!registry.contains(b));
        assert_eq!(registry.purge_dead(), 0);
    }

    #[test]
    fn test_snapshot_survives_purge() {
        let registry: Registry<()> = Registry::new();
        let a = registry.insert_spawn(Spawn::new(Inert).dead());
        let b = registry.insert(Inert);

        let before = registry.snapshot_ordered();
        registry.purge_dead();
        let d = registry.insert(Inert);

        assert_eq!(before.ids(), vec![a, b]);
        assert_eq!(registry.snapshot_ordered().ids(), vec![b, d]);
    }

    #[test]
    fn test_remove_by_id() {
        let registry: Registry<()> = Registry::new();
        let a = registry.insert(Inert);
        let b = registry.insert(Inert);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(registry.snapshot_ordered().ids(), vec![b]);
    }

    #[test]
    fn test_empty_registry() {
        let registry: Registry<()> = Registry::default();
        assert!(registry.is_empty());
        assert!(registry.snapshot_ordered().is_empty());
        assert!(registry.snapshot_ordered().get(0).is_none());
        assert_eq!(registry.purge_dead(), 0);
    }

    #[test]
    fn test_concurrent_insert_purge_iterate() {
        let registry = Arc::new(Registry::<()>::new());
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..2000 {
                    let spawn = Spawn::new(Inert);
                    registry.insert_spawn(if i % 2 == 0 { spawn.dead() } else { spawn });
                }
            })
        };

        let purger = {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    registry.purge_dead();
                }
            })
        };

        let reader = {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = registry.snapshot_ordered();
                    let ids = snapshot.ids();
                    // Strictly increasing: no duplicates, no reordering.
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                }
            })
        };

        writer.join().unwrap();
        stop.store(true, Ordering::Relaxed);
        purger.join().unwrap();
        reader.join().unwrap();

        registry.purge_dead();
        assert_eq!(registry.len(), 1000);
        assert_eq!(registry.live_count(), 1000);
    }
}
