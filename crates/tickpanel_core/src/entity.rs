//! # Entity Contract
//!
//! An entity is a trait object with three callbacks. The state every entity
//! shares (position and liveness) does not live in the trait object: it
//! lives in the [`Slot`] the registry owns, and callbacks reach it through
//! their context ([`Tick`] for logic and clicks, [`Draw`] for rendering).
//!
//! ```text
//!  Slot ──┬── id          (immutable)
//!         ├── alive       AtomicBool, readable without locking
//!         ├── position    RwLock, never held across a callback
//!         └── Mutex ───── Box<dyn Entity<S>>
//! ```
//!
//! A logical or click callback works on a private copy of the position,
//! published when the callback returns. Reading any slot's position, from
//! any thread or from inside a callback, never waits on a running callback.
//!
//! Liveness is one-way. Once an entity is marked dead it receives no further
//! logical or click callbacks; it may still be drawn until a purge removes
//! it from the registry.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::fault::EntityResult;
use crate::input::InputState;
use crate::registry::Registry;

/// Registry-unique identifier of an inserted entity.
///
/// Identifiers are handed out in insertion order and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of an entity on the panel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// The panel origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this position moved by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Euclidean distance to `other`.
    #[inline]
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The contract every entity satisfies.
///
/// `S` is the render surface handed to [`Entity::graphical_update`]. The
/// core never looks inside it.
///
/// A callback that returns `Err` is reported and skipped; the rest of the
/// pass still runs. A callback that panics takes the process down.
pub trait Entity<S: ?Sized + 'static>: Send + 'static {
    /// Draws the current state onto `surface`.
    ///
    /// Also called for entities that are dead but not yet purged.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity could not draw itself.
    fn graphical_update(&mut self, draw: &Draw, surface: &mut S) -> EntityResult;

    /// Advances one tick of simulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity could not advance.
    fn logical_update(&mut self, tick: &mut Tick<'_, S>) -> EntityResult;

    /// Reacts to a mouse press on the panel.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity could not handle the click.
    fn on_click_update(&mut self, tick: &mut Tick<'_, S>) -> EntityResult {
        let _ = tick;
        Ok(())
    }

    /// Short name used in logs and fault reports.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// An entity waiting to be inserted, with its starting state.
pub struct Spawn<S: ?Sized + 'static> {
    entity: Box<dyn Entity<S>>,
    position: Position,
    alive: bool,
}

impl<S: ?Sized + 'static> Spawn<S> {
    /// Wraps `entity`, starting alive at the origin.
    #[must_use]
    pub fn new<E: Entity<S>>(entity: E) -> Self {
        Self {
            entity: Box::new(entity),
            position: Position::ORIGIN,
            alive: true,
        }
    }

    /// Sets the starting position.
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    /// Inserts the entity already marked dead.
    #[must_use]
    pub fn dead(mut self) -> Self {
        self.alive = false;
        self
    }
}

/// A registry member: one entity plus its shared state.
///
/// Slots are handed out as `Arc<Slot<S>>` inside snapshots. Holding one
/// keeps the entity alive in memory even after it has been purged.
pub struct Slot<S: ?Sized + 'static> {
    id: EntityId,
    kind: &'static str,
    alive: AtomicBool,
    position: RwLock<Position>,
    entity: Mutex<Box<dyn Entity<S>>>,
}

impl<S: ?Sized + 'static> Slot<S> {
    pub(crate) fn new(id: EntityId, spawn: Spawn<S>) -> Self {
        Self {
            id,
            kind: spawn.entity.kind(),
            alive: AtomicBool::new(spawn.alive),
            position: RwLock::new(spawn.position),
            entity: Mutex::new(spawn.entity),
        }
    }

    /// Returns the entity's ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity's kind name.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns true once the entity has been marked dead.
    #[inline]
    #[must_use]
    pub fn is_dead(&self) -> bool {
        !self.alive.load(Ordering::Acquire)
    }

    /// Marks the entity dead. It stays in the registry until purged.
    #[inline]
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Returns the last published position.
    ///
    /// Never blocks on a running callback and is safe to call from inside
    /// any callback, on any slot. While this entity's own logical or click
    /// callback runs, the value is the position from before that callback;
    /// the callback sees its pending moves through [`Tick::position`].
    #[inline]
    #[must_use]
    pub fn position(&self) -> Position {
        *self.position.read()
    }

    /// Runs `logical_update`, unless the entity is dead.
    pub(crate) fn logical(
        &self,
        registry: &Registry<S>,
        input: &InputState,
    ) -> Option<EntityResult> {
        self.update(registry, input, |entity, tick| entity.logical_update(tick))
    }

    /// Runs `on_click_update`, unless the entity is dead.
    pub(crate) fn click(
        &self,
        registry: &Registry<S>,
        input: &InputState,
    ) -> Option<EntityResult> {
        self.update(registry, input, |entity, tick| entity.on_click_update(tick))
    }

    /// Liveness is checked under the entity lock, so a kill from another
    /// context is never followed by one more callback.
    fn update(
        &self,
        registry: &Registry<S>,
        input: &InputState,
        callback: impl FnOnce(&mut dyn Entity<S>, &mut Tick<'_, S>) -> EntityResult,
    ) -> Option<EntityResult> {
        let mut entity = self.entity.lock();
        if self.is_dead() {
            return None;
        }

        let mut position = self.position();
        let mut tick = Tick {
            id: self.id,
            position: &mut position,
            alive: &self.alive,
            input,
            registry,
        };
        let result = callback(&mut **entity, &mut tick);
        *self.position.write() = position;
        Some(result)
    }

    /// Runs the graphical callback.
    pub(crate) fn draw(&self, surface: &mut S) -> EntityResult {
        let mut entity = self.entity.lock();
        let draw = Draw {
            id: self.id,
            position: self.position(),
            dead: self.is_dead(),
        };
        entity.graphical_update(&draw, surface)
    }
}

impl<S: ?Sized + 'static> fmt::Debug for Slot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dead", &self.is_dead())
            .finish_non_exhaustive()
    }
}

/// Context for the logical and click callbacks.
///
/// Gives mutable access to the entity's own position and liveness, read
/// access to the input tracker, and a non-owning reference to the registry
/// the entity lives in.
pub struct Tick<'a, S: ?Sized + 'static> {
    id: EntityId,
    position: &'a mut Position,
    alive: &'a AtomicBool,
    input: &'a InputState,
    registry: &'a Registry<S>,
}

impl<'a, S: ?Sized + 'static> Tick<'a, S> {
    /// The entity being updated.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Position {
        *self.position
    }

    /// Current x coordinate.
    #[inline]
    #[must_use]
    pub fn x(&self) -> f64 {
        self.position.x
    }

    /// Current y coordinate.
    #[inline]
    #[must_use]
    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// Moves the entity to `position`.
    #[inline]
    pub fn set_position(&mut self, position: Position) {
        *self.position = position;
    }

    /// Sets the x coordinate.
    #[inline]
    pub fn set_x(&mut self, x: f64) {
        self.position.x = x;
    }

    /// Sets the y coordinate.
    #[inline]
    pub fn set_y(&mut self, y: f64) {
        self.position.y = y;
    }

    /// Moves the entity by `(dx, dy)`.
    #[inline]
    pub fn translate(&mut self, dx: f64, dy: f64) {
        *self.position = self.position.translated(dx, dy);
    }

    /// True if the entity was marked dead during this callback.
    #[inline]
    #[must_use]
    pub fn is_dead(&self) -> bool {
        !self.alive.load(Ordering::Acquire)
    }

    /// Marks the entity dead. No further logical or click callbacks follow.
    #[inline]
    pub fn mark_dead(&mut self) {
        self.alive.store(false, Ordering::Release);
    }

    /// The process-wide input tracker.
    #[inline]
    #[must_use]
    pub fn input(&self) -> &'a InputState {
        self.input
    }

    /// The registry this entity belongs to.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &'a Registry<S> {
        self.registry
    }

    /// Inserts a new entity. It joins from the next pass on.
    pub fn spawn(&self, spawn: Spawn<S>) -> EntityId {
        self.registry.insert_spawn(spawn)
    }
}

/// Context for the graphical callback: a read-only view of shared state.
#[derive(Clone, Copy, Debug)]
pub struct Draw {
    id: EntityId,
    position: Position,
    dead: bool,
}

impl Draw {
    /// The entity being drawn.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Position at the start of this draw.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// True if the entity is dead and waiting to be purged.
    #[inline]
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::EntityError;

    struct Mover {
        dx: f64,
    }

    impl Entity<Vec<EntityId>> for Mover {
        fn graphical_update(&mut self, draw: &Draw, surface: &mut Vec<EntityId>) -> EntityResult {
            surface.push(draw.id());
            Ok(())
        }

        fn logical_update(&mut self, tick: &mut Tick<'_, Vec<EntityId>>) -> EntityResult {
            tick.translate(self.dx, 0.0);
            if tick.x() >= 3.0 {
                tick.mark_dead();
            }
            Ok(())
        }
    }

    #[test]
    fn test_position_math() {
        let p = Position::new(3.0, 4.0);
        assert_eq!(p.translated(1.0, -1.0), Position::new(4.0, 3.0));
        assert!((Position::ORIGIN.distance_to(p) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::new(42).to_string(), "#42");
        assert_eq!(EntityId::new(42).raw(), 42);
    }

    #[test]
    fn test_spawn_state_carried_into_slot() {
        let slot: Slot<Vec<EntityId>> =
            Slot::new(EntityId::new(7), Spawn::new(Mover { dx: 1.0 }).at(2.0, 5.0).dead());
        assert_eq!(slot.id(), EntityId::new(7));
        assert_eq!(slot.position(), Position::new(2.0, 5.0));
        assert!(slot.is_dead());
        assert!(slot.kind().ends_with("Mover"));
    }

    #[test]
    fn test_tick_stops_after_self_kill() {
        let registry = Registry::new();
        let input = InputState::new();
        let slot: Slot<Vec<EntityId>> = Slot::new(EntityId::new(0), Spawn::new(Mover { dx: 1.5 }));

        assert!(slot.logical(&registry, &input).is_some());
        assert!(!slot.is_dead());
        assert!(slot.logical(&registry, &input).is_some());
        assert!(slot.is_dead());

        // Dead entities get no more logic or clicks.
        assert!(slot.logical(&registry, &input).is_none());
        assert!(slot.click(&registry, &input).is_none());
        assert_eq!(slot.position(), Position::new(3.0, 0.0));
    }

    #[test]
    fn test_click_runs_click_callback_only() {
        let registry = Registry::new();
        let input = InputState::new();
        let slot: Slot<Vec<EntityId>> = Slot::new(EntityId::new(0), Spawn::new(Mover { dx: 1.0 }));

        // Mover keeps the default click callback: nothing moves.
        assert!(matches!(slot.click(&registry, &input), Some(Ok(()))));
        assert_eq!(slot.position(), Position::ORIGIN);

        assert!(matches!(slot.logical(&registry, &input), Some(Ok(()))));
        assert_eq!(slot.position(), Position::new(1.0, 0.0));
    }

    /// Moves, then checks that its published position still lags the move.
    struct SelfReader;

    impl Entity<Vec<EntityId>> for SelfReader {
        fn graphical_update(&mut self, _draw: &Draw, _surface: &mut Vec<EntityId>) -> EntityResult {
            Ok(())
        }

        fn logical_update(&mut self, tick: &mut Tick<'_, Vec<EntityId>>) -> EntityResult {
            let before = tick.position();
            tick.translate(1.0, 0.0);
            let own = tick.id();
            for slot in &tick.registry().snapshot_ordered() {
                if slot.id() == own && slot.position() != before {
                    return Err(EntityError::failed("published position moved early"));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_own_position_readable_inside_callback() {
        let registry: Registry<Vec<EntityId>> = Registry::new();
        let input = InputState::new();
        registry.insert(SelfReader);
        let slot = registry.snapshot_ordered().get(0).cloned().unwrap();

        assert!(matches!(slot.logical(&registry, &input), Some(Ok(()))));
        assert!(matches!(slot.logical(&registry, &input), Some(Ok(()))));
        assert_eq!(slot.position(), Position::new(2.0, 0.0));
    }

    #[test]
    fn test_dead_slot_still_draws() {
        let slot: Slot<Vec<EntityId>> = Slot::new(EntityId::new(9), Spawn::new(Mover { dx: 0.0 }).dead());
        let mut surface = Vec::new();
        slot.draw(&mut surface).unwrap();
        assert_eq!(surface, vec![EntityId::new(9)]);
    }
}
