//! # TickPanel Core
//!
//! The concurrent entity-lifecycle kernel:
//! - Polymorphic entities with position and liveness
//! - A process-wide input state tracker
//! - A copy-on-write entity registry, safe to iterate while mutating
//! - Pass drivers that isolate faulting entities
//!
//! ## Execution Contexts
//!
//! ```text
//!   input thread ──┐        tick thread ──┐
//!    (click pass)  │     (logical pass)   │
//!                  ▼                      ▼
//!           ┌─────────────────────────────────┐
//!           │            Registry             │
//!           │  RwLock<Arc<Vec<Arc<Slot>>>>    │
//!           └─────────────────────────────────┘
//!                  ▲                      ▲
//!   render thread ─┘        purge thread ─┘
//!  (graphical pass)         (purge_dead)
//! ```
//!
//! Every pass works on its own snapshot. Writers swap in a new vector under a
//! short write lock, so a pass in flight never sees a torn collection.
//!
//! ## Example
//!
//! ```rust
//! use tickpanel_core::{Entity, EntityResult, Draw, Tick, Registry, InputState, LogFaults, pass};
//!
//! struct Walker;
//!
//! impl Entity<Vec<f64>> for Walker {
//!     fn graphical_update(&mut self, draw: &Draw, surface: &mut Vec<f64>) -> EntityResult {
//!         surface.push(draw.position().x);
//!         Ok(())
//!     }
//!
//!     fn logical_update(&mut self, tick: &mut Tick<'_, Vec<f64>>) -> EntityResult {
//!         tick.translate(1.0, 0.0);
//!         Ok(())
//!     }
//! }
//!
//! let registry: Registry<Vec<f64>> = Registry::new();
//! registry.insert(Walker);
//! let input = InputState::new();
//! pass::logical_pass(&registry, &input, &LogFaults);
//!
//! let mut xs = Vec::new();
//! pass::graphical_pass(&registry, &mut xs, &LogFaults);
//! assert_eq!(xs, vec![1.0]);
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod entity;
pub mod fault;
pub mod input;
pub mod pass;
pub mod registry;

pub use entity::{Draw, Entity, EntityId, Position, Slot, Spawn, Tick};
pub use fault::{EntityError, EntityResult, FaultChannel, FaultReport, FaultSink, LogFaults};
pub use input::{InputSnapshot, InputState, KeyCode, MouseButton};
pub use pass::{PassKind, PassReport};
pub use registry::{Registry, Snapshot};
