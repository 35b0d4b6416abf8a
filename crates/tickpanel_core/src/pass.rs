//! # Pass Drivers
//!
//! One pass is one sweep over a registry snapshot for one callback kind.
//!
//! | Pass      | Visits dead members | Driven by        |
//! |-----------|---------------------|------------------|
//! | Logical   | no                  | tick loop        |
//! | Click     | no                  | input context    |
//! | Graphical | yes                 | render loop      |
//!
//! Faults are isolated: a failing entity is reported and the pass moves on.

use crate::entity::Slot;
use crate::fault::{EntityResult, FaultReport, FaultSink};
use crate::input::InputState;
use crate::registry::Registry;

/// Which callback a pass invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// `logical_update`, once per tick.
    Logical,
    /// `graphical_update`, once per frame.
    Graphical,
    /// `on_click_update`, once per mouse press.
    Click,
}

impl PassKind {
    /// Lowercase name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Logical => "logical",
            Self::Graphical => "graphical",
            Self::Click => "click",
        }
    }
}

/// Outcome of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Entities whose callback ran.
    pub visited: usize,
    /// Dead entities skipped (logical and click passes only).
    pub skipped_dead: usize,
    /// Callbacks that returned an error.
    pub faults: usize,
}

impl PassReport {
    /// True if no callback failed.
    #[inline]
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.faults == 0
    }
}

/// Runs `logical_update` on every live member of a fresh snapshot.
pub fn logical_pass<S: ?Sized + 'static>(
    registry: &Registry<S>,
    input: &InputState,
    faults: &dyn FaultSink,
) -> PassReport {
    update_pass(PassKind::Logical, Slot::logical, registry, input, faults)
}

/// Runs `on_click_update` on every live member of a fresh snapshot.
pub fn click_pass<S: ?Sized + 'static>(
    registry: &Registry<S>,
    input: &InputState,
    faults: &dyn FaultSink,
) -> PassReport {
    update_pass(PassKind::Click, Slot::click, registry, input, faults)
}

fn update_pass<S: ?Sized + 'static>(
    kind: PassKind,
    update: fn(&Slot<S>, &Registry<S>, &InputState) -> Option<EntityResult>,
    registry: &Registry<S>,
    input: &InputState,
    faults: &dyn FaultSink,
) -> PassReport {
    let mut report = PassReport::default();
    registry.for_each_live(|slot| match update(slot, registry, input) {
        None => report.skipped_dead += 1,
        Some(result) => {
            report.visited += 1;
            if let Err(error) = result {
                report.faults += 1;
                faults.report(FaultReport {
                    entity: slot.id(),
                    kind: slot.kind(),
                    pass: kind,
                    error,
                });
            }
        }
    });
    report
}

/// Runs `graphical_update` on every member of a fresh snapshot, dead ones
/// included, in insertion order.
pub fn graphical_pass<S: ?Sized + 'static>(
    registry: &Registry<S>,
    surface: &mut S,
    faults: &dyn FaultSink,
) -> PassReport {
    let mut report = PassReport::default();
    registry.for_each_live(|slot| {
        report.visited += 1;
        if let Err(error) = slot.draw(surface) {
            report.faults += 1;
            faults.report(FaultReport {
                entity: slot.id(),
                kind: slot.kind(),
                pass: PassKind::Graphical,
                error,
            });
        }
    });
    report
}
