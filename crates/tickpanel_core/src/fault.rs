//! # Entity Faults
//!
//! A failing callback never aborts a pass. The pass driver wraps the error
//! in a [`FaultReport`] and hands it to a [`FaultSink`], then moves on to the
//! next entity.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::entity::EntityId;
use crate::pass::PassKind;

/// Errors an entity callback can return.
#[derive(Error, Debug)]
pub enum EntityError {
    /// The callback could not complete.
    #[error("callback failed: {reason}")]
    Failed {
        /// What went wrong.
        reason: String,
    },

    /// The entity found itself in a state it cannot continue from.
    #[error("invalid entity state: {reason}")]
    InvalidState {
        /// Description of the bad state.
        reason: String,
    },

    /// Error raised by code the entity called into.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl EntityError {
    /// Shorthand for [`EntityError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EntityError::InvalidState`].
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}

/// Result type for entity callbacks.
pub type EntityResult = Result<(), EntityError>;

/// One isolated callback failure.
#[derive(Debug)]
pub struct FaultReport {
    /// The entity whose callback failed.
    pub entity: EntityId,
    /// The entity's kind name.
    pub kind: &'static str,
    /// Which pass was running.
    pub pass: PassKind,
    /// The error the callback returned.
    pub error: EntityError,
}

/// Observability collaborator that receives isolated faults.
///
/// Called from whichever execution context ran the pass, so it must be
/// cheap and must not block.
pub trait FaultSink: Send + Sync {
    /// Records one fault.
    fn report(&self, fault: FaultReport);
}

/// Logs every fault at `warn` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFaults;

impl FaultSink for LogFaults {
    fn report(&self, fault: FaultReport) {
        tracing::warn!(
            entity = %fault.entity,
            kind = fault.kind,
            pass = ?fault.pass,
            error = %fault.error,
            "entity callback failed"
        );
    }
}

/// Forwards faults into a bounded channel for an observer to drain.
///
/// Faults that arrive while the channel is full are logged and dropped;
/// a pass never waits on the observer.
#[derive(Clone)]
pub struct FaultChannel {
    sender: Sender<FaultReport>,
    receiver: Receiver<FaultReport>,
}

impl FaultChannel {
    /// Creates a channel holding at most `capacity` undrained faults.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Takes every pending fault.
    #[must_use]
    pub fn drain(&self) -> Vec<FaultReport> {
        self.receiver.try_iter().collect()
    }

    /// Number of faults waiting to be drained.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl FaultSink for FaultChannel {
    fn report(&self, fault: FaultReport) {
        match self.sender.try_send(fault) {
            Ok(()) => {}
            Err(TrySendError::Full(fault) | TrySendError::Disconnected(fault)) => {
                LogFaults.report(fault);
            }
        }
    }
}
