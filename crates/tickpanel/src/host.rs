//! # Host Event Channel
//!
//! A windowing collaborator can call the [`Panel`](crate::Panel) entry points
//! directly from its own thread, or push [`HostEvent`]s into this channel and
//! let the scheduler's input thread deliver them.
//!
//! ```text
//! Host thread ──HostSender──► [bounded queue] ──HostReceiver──► tickpanel-input
//!                                                                 │
//!                                                                 └─► Panel::dispatch
//! ```

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tickpanel_core::{KeyCode, MouseButton};

/// One event from the host windowing system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    /// A key went down.
    KeyDown(KeyCode),
    /// A key came up.
    KeyUp(KeyCode),
    /// A mouse button was pressed at `(x, y)`.
    MouseDown {
        /// Which button.
        button: MouseButton,
        /// Cursor x.
        x: i32,
        /// Cursor y.
        y: i32,
    },
    /// A mouse button was released at `(x, y)`.
    MouseUp {
        /// Which button.
        button: MouseButton,
        /// Cursor x.
        x: i32,
        /// Cursor y.
        y: i32,
    },
    /// The cursor moved.
    MouseMove {
        /// Cursor x.
        x: i32,
        /// Cursor y.
        y: i32,
    },
}

/// Creates a bounded host event channel.
#[must_use]
pub fn channel(capacity: usize) -> (HostSender, HostReceiver) {
    let (sender, receiver) = bounded(capacity);
    (HostSender { sender }, HostReceiver { receiver })
}

/// Handle the host pushes events through.
#[derive(Clone, Debug)]
pub struct HostSender {
    sender: Sender<HostEvent>,
}

impl HostSender {
    /// Sends an event without blocking.
    ///
    /// Returns `false` if the queue is full or the input thread is gone; the
    /// event is dropped.
    #[inline]
    pub fn send(&self, event: HostEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::debug!(?event, "host event queue full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Sends an event, waiting for room in the queue.
    ///
    /// Returns `false` only if the input thread is gone.
    #[inline]
    pub fn send_blocking(&self, event: HostEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Handle the input thread drains.
#[derive(Clone, Debug)]
pub struct HostReceiver {
    receiver: Receiver<HostEvent>,
}

impl HostReceiver {
    /// Takes every pending event without blocking.
    #[inline]
    pub fn drain(&self) -> Vec<HostEvent> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Waits up to `timeout` for one event.
    ///
    /// `Err(())` means every sender is gone.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Option<HostEvent>, ()> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_drain_in_order() {
        let (sender, receiver) = channel(8);
        assert!(sender.send(HostEvent::KeyDown(KeyCode(65))));
        assert!(sender.send(HostEvent::MouseMove { x: 3, y: 4 }));
        assert!(sender.send(HostEvent::KeyUp(KeyCode(65))));
        assert_eq!(receiver.pending(), 3);

        assert_eq!(
            receiver.drain(),
            vec![
                HostEvent::KeyDown(KeyCode(65)),
                HostEvent::MouseMove { x: 3, y: 4 },
                HostEvent::KeyUp(KeyCode(65)),
            ]
        );
        assert_eq!(receiver.pending(), 0);
    }

    #[test]
    fn test_full_queue_drops() {
        let (sender, receiver) = channel(1);
        assert!(sender.send(HostEvent::KeyDown(KeyCode(1))));
        assert!(!sender.send(HostEvent::KeyDown(KeyCode(2))));
        assert_eq!(receiver.drain(), vec![HostEvent::KeyDown(KeyCode(1))]);
    }

    #[test]
    fn test_disconnect_is_reported() {
        let (sender, receiver) = channel(1);
        drop(receiver);
        assert!(!sender.send(HostEvent::KeyDown(KeyCode(1))));
        assert!(!sender.send_blocking(HostEvent::KeyDown(KeyCode(1))));

        let (sender, receiver) = channel(1);
        drop(sender);
        assert_eq!(receiver.recv_timeout(Duration::from_millis(1)), Err(()));
    }

    #[test]
    fn test_recv_timeout_empty() {
        let (_sender, receiver) = channel(1);
        assert_eq!(receiver.recv_timeout(Duration::from_millis(1)), Ok(None));
    }
}
