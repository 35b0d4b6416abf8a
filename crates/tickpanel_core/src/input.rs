//! # Input State Tracker
//!
//! Which keys and mouse buttons are currently held, and where the cursor
//! was last seen. Written by the input-event context, read by entities from
//! the tick and click passes.
//!
//! All three pieces sit behind one `RwLock` so a reader never sees a cursor
//! update without the button press that came with it.

use parking_lot::RwLock;

/// Host key identifier.
///
/// The core does not interpret key codes; the host maps its own key table
/// onto them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u32);

/// Host mouse button identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MouseButton(pub u16);

impl MouseButton {
    /// Primary (usually left) button.
    pub const PRIMARY: Self = Self(1);
    /// Middle button.
    pub const MIDDLE: Self = Self(2);
    /// Secondary (usually right) button.
    pub const SECONDARY: Self = Self(3);
}

/// A consistent copy of the tracker at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    /// Keys held, in press order.
    pub keys_down: Vec<KeyCode>,
    /// Buttons held, in press order.
    pub buttons_down: Vec<MouseButton>,
    /// Last known cursor position.
    pub cursor: (i32, i32),
}

impl InputSnapshot {
    /// True if `key` is held.
    #[must_use]
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// True if any key is held.
    #[must_use]
    pub fn is_any_key_down(&self) -> bool {
        !self.keys_down.is_empty()
    }

    /// True if `button` is held.
    #[must_use]
    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }
}

/// Process-wide input tracker.
///
/// Both sets are tiny (a handful of held keys at most), so they are plain
/// vectors kept free of duplicates.
#[derive(Debug, Default)]
pub struct InputState {
    inner: RwLock<InputSnapshot>,
}

/// Adds `item` if absent. Returns true if the set changed.
fn press<T: PartialEq>(set: &mut Vec<T>, item: T) -> bool {
    if set.contains(&item) {
        return false;
    }
    set.push(item);
    true
}

/// Removes `item` if present. Returns true if the set changed.
fn release<T: PartialEq>(set: &mut Vec<T>, item: &T) -> bool {
    match set.iter().position(|held| held == item) {
        Some(index) => {
            set.remove(index);
            true
        }
        None => false,
    }
}

impl InputState {
    /// Creates an empty tracker: nothing held, cursor at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key press. Repeated presses are ignored.
    ///
    /// Returns true if the key was not already held.
    pub fn record_key_down(&self, key: KeyCode) -> bool {
        press(&mut self.inner.write().keys_down, key)
    }

    /// Records a key release. Releasing a key that is not held is a no-op.
    ///
    /// Returns true if the key was held.
    pub fn record_key_up(&self, key: KeyCode) -> bool {
        release(&mut self.inner.write().keys_down, &key)
    }

    /// Records a mouse button press. Repeated presses are ignored.
    pub fn record_button_down(&self, button: MouseButton) -> bool {
        press(&mut self.inner.write().buttons_down, button)
    }

    /// Records a mouse button release.
    pub fn record_button_up(&self, button: MouseButton) -> bool {
        release(&mut self.inner.write().buttons_down, &button)
    }

    /// Overwrites the last known cursor position.
    pub fn record_cursor(&self, x: i32, y: i32) {
        self.inner.write().cursor = (x, y);
    }

    /// Records a button press together with the cursor position it
    /// happened at, in one write.
    pub fn record_press_at(&self, button: MouseButton, x: i32, y: i32) -> bool {
        let mut inner = self.inner.write();
        inner.cursor = (x, y);
        press(&mut inner.buttons_down, button)
    }

    /// Records a button release together with its cursor position.
    pub fn record_release_at(&self, button: MouseButton, x: i32, y: i32) -> bool {
        let mut inner = self.inner.write();
        inner.cursor = (x, y);
        release(&mut inner.buttons_down, &button)
    }

    /// True if `key` is held.
    #[must_use]
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.inner.read().is_key_down(key)
    }

    /// True if any key is held.
    #[must_use]
    pub fn is_any_key_down(&self) -> bool {
        self.inner.read().is_any_key_down()
    }

    /// True if `button` is held.
    #[must_use]
    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.inner.read().is_button_down(button)
    }

    /// Last known cursor position.
    #[must_use]
    pub fn cursor(&self) -> (i32, i32) {
        self.inner.read().cursor
    }

    /// Keys held, in press order.
    #[must_use]
    pub fn keys_down(&self) -> Vec<KeyCode> {
        self.inner.read().keys_down.clone()
    }

    /// Buttons held, in press order.
    #[must_use]
    pub fn buttons_down(&self) -> Vec<MouseButton> {
        self.inner.read().buttons_down.clone()
    }

    /// Copies the whole tracker in one read.
    #[must_use]
    pub fn snapshot(&self) -> InputSnapshot {
        self.inner.read().clone()
    }
}
