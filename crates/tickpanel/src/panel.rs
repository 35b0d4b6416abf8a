//! # Panel
//!
//! The application context: one registry, one input tracker, one fault sink
//! and the configuration, built once and shared by every execution context.
//! There is no global state; everything reaches the panel through an `Arc`.

use std::sync::Arc;

use tickpanel_core::{
    pass, FaultSink, InputState, KeyCode, LogFaults, MouseButton, PassReport, Registry,
};

use crate::config::PanelConfig;
use crate::host::HostEvent;

/// Populates the registry once, before any loop starts.
pub trait StartingEntities<S: ?Sized + 'static> {
    /// Inserts the starting set.
    fn populate(self, registry: &Registry<S>);
}

impl<S: ?Sized + 'static, F> StartingEntities<S> for F
where
    F: FnOnce(&Registry<S>),
{
    fn populate(self, registry: &Registry<S>) {
        self(registry);
    }
}

/// Starts with an empty registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStartingEntities;

impl<S: ?Sized + 'static> StartingEntities<S> for NoStartingEntities {
    fn populate(self, _registry: &Registry<S>) {}
}

/// Shared application context.
pub struct Panel<S: ?Sized + 'static> {
    config: PanelConfig,
    registry: Registry<S>,
    input: InputState,
    faults: Arc<dyn FaultSink>,
}

impl<S: ?Sized + 'static> Panel<S> {
    /// Builds the panel and runs the initialization collaborator. Faults are
    /// logged.
    pub fn new(config: PanelConfig, starting: impl StartingEntities<S>) -> Arc<Self> {
        Self::with_fault_sink(config, starting, Arc::new(LogFaults))
    }

    /// Builds the panel with a custom fault sink.
    pub fn with_fault_sink(
        config: PanelConfig,
        starting: impl StartingEntities<S>,
        faults: Arc<dyn FaultSink>,
    ) -> Arc<Self> {
        let registry = Registry::new();
        starting.populate(&registry);
        tracing::info!(
            title = %config.title,
            entities = registry.len(),
            "panel initialized"
        );

        Arc::new(Self {
            config,
            registry,
            input: InputState::new(),
            faults,
        })
    }

    /// The entity registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// The input tracker.
    #[inline]
    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// The configuration the panel was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// The fault sink every pass reports to.
    #[inline]
    #[must_use]
    pub fn faults(&self) -> &dyn FaultSink {
        &*self.faults
    }

    /// One logical pass over every live entity.
    pub fn logical_update_all(&self) -> PassReport {
        pass::logical_pass(&self.registry, &self.input, self.faults())
    }

    /// One graphical pass over every entity, dead ones included.
    pub fn graphical_update_all(&self, surface: &mut S) -> PassReport {
        pass::graphical_pass(&self.registry, surface, self.faults())
    }

    /// One click pass over every live entity.
    pub fn on_click_update_all(&self) -> PassReport {
        pass::click_pass(&self.registry, &self.input, self.faults())
    }

    /// Removes every dead entity. Returns how many were removed.
    pub fn purge_dead_entities(&self) -> usize {
        self.registry.purge_dead()
    }

    /// Host entry point: a key went down.
    pub fn on_key_down(&self, key: KeyCode) {
        if self.input.record_key_down(key) {
            tracing::trace!(key = key.0, "key down");
        }
    }

    /// Host entry point: a key came up.
    pub fn on_key_up(&self, key: KeyCode) {
        if self.input.record_key_up(key) {
            tracing::trace!(key = key.0, "key up");
        }
    }

    /// Host entry point: a mouse button was pressed.
    ///
    /// Records the press and cursor, then runs a click pass on this thread.
    pub fn on_mouse_down(&self, button: MouseButton, x: i32, y: i32) -> PassReport {
        self.input.record_press_at(button, x, y);
        let report = self.on_click_update_all();
        tracing::trace!(button = button.0, x, y, visited = report.visited, "mouse down");
        report
    }

    /// Host entry point: a mouse button was released. No click pass runs.
    pub fn on_mouse_up(&self, button: MouseButton, x: i32, y: i32) {
        self.input.record_release_at(button, x, y);
    }

    /// Host entry point: the cursor moved.
    pub fn on_mouse_move(&self, x: i32, y: i32) {
        self.input.record_cursor(x, y);
    }

    /// Routes one host event to its entry point. Returns the click pass
    /// report for mouse presses.
    pub fn dispatch(&self, event: HostEvent) -> Option<PassReport> {
        match event {
            HostEvent::KeyDown(key) => self.on_key_down(key),
            HostEvent::KeyUp(key) => self.on_key_up(key),
            HostEvent::MouseDown { button, x, y } => return Some(self.on_mouse_down(button, x, y)),
            HostEvent::MouseUp { button, x, y } => self.on_mouse_up(button, x, y),
            HostEvent::MouseMove { x, y } => self.on_mouse_move(x, y),
        }
        None
    }
}

impl<S: ?Sized + 'static> std::fmt::Debug for Panel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}
