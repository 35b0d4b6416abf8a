//! # TickPanel
//!
//! A real-time panel of entities driven by independent execution contexts:
//! a fixed-period tick, a continuous render loop, a continuous purge loop and
//! host input.
//!
//! ```text
//!            ┌──────────────── Arc<Panel<S>> ────────────────┐
//!            │  PanelConfig   Registry<S>   InputState  Faults│
//!            └──────▲─────────────▲─────────────▲────────▲───┘
//!                   │             │             │        │
//!   tickpanel-tick ─┘  tickpanel-render  tickpanel-purge  tickpanel-input
//!   (TickLoop)         (RenderTarget)    (IdleStrategy)   (HostReceiver)
//! ```
//!
//! The entity kernel lives in `tickpanel_core` and is re-exported here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tickpanel::demo::{starting_entities, TextTarget};
//! use tickpanel::{host, Panel, PanelConfig, Scheduler};
//!
//! # fn main() -> Result<(), tickpanel::AppError> {
//! let config = PanelConfig::default();
//! let panel = Panel::new(config.clone(), starting_entities(&config));
//! let (sender, receiver) = host::channel(config.host_event_capacity);
//!
//! let handle = Scheduler::new(panel, TextTarget::new(&config))
//!     .with_host_events(receiver)
//!     .start()?;
//! sender.send(tickpanel::HostEvent::MouseMove { x: 10, y: 20 });
//! handle.stop()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod demo;
pub mod error;
pub mod host;
pub mod logging;
pub mod panel;
pub mod scheduler;

pub use config::{PanelConfig, CONFIG_ENV, MAX_TICK_PERIOD_MS};
pub use error::{AppError, ConfigError};
pub use host::{HostEvent, HostReceiver, HostSender};
pub use logging::init_tracing;
pub use panel::{NoStartingEntities, Panel, StartingEntities};
pub use scheduler::{
    IdleStrategy, LoopCounters, PurgeMode, RenderTarget, Scheduler, SchedulerHandle, TickLoop,
    TickStats,
};

pub use tickpanel_core::{
    Draw, Entity, EntityError, EntityId, EntityResult, FaultChannel, FaultReport, FaultSink,
    InputState, KeyCode, LogFaults, MouseButton, PassKind, PassReport, Position, Registry, Spawn,
    Tick,
};
