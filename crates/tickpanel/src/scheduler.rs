//! # Scheduler
//!
//! Starts the execution contexts that drive a [`Panel`]:
//!
//! | Thread             | Loop                                        |
//! |--------------------|---------------------------------------------|
//! | `tickpanel-tick`   | logical pass every tick period              |
//! | `tickpanel-render` | graphical pass, back to back                |
//! | `tickpanel-purge`  | purge sweep, back to back (dedicated mode)  |
//! | `tickpanel-input`  | host events from the channel, if attached   |
//!
//! None of the loops waits on another. They only meet inside the registry
//! and the input tracker, both of which hold their locks briefly.
//!
//! ## Tick Timing
//!
//! ```text
//!  fire ──pass──┐              fire ──pass──────────────┐ fire
//!  │◄──────── period ────────►│◄──────── period ───────►│ (immediately:
//!  t0                          t1                        overdue)
//! ```
//!
//! The next firing is due one period after the previous one started.
//! Overdue firings are not queued: a tick that overruns is followed by
//! exactly one immediate tick, and the schedule drifts.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tickpanel_core::PassReport;

use crate::config::MAX_TICK_PERIOD_MS;
use crate::error::AppError;
use crate::host::HostReceiver;
use crate::panel::Panel;

/// How long the input thread waits for an event before rechecking shutdown.
const INPUT_POLL: Duration = Duration::from_millis(20);

/// Below this, [`TickLoop::wait_for_next_tick`] spins instead of sleeping.
const SPIN_THRESHOLD: Duration = Duration::from_micros(1000);

const MAX_TICK_PERIOD: Duration = Duration::from_millis(MAX_TICK_PERIOD_MS);

/// Where dead entities are removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// A dedicated thread sweeps continuously.
    #[default]
    Dedicated,
    /// The tick thread sweeps after every logical pass.
    AfterTick,
}

/// What a hot loop does between two iterations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdleStrategy {
    /// Busy-spin with a CPU hint.
    Spin,
    /// Give up the rest of the time slice.
    #[default]
    Yield,
    /// Sleep for a fixed time.
    Sleep {
        /// Sleep length in microseconds.
        micros: u64,
    },
}

impl IdleStrategy {
    /// Idles once.
    #[inline]
    pub fn idle(self) {
        match self {
            Self::Spin => std::hint::spin_loop(),
            Self::Yield => thread::yield_now(),
            Self::Sleep { micros } => thread::sleep(Duration::from_micros(micros)),
        }
    }
}

/// The surface provider for the render loop.
///
/// Once per frame the render loop asks for a surface and hands it, unchanged,
/// to every entity's graphical callback.
pub trait RenderTarget<S: ?Sized + 'static>: Send + 'static {
    /// Calls `draw` with this frame's surface.
    fn with_surface(&mut self, draw: &mut dyn FnMut(&mut S));
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Shortest logical pass, in microseconds.
    pub min_tick_us: u64,
    /// Longest logical pass, in microseconds.
    pub max_tick_us: u64,
    /// Rolling average logical pass, in microseconds.
    pub avg_tick_us: u64,
    /// Passes that took longer than one period.
    pub late_ticks: u64,
    /// Passes measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn new(period: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: micros(period),
            late_ticks: 0,
            total_ticks: 0,
        }
    }

    fn record(&mut self, duration: Duration, period: Duration) {
        let us = micros(duration);
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.min_tick_us = self.min_tick_us.min(us);
        self.max_tick_us = self.max_tick_us.max(us);
        let avg = (u128::from(self.avg_tick_us) * 15 + u128::from(us)) / 16;
        self.avg_tick_us = u64::try_from(avg).unwrap_or(u64::MAX);
        if duration > period {
            self.late_ticks = self.late_ticks.saturating_add(1);
        }
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Fixed-delay tick controller.
///
/// Steppable: the tick thread calls [`fire`](Self::fire) then
/// [`wait_for_next_tick`](Self::wait_for_next_tick) in a loop, and tests can
/// fire an exact number of times without any thread.
#[derive(Debug)]
pub struct TickLoop {
    period: Duration,
    next_due: Option<Instant>,
    tick_count: u64,
    stats: TickStats,
}

impl TickLoop {
    /// Creates a tick loop with the given period. The first firing is due
    /// immediately.
    ///
    /// Periods longer than [`MAX_TICK_PERIOD_MS`] are clamped to it.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let period = period.min(MAX_TICK_PERIOD);
        Self {
            period,
            next_due: None,
            tick_count: 0,
            stats: TickStats::new(period),
        }
    }

    /// Runs one logical pass now and schedules the next firing one period
    /// after this one started.
    pub fn fire<S: ?Sized + 'static>(&mut self, panel: &Panel<S>) -> PassReport {
        let start = Instant::now();
        self.next_due = Some(start.checked_add(self.period).unwrap_or(start));
        self.tick_count += 1;

        let report = panel.logical_update_all();
        self.stats.record(start.elapsed(), self.period);
        report
    }

    /// Time left until the next firing is due. Zero if overdue.
    #[must_use]
    pub fn until_next_tick(&self) -> Duration {
        self.next_due
            .map_or(Duration::ZERO, |due| due.saturating_duration_since(Instant::now()))
    }

    /// Blocks until the next firing is due. Returns at once if overdue.
    ///
    /// Sleeps for most of the wait and spins for the last stretch.
    pub fn wait_for_next_tick(&self) {
        let Some(due) = self.next_due else {
            return;
        };
        let remaining = due.saturating_duration_since(Instant::now());
        if remaining > SPIN_THRESHOLD {
            thread::sleep(remaining - SPIN_THRESHOLD / 2);
        }
        while Instant::now() < due {
            std::hint::spin_loop();
        }
    }

    /// Firings so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// The configured period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    frames: AtomicU64,
    purge_sweeps: AtomicU64,
    purged: AtomicU64,
    clicks: AtomicU64,
    host_events: AtomicU64,
    faults: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LoopCounters {
        LoopCounters {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            purge_sweeps: self.purge_sweeps.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            clicks: self.clicks.load(Ordering::Relaxed),
            host_events: self.host_events.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the scheduler's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopCounters {
    /// Logical passes run.
    pub ticks: u64,
    /// Graphical passes run.
    pub frames: u64,
    /// Purge sweeps run.
    pub purge_sweeps: u64,
    /// Entities purged.
    pub purged: u64,
    /// Click passes run from channel events.
    pub clicks: u64,
    /// Host events delivered from the channel.
    pub host_events: u64,
    /// Entity callback faults across all passes.
    pub faults: u64,
}

/// Builds and starts the execution contexts for one panel.
pub struct Scheduler<S: ?Sized + 'static, T> {
    panel: Arc<Panel<S>>,
    target: T,
    host_events: Option<HostReceiver>,
}

impl<S, T> Scheduler<S, T>
where
    S: ?Sized + 'static,
    T: RenderTarget<S>,
{
    /// Prepares a scheduler rendering into `target`.
    pub fn new(panel: Arc<Panel<S>>, target: T) -> Self {
        Self {
            panel,
            target,
            host_events: None,
        }
    }

    /// Attaches a host event channel; an input thread drains it.
    #[must_use]
    pub fn with_host_events(mut self, receiver: HostReceiver) -> Self {
        self.host_events = Some(receiver);
        self
    }

    /// Starts every loop.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] if a thread cannot be started. Threads
    /// already running are stopped and joined first.
    pub fn start(self) -> Result<SchedulerHandle, AppError> {
        let Self {
            panel,
            mut target,
            host_events,
        } = self;
        let config = panel.config().clone();
        let mut handle = SchedulerHandle {
            shutdown: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            threads: Vec::with_capacity(4),
        };

        tracing::info!(
            tick_period_ms = config.tick_period_ms,
            purge = ?config.purge,
            idle = ?config.idle,
            host_channel = host_events.is_some(),
            "starting scheduler"
        );

        // Tick
        {
            let panel = Arc::clone(&panel);
            let shutdown = Arc::clone(&handle.shutdown);
            let counters = Arc::clone(&handle.counters);
            let purge_after_tick = config.purge == PurgeMode::AfterTick;
            let mut tick_loop = TickLoop::new(config.tick_period());
            handle.spawn("tick", move || {
                while !shutdown.load(Ordering::Acquire) {
                    let report = tick_loop.fire(&panel);
                    Counters::bump(&counters.ticks);
                    Counters::add(&counters.faults, report.faults);

                    if purge_after_tick {
                        let purged = panel.purge_dead_entities();
                        Counters::bump(&counters.purge_sweeps);
                        Counters::add(&counters.purged, purged);
                    }
                    tick_loop.wait_for_next_tick();
                }
                let stats = tick_loop.stats();
                tracing::debug!(
                    ticks = tick_loop.tick_count(),
                    avg_us = stats.avg_tick_us,
                    max_us = stats.max_tick_us,
                    late = stats.late_ticks,
                    "tick loop stopped"
                );
            })?;
        }

        // Render
        {
            let panel = Arc::clone(&panel);
            let shutdown = Arc::clone(&handle.shutdown);
            let counters = Arc::clone(&handle.counters);
            let idle = config.idle;
            handle.spawn("render", move || {
                while !shutdown.load(Ordering::Acquire) {
                    target.with_surface(&mut |surface: &mut S| {
                        let report = panel.graphical_update_all(surface);
                        Counters::add(&counters.faults, report.faults);
                    });
                    Counters::bump(&counters.frames);
                    idle.idle();
                }
                tracing::debug!("render loop stopped");
            })?;
        }

        // Purge
        if config.purge == PurgeMode::Dedicated {
            let panel = Arc::clone(&panel);
            let shutdown = Arc::clone(&handle.shutdown);
            let counters = Arc::clone(&handle.counters);
            let idle = config.idle;
            handle.spawn("purge", move || {
                while !shutdown.load(Ordering::Acquire) {
                    let purged = panel.purge_dead_entities();
                    Counters::bump(&counters.purge_sweeps);
                    Counters::add(&counters.purged, purged);
                    idle.idle();
                }
                tracing::debug!("purge loop stopped");
            })?;
        }

        // Input
        if let Some(receiver) = host_events {
            let panel = Arc::clone(&panel);
            let shutdown = Arc::clone(&handle.shutdown);
            let counters = Arc::clone(&handle.counters);
            handle.spawn("input", move || {
                while !shutdown.load(Ordering::Acquire) {
                    match receiver.recv_timeout(INPUT_POLL) {
                        Ok(Some(event)) => {
                            Counters::bump(&counters.host_events);
                            if let Some(report) = panel.dispatch(event) {
                                Counters::bump(&counters.clicks);
                                Counters::add(&counters.faults, report.faults);
                            }
                        }
                        Ok(None) => {}
                        Err(()) => {
                            tracing::debug!("host event channel closed");
                            break;
                        }
                    }
                }
                tracing::debug!("input loop stopped");
            })?;
        }

        Ok(handle)
    }
}

/// Handle to the running loops.
///
/// Dropping the handle leaves the loops running until the process exits.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    fn spawn<F>(&mut self, context: &'static str, body: F) -> Result<(), AppError>
    where
        F: FnOnce() + Send + 'static,
    {
        let spawned = thread::Builder::new()
            .name(format!("tickpanel-{context}"))
            .spawn(body);

        match spawned {
            Ok(thread) => {
                self.threads.push((context, thread));
                Ok(())
            }
            Err(source) => {
                tracing::error!(context, error = %source, "failed to spawn thread");
                self.shutdown();
                for (_, thread) in self.threads.drain(..) {
                    let _ = thread.join();
                }
                Err(AppError::Spawn { context, source })
            }
        }
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> LoopCounters {
        self.counters.snapshot()
    }

    /// Names of the running contexts, in start order.
    #[must_use]
    pub fn contexts(&self) -> Vec<&'static str> {
        self.threads.iter().map(|(context, _)| *context).collect()
    }

    /// Asks every loop to stop after its current iteration.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// True until [`shutdown`](Self::shutdown) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    /// Waits for every loop to stop. Blocks forever unless
    /// [`shutdown`](Self::shutdown) was called or is called from elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ThreadPanicked`] naming the first context that
    /// panicked. Every thread is joined either way.
    pub fn join(self) -> Result<(), AppError> {
        let mut result = Ok(());
        for (context, thread) in self.threads {
            if thread.join().is_err() && result.is_ok() {
                result = Err(AppError::ThreadPanicked { context });
            }
        }
        let counters = self.counters.snapshot();
        tracing::info!(
            ticks = counters.ticks,
            frames = counters.frames,
            purged = counters.purged,
            faults = counters.faults,
            "scheduler stopped"
        );
        result
    }

    /// Stops every loop and waits for them.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    pub fn stop(self) -> Result<(), AppError> {
        self.shutdown();
        self.join()
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("running", &self.is_running())
            .field("contexts", &self.contexts())
            .field("counters", &self.counters())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use tickpanel_core::{Draw, Entity, EntityResult, Registry, Tick};

    struct Step;

    impl Entity<()> for Step {
        fn graphical_update(&mut self, _draw: &Draw, _surface: &mut ()) -> EntityResult {
            Ok(())
        }

        fn logical_update(&mut self, tick: &mut Tick<'_, ()>) -> EntityResult {
            tick.translate(1.0, 0.0);
            Ok(())
        }
    }

    struct Unit;

    impl RenderTarget<()> for Unit {
        fn with_surface(&mut self, draw: &mut dyn FnMut(&mut ())) {
            draw(&mut ());
        }
    }

    fn panel() -> Arc<Panel<()>> {
        Panel::new(PanelConfig::default(), |registry: &Registry<()>| {
            registry.insert(Step);
        })
    }

    #[test]
    fn test_idle_strategy_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            idle: IdleStrategy,
            purge: PurgeMode,
        }

        let parsed: Wrapper =
            toml::from_str("purge = \"after_tick\"\n[idle]\nkind = \"sleep\"\nmicros = 5\n").unwrap();
        assert_eq!(parsed.idle, IdleStrategy::Sleep { micros: 5 });
        assert_eq!(parsed.purge, PurgeMode::AfterTick);
    }

    #[test]
    fn test_tick_loop_fire_is_steppable() {
        let panel = panel();
        let mut tick_loop = TickLoop::new(Duration::from_millis(1));
        assert_eq!(tick_loop.until_next_tick(), Duration::ZERO);

        for _ in 0..5 {
            tick_loop.fire(&panel);
            tick_loop.wait_for_next_tick();
        }

        assert_eq!(tick_loop.tick_count(), 5);
        assert_eq!(tick_loop.stats().total_ticks, 5);
        assert!(tick_loop.stats().min_tick_us <= tick_loop.stats().max_tick_us);
        let x = panel.registry().snapshot_ordered().get(0).unwrap().position().x;
        assert_eq!(x, 5.0);
    }

    #[test]
    fn test_wait_respects_period() {
        let panel = panel();
        let mut tick_loop = TickLoop::new(Duration::from_millis(5));
        let start = Instant::now();
        tick_loop.fire(&panel);
        tick_loop.wait_for_next_tick();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_overdue_tick_fires_immediately() {
        let panel = panel();
        let mut tick_loop = TickLoop::new(Duration::from_millis(1));
        tick_loop.fire(&panel);
        thread::sleep(Duration::from_millis(3));
        assert_eq!(tick_loop.until_next_tick(), Duration::ZERO);

        let start = Instant::now();
        tick_loop.wait_for_next_tick();
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[test]
    fn test_huge_period_is_clamped() {
        let panel = panel();
        let mut tick_loop = TickLoop::new(Duration::MAX);
        tick_loop.fire(&panel);
        assert!(tick_loop.until_next_tick() <= MAX_TICK_PERIOD);
        assert!(tick_loop.until_next_tick() > Duration::ZERO);
        assert_eq!(tick_loop.stats().late_ticks, 0);
    }

    #[test]
    fn test_stats_survive_extreme_durations() {
        let mut stats = TickStats::new(Duration::MAX);
        assert_eq!(stats.avg_tick_us, u64::MAX);

        stats.record(Duration::MAX, Duration::from_millis(1));
        assert_eq!(stats.avg_tick_us, u64::MAX);
        assert_eq!(stats.max_tick_us, u64::MAX);
        assert_eq!(stats.late_ticks, 1);

        stats.record(Duration::ZERO, Duration::from_millis(1));
        assert_eq!(stats.avg_tick_us, 17_293_822_569_102_704_639);
        assert_eq!(stats.min_tick_us, 0);
        assert_eq!(stats.total_ticks, 2);
    }

    #[test]
    fn test_scheduler_starts_and_stops() {
        let handle = Scheduler::new(panel(), Unit).start().unwrap();
        assert_eq!(handle.contexts(), vec!["tick", "render", "purge"]);
        assert!(handle.is_running());

        thread::sleep(Duration::from_millis(50));
        let counters = handle.counters();
        assert!(counters.ticks >= 1);
        assert!(counters.frames >= 1);
        assert!(counters.purge_sweeps >= 1);

        handle.stop().unwrap();
    }
}
