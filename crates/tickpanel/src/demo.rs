//! # Headless Demo
//!
//! Everything the `tickpanel` binary needs to run without a window:
//! - [`TextSurface`]: a render surface that records draw calls
//! - [`TextTarget`]: a render target publishing the last finished frame
//! - Demo entities: [`Wanderer`], [`Chaser`], [`Target`], [`Emitter`]
//! - [`spawn_synthetic_host`]: a thread feeding scripted input through the
//!   host event channel

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tickpanel_core::{
    Draw, Entity, EntityError, EntityId, EntityResult, KeyCode, MouseButton, Position, Registry,
    Spawn, Tick,
};

use crate::config::PanelConfig;
use crate::error::AppError;
use crate::host::{HostEvent, HostSender};
use crate::scheduler::RenderTarget;

/// One recorded draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    /// Who drew.
    pub entity: EntityId,
    /// What was drawn.
    pub glyph: char,
    /// Where.
    pub position: Position,
}

/// A surface that records draw calls instead of rasterizing.
#[derive(Clone, Debug, Default)]
pub struct TextSurface {
    width: u32,
    height: u32,
    calls: Vec<DrawCall>,
}

impl TextSurface {
    /// Creates an empty surface of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
        }
    }

    /// Records one glyph.
    pub fn draw(&mut self, draw: &Draw, glyph: char) {
        self.calls.push(DrawCall {
            entity: draw.id(),
            glyph,
            position: draw.position(),
        });
    }

    /// Draw calls since the last clear, in call order.
    #[must_use]
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Forgets every draw call.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Surface size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Renders the recorded calls into a `cols` x `rows` character grid.
    /// Later calls overwrite earlier ones; off-surface calls are dropped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_grid(&self, cols: usize, rows: usize) -> String {
        let mut grid = vec![vec!['.'; cols]; rows];
        if self.width > 0 && self.height > 0 {
            let sx = cols as f64 / f64::from(self.width);
            let sy = rows as f64 / f64::from(self.height);
            for call in &self.calls {
                let (x, y) = (call.position.x * sx, call.position.y * sy);
                if x < 0.0 || y < 0.0 {
                    continue;
                }
                let (col, row) = (x as usize, y as usize);
                if let Some(cell) = grid.get_mut(row).and_then(|line| line.get_mut(col)) {
                    *cell = call.glyph;
                }
            }
        }

        let mut out = String::with_capacity((cols + 1) * rows);
        for line in grid {
            out.extend(line);
            out.push('\n');
        }
        out
    }
}

/// Render target that draws into a private surface and publishes each
/// finished frame.
pub struct TextTarget {
    surface: TextSurface,
    latest: Arc<Mutex<TextSurface>>,
}

impl TextTarget {
    /// Creates a target sized like the panel.
    #[must_use]
    pub fn new(config: &PanelConfig) -> Self {
        let (width, height) = config.preferred_size();
        Self {
            surface: TextSurface::new(width, height),
            latest: Arc::new(Mutex::new(TextSurface::new(width, height))),
        }
    }

    /// Shared handle to the last finished frame.
    #[must_use]
    pub fn latest_frame(&self) -> Arc<Mutex<TextSurface>> {
        Arc::clone(&self.latest)
    }
}

impl RenderTarget<TextSurface> for TextTarget {
    fn with_surface(&mut self, draw: &mut dyn FnMut(&mut TextSurface)) {
        self.surface.clear();
        draw(&mut self.surface);
        std::mem::swap(&mut *self.latest.lock(), &mut self.surface);
    }
}

/// Drifts at a constant velocity and bounces off the panel edges.
#[derive(Clone, Copy, Debug)]
pub struct Wanderer {
    vx: f64,
    vy: f64,
    bounds: (f64, f64),
}

impl Wanderer {
    /// Creates a wanderer bounded by `config`'s panel size.
    #[must_use]
    pub fn new(vx: f64, vy: f64, config: &PanelConfig) -> Self {
        Self {
            vx,
            vy,
            bounds: (f64::from(config.width), f64::from(config.height)),
        }
    }
}

impl Entity<TextSurface> for Wanderer {
    fn graphical_update(&mut self, draw: &Draw, surface: &mut TextSurface) -> EntityResult {
        surface.draw(draw, if draw.is_dead() { 'x' } else { 'o' });
        Ok(())
    }

    fn logical_update(&mut self, tick: &mut Tick<'_, TextSurface>) -> EntityResult {
        let next = tick.position().translated(self.vx, self.vy);
        let (w, h) = self.bounds;
        if !(0.0..=w).contains(&next.x) {
            self.vx = -self.vx;
        }
        if !(0.0..=h).contains(&next.y) {
            self.vy = -self.vy;
        }
        tick.set_position(Position::new(next.x.clamp(0.0, w), next.y.clamp(0.0, h)));
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "wanderer"
    }
}

/// Walks toward the cursor while any key is held.
#[derive(Clone, Copy, Debug)]
pub struct Chaser {
    speed: f64,
}

impl Chaser {
    /// Creates a chaser covering `speed` pixels per tick.
    #[must_use]
    pub fn new(speed: f64) -> Self {
        Self { speed }
    }
}

impl Entity<TextSurface> for Chaser {
    fn graphical_update(&mut self, draw: &Draw, surface: &mut TextSurface) -> EntityResult {
        surface.draw(draw, '@');
        Ok(())
    }

    fn logical_update(&mut self, tick: &mut Tick<'_, TextSurface>) -> EntityResult {
        if !tick.input().is_any_key_down() {
            return Ok(());
        }
        let (cx, cy) = tick.input().cursor();
        let goal = Position::new(f64::from(cx), f64::from(cy));
        let here = tick.position();
        let distance = here.distance_to(goal);
        if !distance.is_finite() {
            return Err(EntityError::invalid_state("chaser left the plane"));
        }
        if distance <= self.speed {
            tick.set_position(goal);
        } else {
            let step = self.speed / distance;
            tick.translate((goal.x - here.x) * step, (goal.y - here.y) * step);
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "chaser"
    }
}

/// Dies when the panel is clicked within `radius` of it.
#[derive(Clone, Copy, Debug)]
pub struct Target {
    radius: f64,
}

impl Target {
    /// Creates a target with the given hit radius.
    #[must_use]
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl Entity<TextSurface> for Target {
    fn graphical_update(&mut self, draw: &Draw, surface: &mut TextSurface) -> EntityResult {
        surface.draw(draw, if draw.is_dead() { '*' } else { '+' });
        Ok(())
    }

    fn logical_update(&mut self, _tick: &mut Tick<'_, TextSurface>) -> EntityResult {
        Ok(())
    }

    fn on_click_update(&mut self, tick: &mut Tick<'_, TextSurface>) -> EntityResult {
        let (cx, cy) = tick.input().cursor();
        let hit = tick.position().distance_to(Position::new(f64::from(cx), f64::from(cy)));
        if hit <= self.radius {
            tick.mark_dead();
            tracing::debug!(entity = %tick.id(), "target hit");
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "target"
    }
}

/// Spawns a [`Target`] every `every` ticks at a pseudo-random spot.
#[derive(Clone, Copy, Debug)]
pub struct Emitter {
    every: u64,
    ticks: u64,
    seed: u64,
    bounds: (u32, u32),
}

impl Emitter {
    /// Creates an emitter seeded with `seed`.
    #[must_use]
    pub fn new(every: u64, seed: u64, config: &PanelConfig) -> Self {
        Self {
            every: every.max(1),
            ticks: 0,
            seed: seed | 1,
            bounds: config.preferred_size(),
        }
    }

    // xorshift64
    fn roll(&mut self) -> u64 {
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 7;
        self.seed ^= self.seed << 17;
        self.seed
    }
}

impl Entity<TextSurface> for Emitter {
    fn graphical_update(&mut self, _draw: &Draw, _surface: &mut TextSurface) -> EntityResult {
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn logical_update(&mut self, tick: &mut Tick<'_, TextSurface>) -> EntityResult {
        self.ticks += 1;
        if self.ticks % self.every == 0 {
            let x = self.roll() % u64::from(self.bounds.0.max(1));
            let y = self.roll() % u64::from(self.bounds.1.max(1));
            tick.spawn(Spawn::new(Target::new(24.0)).at(x as f64, y as f64));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "emitter"
    }
}

/// The demo's starting set: two wanderers, a chaser, three targets and an
/// emitter.
pub fn starting_entities(config: &PanelConfig) -> impl FnOnce(&Registry<TextSurface>) {
    let config = config.clone();
    move |registry: &Registry<TextSurface>| {
        let (w, h) = (f64::from(config.width), f64::from(config.height));
        registry.insert_spawn(Spawn::new(Wanderer::new(3.0, 2.0, &config)).at(w * 0.25, h * 0.25));
        registry.insert_spawn(Spawn::new(Wanderer::new(-2.0, 3.5, &config)).at(w * 0.75, h * 0.5));
        registry.insert_spawn(Spawn::new(Chaser::new(4.0)).at(w * 0.5, h * 0.5));
        for i in 1..=3 {
            let f = f64::from(i) / 4.0;
            registry.insert_spawn(Spawn::new(Target::new(24.0)).at(w * f, h * 0.8));
        }
        registry.insert(Emitter::new(50, 0x5eed, &config));
    }
}

/// Starts a thread that plays scripted input into `sender` until the
/// receiving side goes away.
///
/// The script sweeps the cursor around the panel, holds a key for part of
/// each lap and clicks once per lap.
///
/// # Errors
///
/// Returns [`AppError::Spawn`] if the thread cannot be started.
pub fn spawn_synthetic_host(
    sender: HostSender,
    config: &PanelConfig,
) -> Result<JoinHandle<()>, AppError> {
    const STEPS: i32 = 64;
    const KEY: KeyCode = KeyCode(32);

    let (w, h) = config.preferred_size();
    let (w, h) = (i32::try_from(w).unwrap_or(i32::MAX), i32::try_from(h).unwrap_or(i32::MAX));

    thread::Builder::new()
        .name("tickpanel-host".to_string())
        .spawn(move || {
            let mut lap = 0u64;
            loop {
                for step in 0..STEPS {
                    let x = w / STEPS * step;
                    let y = h / 2 + (h / 4) * if lap % 2 == 0 { 1 } else { -1 };
                    let mut events = vec![HostEvent::MouseMove { x, y }];
                    if step == 0 {
                        events.push(HostEvent::KeyDown(KEY));
                    }
                    if step == STEPS / 2 {
                        events.push(HostEvent::KeyUp(KEY));
                        events.push(HostEvent::MouseDown {
                            button: MouseButton::PRIMARY,
                            x,
                            y,
                        });
                        events.push(HostEvent::MouseUp {
                            button: MouseButton::PRIMARY,
                            x,
                            y,
                        });
                    }
                    for event in events {
                        if !sender.send_blocking(event) {
                            tracing::debug!(laps = lap, "synthetic host stopped");
                            return;
                        }
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                lap += 1;
            }
        })
        .map_err(|source| AppError::Spawn {
            context: "host",
            source,
        })
}
