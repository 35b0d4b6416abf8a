//! Headless TickPanel demo.
//!
//! Usage: `tickpanel [config.toml]`. Without an argument the path is read
//! from `TICKPANEL_CONFIG`; without either, defaults are used.

use std::process::ExitCode;
use std::thread;

use tickpanel::demo::{spawn_synthetic_host, starting_entities, TextTarget};
use tickpanel::{host, init_tracing, AppError, Panel, PanelConfig, Scheduler, CONFIG_ENV};

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "tickpanel failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<PanelConfig, AppError> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV));
    match path {
        Some(path) => {
            tracing::info!(path = %path.to_string_lossy(), "loading config");
            Ok(PanelConfig::from_path(path)?)
        }
        None => Ok(PanelConfig::default()),
    }
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    let (width, height) = config.preferred_size();
    tracing::info!(title = %config.title, width, height, visible = config.visible, "opening panel");

    let panel = Panel::new(config.clone(), starting_entities(&config));
    let target = TextTarget::new(&config);
    let latest = target.latest_frame();
    let (sender, receiver) = host::channel(config.host_event_capacity);

    let handle = Scheduler::new(panel, target)
        .with_host_events(receiver)
        .start()?;
    let host = spawn_synthetic_host(sender, &config)?;

    let Some(run_for) = config.run_for() else {
        // Runs until the process is killed.
        return handle.join();
    };
    thread::sleep(run_for);

    let counters = handle.counters();
    handle.stop()?;
    if host.join().is_err() {
        return Err(AppError::ThreadPanicked { context: "host" });
    }

    tracing::info!(
        ticks = counters.ticks,
        frames = counters.frames,
        purge_sweeps = counters.purge_sweeps,
        purged = counters.purged,
        clicks = counters.clicks,
        host_events = counters.host_events,
        faults = counters.faults,
        "demo finished"
    );
    let frame = latest.lock();
    tracing::info!(draw_calls = frame.calls().len(), "last frame\n{}", frame.to_grid(40, 20));
    Ok(())
}
