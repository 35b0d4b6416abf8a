//! Tracing bootstrap for binaries embedding a panel.
//!
//! `RUST_LOG` picks the filter (default `info`). `LOG_FORMAT=json` switches
//! to JSON lines.

/// Installs the global subscriber and a panic hook that logs through it.
///
/// Returns `false` if a global subscriber was already installed; the panic
/// hook is left alone in that case.
pub fn init_tracing() -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .json()
            .with_current_span(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .compact()
            .try_init()
            .is_ok()
    };

    if installed {
        // Panics abort the process; log them while the subscriber is still up.
        std::panic::set_hook(Box::new(|info| {
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!(%info, ?backtrace, "panic");
        }));
    }
    installed
}
