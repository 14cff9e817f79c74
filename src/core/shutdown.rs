//! # Cross-platform OS termination signals.
//!
//! Provides [`wait_for_termination`], an async helper that completes when the
//! process is asked to stop. The station then halts every registered device.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd)
//! - `SIGQUIT` (hard stop)
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

/// Waits for a termination signal.
///
/// Returns `Err` only if the signal listeners cannot be registered.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let which = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = which, "termination signal received");
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Err` only if the Ctrl-C listener cannot be registered.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "termination signal received");
    Ok(())
}
