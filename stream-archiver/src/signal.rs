//! Shutdown signal handling.

/// Waits for a signal that requests a graceful shutdown, like SIGTERM or SIGINT.
#[cfg(unix)]
async fn wait_for_signal_impl() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut signal_terminate = signal(SignalKind::terminate())?;
    let mut signal_interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = signal_terminate.recv() => "SIGTERM",
        _ = signal_interrupt.recv() => "SIGINT",
    })
}

/// Waits for Ctrl-C, Ctrl-Break, console close or system shutdown.
#[cfg(windows)]
async fn wait_for_signal_impl() -> std::io::Result<&'static str> {
    use tokio::signal::windows;

    let mut signal_c = windows::ctrl_c()?;
    let mut signal_break = windows::ctrl_break()?;
    let mut signal_close = windows::ctrl_close()?;
    let mut signal_shutdown = windows::ctrl_shutdown()?;

    Ok(tokio::select! {
        _ = signal_c.recv() => "CTRL_C",
        _ = signal_break.recv() => "CTRL_BREAK",
        _ = signal_close.recv() => "CTRL_CLOSE",
        _ = signal_shutdown.recv() => "CTRL_SHUTDOWN",
    })
}

/// Registers signal handlers and waits for a shutdown request.
///
/// Returns the name of the signal received.
pub async fn wait_for_stop_signal() -> std::io::Result<&'static str> {
    wait_for_signal_impl().await
}
