//! Graceful shutdown coordination.

use std::io;

/// Wait for a shutdown signal (SIGINT or SIGTERM). Returns the signal name.
pub async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "Received signal, initiating shutdown");
        Ok(name)
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!(signal = "Ctrl+C", "Received signal, initiating shutdown");
        Ok("Ctrl+C")
    }
}

/// Resolve on SIGINT/SIGTERM. If the handlers cannot be installed this logs
/// and never resolves, leaving other exit paths in charge.
pub async fn shutdown_requested() {
    if let Err(e) = wait_for_shutdown_signal().await {
        tracing::error!(error = %e, "Failed to install signal handlers");
        std::future::pending::<()>().await;
    }
}
