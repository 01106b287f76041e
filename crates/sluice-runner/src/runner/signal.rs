use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Cancels `upstream` on the first Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Fails if a signal handler cannot be installed. `upstream` is left
/// untouched in that case.
pub async fn shutdown_signal(upstream: CancellationToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = async {
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("failed to install Ctrl+C handler")?;
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, interrupting pipeline...");

    upstream.cancel();
    Ok(())
}
