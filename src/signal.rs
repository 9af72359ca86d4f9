//! Translates process signals into cancellation.
//!
//! This is the only place that touches OS signals. The first SIGINT or
//! SIGTERM cancels the token; later ones are noted and otherwise ignored.

use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on SIGINT/SIGTERM, listening until `stop` fires.
///
/// `stop` ends the listener without cancelling anything, for runs that
/// finish on their own.
pub async fn forward_shutdown_signals(cancel: CancellationToken, stop: CancellationToken) {
    #[cfg(unix)]
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                None
            }
        };

    loop {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let term = async {
            match terminate.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let term = std::future::pending::<()>();

        let name = tokio::select! {
            _ = stop.cancelled() => return,
            _ = ctrl_c => "SIGINT",
            _ = term => "SIGTERM",
        };

        request_shutdown(&cancel, name);
    }
}

/// Cancel `cancel`, logging only the first request.
///
/// Returns `true` if this call performed the cancellation.
pub fn request_shutdown(cancel: &CancellationToken, reason: &str) -> bool {
    if cancel.is_cancelled() {
        tracing::debug!("{reason} received, shutdown already in progress");
        return false;
    }
    tracing::info!("{reason} received, shutting down");
    cancel.cancel();
    true
}
