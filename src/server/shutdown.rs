//! Graceful shutdown with a bounded drain.
//!
//! ```text
//! signal ──► stop accepting ──► drain in-flight requests
//!                                   │ done          │ grace period elapsed
//!                                   ▼               ▼
//!                               Drained          Forced (server task aborted)
//! ```
//!
//! Connection tasks left behind by a forced stop end when the runtime is
//! dropped at process exit.

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All in-flight requests finished within the grace period
    Drained,
    /// The grace period elapsed and remaining connections were dropped
    Forced,
}

/// Serve `router` until `shutdown` resolves, then drain for at most `grace`.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    grace: Duration,
) -> io::Result<ShutdownOutcome>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (started_tx, started_rx) = oneshot::channel::<()>();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let _ = started_tx.send(());
            })
            .await
    });

    // Either the server fails on its own, or shutdown begins
    tokio::select! {
        result = &mut server => {
            return match result {
                Ok(Ok(())) => Ok(ShutdownOutcome::Drained),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(io::Error::other(e)),
            };
        }
        _ = started_rx => {}
    }

    info!(grace_secs = grace.as_secs(), "Shutdown requested, draining connections");

    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => {
            info!("All connections drained");
            Ok(ShutdownOutcome::Drained)
        }
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(e)) => Err(io::Error::other(e)),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "Grace period elapsed, dropping remaining connections"
            );
            server.abort();
            Ok(ShutdownOutcome::Forced)
        }
    }
}

/// Resolves on SIGINT, SIGTERM or SIGQUIT (Ctrl+C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let streams = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::quit()),
        );
        if let (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) = streams {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
                _ = sigquit.recv() => "SIGQUIT",
            };
            info!(signal = name, "Received shutdown signal");
            return;
        }
        warn!("Failed to register Unix signal handlers, falling back to Ctrl+C");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C");
}
