//! HTTP front end for wxcache
//!
//! Serves the lookup form on `GET /` and weather payloads on `POST /`,
//! backed by a [`CachedLookup`].

mod error_mapping;
mod page;
mod routes;

pub use error_mapping::{error_reply, handle_rejection, status_for};
pub use page::{result_page, FORM_PAGE};
pub use routes::routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wxcache_core::{AppError, ConfigError};
use wxcache_weather::CachedLookup;

/// A bound, running server that can be stopped gracefully.
pub struct WeatherServer {
    local_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    grace: Duration,
}

impl WeatherServer {
    /// Bind `addr` and start serving in the background.
    pub fn bind(
        addr: SocketAddr,
        lookup: Arc<CachedLookup>,
        grace: Duration,
    ) -> Result<Self, AppError> {
        let (stop, stopped) = oneshot::channel::<()>();

        let (local_addr, server) = warp::serve(routes(lookup))
            .try_bind_with_graceful_shutdown(addr, async {
                stopped.await.ok();
            })
            .map_err(|e| ConfigError::Invalid(format!("cannot listen on {addr}: {e}")))?;

        tracing::info!("Listening on http://{}", local_addr);

        Ok(Self {
            local_addr,
            stop,
            handle: tokio::spawn(server),
            grace,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    ///
    /// Requests still running after the grace period are dropped.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            stop,
            mut handle,
            grace,
            ..
        } = self;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutting down server...");
            }
            res = &mut handle => {
                return res.map_err(|e| AppError::Other(anyhow::anyhow!("server task failed: {e}")));
            }
        }

        // The receiver only goes away if the server already stopped.
        let _ = stop.send(());

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => {
                tracing::info!("Graceful shutdown complete.");
                Ok(())
            }
            Ok(Err(e)) => Err(AppError::Other(anyhow::anyhow!(
                "server task failed: {e}"
            ))),
            Err(_) => {
                tracing::warn!(
                    "Server did not drain within {}s, dropping open connections",
                    grace.as_secs()
                );
                handle.abort();
                Ok(())
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
