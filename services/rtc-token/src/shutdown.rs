//! Graceful Shutdown Module
//!
//! Serves until a shutdown signal arrives, then drains in-flight requests
//! for a bounded time.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Serve `app` until `shutdown` resolves, then wait up to `drain_timeout`
/// for in-flight requests before giving up on them.
///
/// # Errors
///
/// Fails when the server stops with an I/O error or its task panics.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    drain_timeout: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.await;
        let _ = signalled_tx.send(true);
    });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut handle => {
            return result.context("Server task failed")?.context("Server error");
        }
        _ = signalled_rx.changed() => {
            info!(timeout_secs = drain_timeout.as_secs(), "Draining in-flight requests");
        }
    }

    match tokio::time::timeout(drain_timeout, &mut handle).await {
        Ok(result) => {
            result.context("Server task failed")?.context("Server error")?;
            info!("All requests completed gracefully");
        }
        Err(_) => {
            warn!("Shutdown timeout reached, aborting remaining requests");
            handle.abort();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(|| async { "ok" }));
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve_with_shutdown(
            listener,
            app,
            async move {
                let _ = rx.await;
            },
            Duration::from_secs(2),
        ));

        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_drain_timeout_bounds_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve_with_shutdown(
            listener,
            app,
            async move {
                let _ = rx.await;
            },
            Duration::from_millis(200),
        ));

        let slow = tokio::spawn(reqwest::get(format!("http://{addr}/slow")));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        slow.abort();
    }
}
