use super::ShutdownError;
use crate::server::endpoint::Endpoints;
use crate::server::transport::grpc;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::Span;

pub const HTTP: &str = "http";
pub const GRPC: &str = "grpc";

async fn bind(transport: &'static str, addr: SocketAddr) -> Result<TcpListener, ShutdownError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ShutdownError::Bind {
            transport,
            addr,
            source,
        })
}

/// Serves `router` on `addr` until `stop` is cancelled, then drains open
/// connections. The listener is bound here so a bind failure ends the actor.
pub async fn http_actor(
    addr: SocketAddr,
    router: Router,
    stop: CancellationToken,
    logger: Span,
) -> Result<(), ShutdownError> {
    let listener = bind(HTTP, addr).await?;
    tracing::info!(parent: &logger, transport = HTTP, %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(stop.cancelled_owned())
        .await
        .map_err(|e| ShutdownError::Serve {
            transport: HTTP,
            source: e.into(),
        })?;

    tracing::info!(parent: &logger, transport = HTTP, %addr, "stopped");
    Ok(())
}

/// gRPC counterpart of [`http_actor`]. Request contexts derive from
/// `shutdown`; `stop` ends the server.
pub async fn grpc_actor(
    addr: SocketAddr,
    endpoints: Endpoints,
    shutdown: CancellationToken,
    stop: CancellationToken,
    logger: Span,
) -> Result<(), ShutdownError> {
    let listener = bind(GRPC, addr).await?;
    tracing::info!(parent: &logger, transport = GRPC, %addr, "listening");

    grpc::serve(listener, endpoints, shutdown, stop)
        .await
        .map_err(|source| ShutdownError::Serve {
            transport: GRPC,
            source,
        })?;

    tracing::info!(parent: &logger, transport = GRPC, %addr, "stopped");
    Ok(())
}

/// Returns [`ShutdownError::Signal`] on SIGINT or SIGTERM, `Ok` once `stop`
/// is cancelled.
pub async fn signal_actor(stop: CancellationToken, logger: Span) -> Result<(), ShutdownError> {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(parent: &logger, error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(parent: &logger, error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => Err(ShutdownError::Signal("SIGINT".to_string())),
        () = terminate => Err(ShutdownError::Signal("SIGTERM".to_string())),
        () = stop.cancelled() => Ok(()),
    }
}
