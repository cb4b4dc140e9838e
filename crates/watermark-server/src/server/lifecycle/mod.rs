//! Process lifecycle.
//!
//! The server runs as three actors under one [`Group`]: the HTTP listener,
//! the gRPC listener and an OS signal watcher. Whichever returns first
//! decides the process outcome; every other actor is interrupted and drained
//! before [`Group::run`] returns.
//!
//! - [`group`] - The supervisor.
//! - [`actors`] - The three actor bodies.

pub mod actors;
pub mod group;

pub use group::{ActorResult, Group};

use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

/// Interrupt for an actor driven by `stop`. It also cancels `shutdown`, so
/// requests still in flight on any transport are refused from then on.
pub fn interrupt(
    stop: &CancellationToken,
    shutdown: &CancellationToken,
) -> impl FnOnce(&ActorResult) + Send + 'static {
    let (stop, shutdown) = (stop.clone(), shutdown.clone());
    move |_: &ActorResult| {
        shutdown.cancel();
        stop.cancel();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("{transport} listener failed to bind {addr}: {source}")]
    Bind {
        transport: &'static str,
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("{transport} server failed: {source}")]
    Serve {
        transport: &'static str,
        source: tower::BoxError,
    },
    #[error("received {0}")]
    Signal(String),
    #[error("actor {0} panicked")]
    ActorPanicked(String),
}

impl ShutdownError {
    /// Signal-triggered shutdown is the normal way out and exits cleanly.
    pub fn is_signal(&self) -> bool {
        matches!(self, Self::Signal(_))
    }

    pub fn transport(&self) -> Option<&'static str> {
        match self {
            Self::Bind { transport, .. } | Self::Serve { transport, .. } => Some(transport),
            Self::Signal(_) | Self::ActorPanicked(_) => None,
        }
    }
}
