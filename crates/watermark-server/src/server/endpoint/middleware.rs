//! Cross-cutting endpoint middleware.
//!
//! Each layer wraps any service speaking [`EndpointRequest`] with the
//! workflow [`Error`] type, so the same stack applies to all endpoints and,
//! through them, to both transports.

use super::EndpointRequest;
use crate::server::telemetry::EndpointMetrics;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::Span;
use watermark_core::{Error, ErrorKind, Result};

/// Emits one structured event per endpoint call under the injected logger.
#[derive(Clone, Debug)]
pub struct LoggingLayer {
    name: &'static str,
    logger: Span,
}

impl LoggingLayer {
    pub fn new(name: &'static str, logger: Span) -> Self {
        Self { name, logger }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            name: self.name,
            logger: self.logger.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Logging<S> {
    inner: S,
    name: &'static str,
    logger: Span,
}

impl<S, Req> Service<EndpointRequest<Req>> for Logging<S>
where
    S: Service<EndpointRequest<Req>, Error = Error>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Future = BoxFuture<'static, Result<S::Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: EndpointRequest<Req>) -> Self::Future {
        let endpoint = self.name;
        let logger = self.logger.clone();
        let trace_id = req.ctx.trace_id().map(str::to_owned);
        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let result = fut.await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
            let trace_id = trace_id.as_deref();
            match &result {
                Ok(_) => {
                    tracing::debug!(parent: &logger, endpoint, trace_id, elapsed_ms, "endpoint ok");
                }
                Err(e) if e.kind() == ErrorKind::Internal => {
                    tracing::error!(
                        parent: &logger,
                        endpoint,
                        trace_id,
                        elapsed_ms,
                        kind = %e.kind(),
                        error = %e,
                        "endpoint failed"
                    );
                }
                Err(e) => {
                    tracing::info!(
                        parent: &logger,
                        endpoint,
                        trace_id,
                        elapsed_ms,
                        kind = %e.kind(),
                        error = %e,
                        "endpoint rejected request"
                    );
                }
            }
            result
        })
    }
}

/// Records request count, error count by kind and latency.
#[derive(Clone, Debug)]
pub struct MetricsLayer {
    name: &'static str,
    metrics: EndpointMetrics,
}

impl MetricsLayer {
    pub fn new(name: &'static str, metrics: EndpointMetrics) -> Self {
        Self { name, metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = Metrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Metrics {
            inner,
            name: self.name,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Metrics<S> {
    inner: S,
    name: &'static str,
    metrics: EndpointMetrics,
}

impl<S, Req> Service<EndpointRequest<Req>> for Metrics<S>
where
    S: Service<EndpointRequest<Req>, Error = Error>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Future = BoxFuture<'static, Result<S::Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: EndpointRequest<Req>) -> Self::Future {
        let endpoint = self.name;
        let metrics = self.metrics.clone();
        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let result = fut.await;
            let kind = result.as_ref().err().map(Error::kind);
            metrics.record(endpoint, start.elapsed().as_secs_f64() * 1_000.0, kind);
            result
        })
    }
}

/// Fails the call with [`Error::DeadlineExceeded`] once `timeout` elapses.
/// `None` disables the deadline.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutLayer {
    timeout: Option<Duration>,
}

impl TimeoutLayer {
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = Timeout<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timeout {
            inner,
            timeout: self.timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Timeout<S> {
    inner: S,
    timeout: Option<Duration>,
}

impl<S, Req> Service<EndpointRequest<Req>> for Timeout<S>
where
    S: Service<EndpointRequest<Req>, Error = Error>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Future = BoxFuture<'static, Result<S::Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: EndpointRequest<Req>) -> Self::Future {
        let timeout = self.timeout;
        let fut = self.inner.call(req);

        Box::pin(async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| Error::DeadlineExceeded)?,
                None => fut.await,
            }
        })
    }
}
