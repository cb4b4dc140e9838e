//! Transport-agnostic endpoints.
//!
//! Every workflow operation is exposed as an [`Endpoint`]: a boxed
//! `tower::Service` from [`EndpointRequest<Req>`] to a typed response, with
//! the workflow [`Error`] as its error type. Endpoints know nothing about
//! HTTP status codes or protobuf; both transport adapters call the same
//! [`Endpoints`] set, so cross-cutting middleware is layered exactly once.
//!
//! ## Middleware
//!
//! Applied to all five endpoints, outermost first:
//!
//! - [`middleware::LoggingLayer`] - one structured event per call.
//! - [`middleware::MetricsLayer`] - request/error counters and latency.
//! - [`middleware::TimeoutLayer`] - optional per-call deadline.
//!
//! Errors from the workflow service pass through unchanged so the adapters
//! can classify them by [`watermark_core::ErrorKind`].

pub mod middleware;

use crate::server::service::WorkflowService;
use crate::server::telemetry::EndpointMetrics;
use middleware::{LoggingLayer, MetricsLayer, TimeoutLayer};
use std::sync::Arc;
use std::time::Duration;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceBuilder, ServiceExt, service_fn};
use tracing::Span;
use watermark_core::{
    Error, Result,
    api::{
        AddDocumentRequest, AddDocumentResponse, GetRequest, GetResponse, ServiceStatusRequest,
        ServiceStatusResponse, StatusRequest, StatusResponse, WatermarkRequest, WatermarkResponse,
    },
    context::RequestContext,
    types::Filter,
};

/// A typed request together with the context it runs under.
#[derive(Clone, Debug)]
pub struct EndpointRequest<Req> {
    pub ctx: RequestContext,
    pub request: Req,
}

impl<Req> EndpointRequest<Req> {
    pub fn new(ctx: RequestContext, request: Req) -> Self {
        Self { ctx, request }
    }
}

pub type Endpoint<Req, Resp> = BoxCloneSyncService<EndpointRequest<Req>, Resp, Error>;

/// Invokes `endpoint` once with `request`.
pub async fn call<Req, Resp>(
    endpoint: &Endpoint<Req, Resp>,
    ctx: RequestContext,
    request: Req,
) -> Result<Resp> {
    endpoint
        .clone()
        .oneshot(EndpointRequest::new(ctx, request))
        .await
}

/// Middleware settings shared by every endpoint.
#[derive(Clone, Debug)]
pub struct EndpointOptions {
    pub timeout: Option<Duration>,
    pub logger: Span,
    pub metrics: EndpointMetrics,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            logger: Span::none(),
            metrics: EndpointMetrics::noop(),
        }
    }
}

/// The full endpoint set fronting one [`WorkflowService`].
#[derive(Clone)]
pub struct Endpoints {
    pub service_status: Endpoint<ServiceStatusRequest, ServiceStatusResponse>,
    pub status: Endpoint<StatusRequest, StatusResponse>,
    pub add_document: Endpoint<AddDocumentRequest, AddDocumentResponse>,
    pub get: Endpoint<GetRequest, GetResponse>,
    pub watermark: Endpoint<WatermarkRequest, WatermarkResponse>,
}

impl Endpoints {
    pub fn new(service: Arc<WorkflowService>, options: &EndpointOptions) -> Self {
        Self {
            service_status: service_status_endpoint(Arc::clone(&service), options),
            status: status_endpoint(Arc::clone(&service), options),
            add_document: add_document_endpoint(Arc::clone(&service), options),
            get: get_endpoint(Arc::clone(&service), options),
            watermark: watermark_endpoint(service, options),
        }
    }
}

fn wrap<S, Req, Resp>(name: &'static str, inner: S, options: &EndpointOptions) -> Endpoint<Req, Resp>
where
    S: Service<EndpointRequest<Req>, Response = Resp, Error = Error> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let service = ServiceBuilder::new()
        .layer(LoggingLayer::new(name, options.logger.clone()))
        .layer(MetricsLayer::new(name, options.metrics.clone()))
        .layer(TimeoutLayer::new(options.timeout))
        .service(inner);
    BoxCloneSyncService::new(service)
}

fn service_status_endpoint(
    service: Arc<WorkflowService>,
    options: &EndpointOptions,
) -> Endpoint<ServiceStatusRequest, ServiceStatusResponse> {
    let inner = service_fn(move |req: EndpointRequest<ServiceStatusRequest>| {
        let service = Arc::clone(&service);
        async move {
            let health = service.service_status(&req.ctx).await?;
            Ok::<_, Error>(ServiceStatusResponse {
                code: health.code(),
            })
        }
    });
    wrap("service_status", inner, options)
}

fn status_endpoint(
    service: Arc<WorkflowService>,
    options: &EndpointOptions,
) -> Endpoint<StatusRequest, StatusResponse> {
    let inner = service_fn(move |req: EndpointRequest<StatusRequest>| {
        let service = Arc::clone(&service);
        async move {
            let status = service.status(&req.ctx, &req.request.ticket_id).await?;
            Ok::<_, Error>(StatusResponse { status })
        }
    });
    wrap("status", inner, options)
}

fn add_document_endpoint(
    service: Arc<WorkflowService>,
    options: &EndpointOptions,
) -> Endpoint<AddDocumentRequest, AddDocumentResponse> {
    let inner = service_fn(move |req: EndpointRequest<AddDocumentRequest>| {
        let service = Arc::clone(&service);
        async move {
            let ticket_id = service.add_document(&req.ctx, req.request.into()).await?;
            Ok::<_, Error>(AddDocumentResponse { ticket_id })
        }
    });
    wrap("add_document", inner, options)
}

fn get_endpoint(
    service: Arc<WorkflowService>,
    options: &EndpointOptions,
) -> Endpoint<GetRequest, GetResponse> {
    let inner = service_fn(move |req: EndpointRequest<GetRequest>| {
        let service = Arc::clone(&service);
        async move {
            let filters = req
                .request
                .filters
                .into_iter()
                .map(|(key, value)| Filter::parse(&key, value))
                .collect::<Result<Vec<_>>>()?;
            let documents = service.get(&req.ctx, &filters).await?;
            Ok::<_, Error>(GetResponse { documents })
        }
    });
    wrap("get", inner, options)
}

fn watermark_endpoint(
    service: Arc<WorkflowService>,
    options: &EndpointOptions,
) -> Endpoint<WatermarkRequest, WatermarkResponse> {
    let inner = service_fn(move |req: EndpointRequest<WatermarkRequest>| {
        let service = Arc::clone(&service);
        async move {
            let result = service
                .watermark(&req.ctx, &req.request.ticket_id, &req.request.mark)
                .await?;
            Ok::<_, Error>(WatermarkResponse { result })
        }
    });
    wrap("watermark", inner, options)
}
