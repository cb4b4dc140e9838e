use crate::server::endpoint::{self, Endpoints};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::service::interceptor::InterceptedService;
use tonic::{Request, Response, Status, codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use watermark_core::{
    context::{RequestContext, TRACEPARENT, TraceContext},
    proto::{
        self, FILE_DESCRIPTOR_SET,
        watermark_server::{Watermark, WatermarkServer},
    },
};

/// `watermark.Watermark` implementation. Each call maps 1:1 onto an endpoint.
#[derive(Clone)]
pub struct WatermarkRpc {
    endpoints: Endpoints,
    shutdown: CancellationToken,
}

impl WatermarkRpc {
    pub fn new(endpoints: Endpoints, shutdown: CancellationToken) -> Self {
        Self {
            endpoints,
            shutdown,
        }
    }

    fn context<T>(&self, request: &Request<T>) -> RequestContext {
        let trace = request
            .extensions()
            .get::<TraceContext>()
            .cloned()
            .or_else(|| trace_from_metadata(request.metadata()));
        RequestContext::new(self.shutdown.child_token()).with_trace(trace)
    }
}

fn trace_from_metadata(metadata: &MetadataMap) -> Option<TraceContext> {
    metadata
        .get(TRACEPARENT)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceContext::parse)
}

/// Lifts the `traceparent` metadata entry into a [`TraceContext`] extension.
/// A missing or malformed entry is ignored.
pub fn trace_context_interceptor(mut request: Request<()>) -> Result<Request<()>, Status> {
    if let Some(trace) = trace_from_metadata(request.metadata()) {
        request.extensions_mut().insert(trace);
    }
    Ok(request)
}

#[tonic::async_trait]
impl Watermark for WatermarkRpc {
    async fn status(
        &self,
        request: Request<proto::StatusRequest>,
    ) -> Result<Response<proto::StatusReply>, Status> {
        let ctx = self.context(&request);
        let resp = endpoint::call(&self.endpoints.status, ctx, request.into_inner().into()).await?;
        Ok(Response::new(resp.into()))
    }

    async fn add_document(
        &self,
        request: Request<proto::AddDocumentRequest>,
    ) -> Result<Response<proto::AddDocumentReply>, Status> {
        let ctx = self.context(&request);
        let resp =
            endpoint::call(&self.endpoints.add_document, ctx, request.into_inner().into()).await?;
        Ok(Response::new(resp.into()))
    }

    async fn get(
        &self,
        request: Request<proto::GetRequest>,
    ) -> Result<Response<proto::GetReply>, Status> {
        let ctx = self.context(&request);
        let resp = endpoint::call(&self.endpoints.get, ctx, request.into_inner().into()).await?;
        Ok(Response::new(resp.into()))
    }

    async fn watermark(
        &self,
        request: Request<proto::WatermarkRequest>,
    ) -> Result<Response<proto::WatermarkReply>, Status> {
        let ctx = self.context(&request);
        let resp =
            endpoint::call(&self.endpoints.watermark, ctx, request.into_inner().into()).await?;
        Ok(Response::new(resp.into()))
    }

    async fn service_status(
        &self,
        request: Request<proto::ServiceStatusRequest>,
    ) -> Result<Response<proto::ServiceStatusReply>, Status> {
        let ctx = self.context(&request);
        let resp =
            endpoint::call(&self.endpoints.service_status, ctx, request.into_inner().into())
                .await?;
        Ok(Response::new(resp.into()))
    }
}

pub fn build_rpc_service(rpc: WatermarkRpc) -> WatermarkServer<WatermarkRpc> {
    WatermarkServer::new(rpc)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

/// Serves the RPC service, grpc.health.v1 and reflection on `listener` until
/// `stop` is cancelled. Health flips to NOT_SERVING before the drain starts.
pub async fn serve(
    listener: TcpListener,
    endpoints: Endpoints,
    shutdown: CancellationToken,
    stop: CancellationToken,
) -> Result<(), tower::BoxError> {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<WatermarkServer<WatermarkRpc>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let rpc = InterceptedService::new(
        build_rpc_service(WatermarkRpc::new(endpoints, shutdown)),
        trace_context_interceptor,
    );

    let signal = async move {
        stop.cancelled().await;
        health_reporter
            .set_not_serving::<WatermarkServer<WatermarkRpc>>()
            .await;
    };

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(rpc)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
        .await?;
    Ok(())
}
