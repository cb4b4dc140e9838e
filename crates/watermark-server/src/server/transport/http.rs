use crate::server::endpoint::{self, Endpoint, Endpoints};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;
use watermark_core::{
    Error, ErrorKind,
    api::{
        AddDocumentRequest, AddDocumentResponse, GetRequest, GetResponse, ServiceStatusRequest,
        ServiceStatusResponse, StatusRequest, StatusResponse, WatermarkRequest, WatermarkResponse,
    },
    context::{RequestContext, TRACEPARENT, TraceContext},
};

#[derive(Clone)]
struct AppState {
    endpoints: Endpoints,
    shutdown: CancellationToken,
}

/// Builds the JSON router. Every route is `POST`.
pub fn router(endpoints: Endpoints, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/healthz", post(service_status))
        .route("/status", post(status))
        .route("/addDocument", post(add_document))
        .route("/get", post(get))
        .route("/watermark", post(watermark))
        .with_state(AppState {
            endpoints,
            shutdown,
        })
}

/// Error answered by the HTTP adapter as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// The body was not valid JSON for the route. Never reaches an endpoint.
    Decode(String),
    Endpoint(Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Endpoint(err) => match err.kind() {
                ErrorKind::Unknown => StatusCode::NOT_FOUND,
                ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Endpoint(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match self {
            Self::Decode(message) => message,
            Self::Endpoint(err) => err.public_message(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

fn decode<Req>(body: &Bytes) -> Result<Req, ApiError>
where
    Req: DeserializeOwned + Default,
{
    if body.is_empty() {
        return Ok(Req::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn request_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let trace = headers
        .get(TRACEPARENT)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceContext::parse);
    RequestContext::new(state.shutdown.child_token()).with_trace(trace)
}

async fn dispatch<Req, Resp>(
    endpoint: &Endpoint<Req, Resp>,
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Json<Resp>, ApiError>
where
    Req: DeserializeOwned + Default + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    let request = decode::<Req>(body)?;
    let ctx = request_context(state, headers);
    Ok(Json(endpoint::call(endpoint, ctx, request).await?))
}

async fn service_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ServiceStatusResponse>, ApiError> {
    dispatch::<ServiceStatusRequest, _>(&state.endpoints.service_status, &state, &headers, &body)
        .await
}

async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    dispatch::<StatusRequest, _>(&state.endpoints.status, &state, &headers, &body).await
}

async fn add_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AddDocumentResponse>, ApiError> {
    dispatch::<AddDocumentRequest, _>(&state.endpoints.add_document, &state, &headers, &body).await
}

async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<GetResponse>, ApiError> {
    dispatch::<GetRequest, _>(&state.endpoints.get, &state, &headers, &body).await
}

async fn watermark(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WatermarkResponse>, ApiError> {
    dispatch::<WatermarkRequest, _>(&state.endpoints.watermark, &state, &headers, &body).await
}
