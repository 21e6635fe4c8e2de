use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    CoreError,
    store::{DocumentSink, DocumentSource, FsStore, PictureStore, language_code},
    tokens::{Reconciler, TokenGroup, flatten},
};

const TOKEN_HEADER: &str = "x-lang-token";
const UPLOAD_LIMIT_BYTES: usize = 16 * 1024 * 1024;
const MAX_IN_FLIGHT_REQUESTS: usize = 64;

#[derive(Clone)]
pub struct HttpState {
    pub store: FsStore,
    pub reference: String,
    pub auth: HttpAuth,
}

#[derive(Debug)]
pub struct HttpServerHandle {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HttpServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(err) = self.task.await {
            warn!(error = ?err, "HTTP server task did not stop cleanly");
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct SaveResponse {
    success: bool,
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    filename: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportQuery {
    #[serde(default)]
    pub missing_only: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub reference: String,
    pub target: String,
    pub missing: Vec<String>,
    pub groups: Vec<TokenGroup>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error reply carrying the HTTP status and a human-readable message.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::DocumentNotFound { .. } | CoreError::ReferenceUnavailable { .. } => {
                StatusCode::NOT_FOUND
            }
            CoreError::InvalidDocumentName { .. }
            | CoreError::NoDocumentSelected
            | CoreError::ReferenceNotEditable { .. }
            | CoreError::ReferenceNameEmpty
            | CoreError::Token(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CoreError>() {
            Ok(core) => core.into(),
            Err(other) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

#[derive(Clone, Default)]
pub struct HttpAuth {
    token: Option<String>,
}

impl HttpAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token: token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn verify(&self, req: &Request<Body>) -> Result<(), ApiError> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(());
        };

        let bearer = header_text(req, header::AUTHORIZATION.as_str())
            .and_then(|value| value.trim().strip_prefix("Bearer "));
        let presented = [bearer, header_text(req, TOKEN_HEADER)];

        if presented.into_iter().flatten().any(|token| token.trim() == expected) {
            Ok(())
        } else {
            Err(ApiError::unauthorized("missing valid authentication token"))
        }
    }
}

fn header_text<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

pub fn build_router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .allow_origin(Any);

    let auth_state = state.auth.clone();

    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/report/:name", get(get_report))
        .route("/files", get(list_files))
        .route("/file/:name", get(get_file))
        .route("/save/:name", post(save_file))
        .route("/upload/:name", post(upload_file))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(in_flight_limit(MAX_IN_FLIGHT_REQUESTS))
        .layer(middleware::from_fn_with_state(auth_state, authenticate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One semaphore for the whole router; `Router::layer` wraps every route
/// separately, so a per-service limit would only cap each route.
fn in_flight_limit(max: usize) -> GlobalConcurrencyLimitLayer {
    GlobalConcurrencyLimitLayer::new(max)
}

async fn authenticate(
    State(auth): State<HttpAuth>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // Preflight requests never carry credentials.
    if req.method() != Method::OPTIONS {
        auth.verify(&req)?;
    }
    Ok(next.run(req).await)
}

pub async fn spawn_http_server(state: HttpState, addr: SocketAddr) -> Result<HttpServerHandle> {
    let router = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("HTTP server listening on {}", local_addr);

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = stopped.await;
        });
        if let Err(err) = serve.await {
            error!("HTTP server terminated with error: {err}");
        }
    });

    Ok(HttpServerHandle { addr: local_addr, stop, task })
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_files(State(state): State<HttpState>) -> Result<Json<Vec<String>>, ApiError> {
    let files = state.store.list_documents()?;
    Ok(Json(files))
}

async fn get_file(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.store.read_bytes(&name)?;
    let content_type = HeaderValue::from_static(content_type_for(&name));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

async fn save_file(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Json(document): Json<Value>,
) -> Result<Json<SaveResponse>, ApiError> {
    state.store.write_document(&name, &document).map_err(|err| {
        warn!(file = %name, error = ?err, "failed to save document");
        ApiError::from(err)
    })?;
    info!(file = %name, "document saved");
    Ok(Json(SaveResponse { success: true }))
}

async fn upload_file(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("No file uploaded"));
    }
    state.store.store_upload(&name, &body)?;
    info!(file = %name, size = body.len(), "file uploaded");
    Ok(Json(UploadResponse { success: true, filename: name }))
}

async fn get_report(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, ApiError> {
    if !state.store.contains(&state.reference) {
        return Err(CoreError::ReferenceUnavailable { name: state.reference.clone() }.into());
    }

    let mut reconciler = Reconciler::new();
    match state.store.load_pictures() {
        Ok(pictures) => reconciler.set_pictures(pictures),
        Err(err) => warn!(error = ?err, "ignoring unreadable picture metadata"),
    }
    reconciler.load_reference(flatten(&state.store.read_document(&state.reference)?));
    reconciler.load_target(flatten(&state.store.read_document(&name)?));
    reconciler.set_missing_only(query.missing_only);

    let groups = reconciler.groups().to_vec();
    let missing = reconciler.missing().map(str::to_string).collect();
    Ok(Json(ReportResponse {
        reference: state.reference.clone(),
        target: language_code(&name).to_string(),
        missing,
        groups,
    }))
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
