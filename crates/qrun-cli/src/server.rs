//! HTTP server for the application under test.
//!
//! Routes, in order:
//! - `/_/qunit-hooks.js`: the hook script injected into every HTML page
//! - `/_/status`: JSON summary of the running job
//! - anything else: library resources go through the cache proxy, other
//!   paths are served from the webapp directory
//!
//! Only `GET` populates the resource cache. `HEAD` reaches the origin
//! without caching; other methods on library resources answer 405.

use crate::error::{CliError, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use qrun_core::proxy::{normalize, resource_path};
use qrun_core::{Decision, Job, JobStatus, ResourceProxy, StreamedResource};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug};

/// Path of the injected hook script.
pub const HOOKS_PATH: &str = "/_/qunit-hooks.js";

/// Path of the job status endpoint.
pub const STATUS_PATH: &str = "/_/status";

const QUNIT_HOOKS: &str = include_str!("../assets/qunit-hooks.js");

/// Shared state of every request handler.
#[derive(Clone)]
pub struct AppState {
    job: Arc<Job>,
    proxy: Arc<ResourceProxy>,
    webapp: Arc<PathBuf>,
}

impl AppState {
    /// Creates the state; the webapp directory comes from the job config.
    pub fn new(job: Arc<Job>, proxy: Arc<ResourceProxy>) -> Self {
        let webapp = job.config().resolve(&job.config().webapp);
        Self {
            job,
            proxy,
            webapp: Arc::new(webapp),
        }
    }
}

/// Build the axum router with all routes.
pub fn router(state: AppState) -> Router {
    let log_server = state.job.config().log_server;

    let router = Router::new()
        .route(HOOKS_PATH, get(handle_hooks))
        .route(STATUS_PATH, get(handle_status))
        .fallback(handle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    if log_server {
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    } else {
        router
    }
}

/// A server running in the background.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting requests and waits for the server task.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(result) => result.map_err(|e| CliError::Server(format!("Server error: {e}"))),
            Err(e) => Err(CliError::Server(format!("Server task failed: {e}"))),
        }
    }
}

/// Binds to `127.0.0.1:<job port>` and serves in a background task.
///
/// A configured port of `0` binds an ephemeral port; the actual port is
/// written back into the job, which then reports the right `base_url`.
///
/// # Errors
///
/// Returns error if the server cannot bind to the configured port.
pub async fn start(job: Arc<Job>, proxy: Arc<ResourceProxy>) -> Result<RunningServer> {
    let requested: SocketAddr = ([127, 0, 0, 1], job.config().port).into();
    let listener = TcpListener::bind(requested)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {requested}: {e}")))?;
    let addr = listener.local_addr()?;

    job.set_port(addr.port());
    job.set_status(JobStatus::Serving);

    let app = router(AppState::new(job, proxy));
    let (shutdown, signal) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = signal.await;
            })
            .await
    });

    debug!(%addr, "Server listening");
    Ok(RunningServer {
        addr,
        shutdown,
        handle,
    })
}

/// Serve the hook script.
async fn handle_hooks() -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        QUNIT_HOOKS,
    )
        .into_response()
}

/// Serve the job summary.
async fn handle_status(State(state): State<AppState>) -> Response {
    Json(state.job.summary()).into_response()
}

/// Handle every other request: proxy decision first, webapp files otherwise.
async fn handle_request(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let decision = if method == Method::GET {
        state.proxy.handle(path_and_query).await
    } else if method == Method::HEAD {
        state.proxy.forward(path_and_query).await
    } else if resource_path(path_and_query).is_some() {
        return method_not_allowed();
    } else {
        Decision::Pass
    };

    match decision {
        Decision::Pass => serve_webapp(&state.webapp, uri.path()).await,
        Decision::Serve(file) => serve_file(&file).await,
        Decision::Stream(resource) => stream_resource(resource),
        Decision::NotFound => not_found(),
    }
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, HEAD")],
        "Method not allowed",
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

async fn serve_webapp(webapp: &Path, request_path: &str) -> Response {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() || relative.ends_with('/') {
        format!("{relative}index.html")
    } else {
        relative.to_string()
    };

    let Some(relative) = normalize(&relative) else {
        return not_found();
    };
    serve_file(&webapp.join(relative)).await
}

async fn serve_file(file: &Path) -> Response {
    let content = match tokio::fs::read(file).await {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %file.display(), error = %e, "File not served");
            return not_found();
        }
    };

    let content_type = determine_content_type(file);
    let body = if content_type.starts_with("text/html") {
        inject_hooks(&content)
    } else {
        content
    };

    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

fn stream_resource(resource: StreamedResource) -> Response {
    let status = StatusCode::from_u16(resource.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from_stream(resource.body));
    *response.status_mut() = status;

    if let Some(value) = resource
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

/// Inject the hook script tag into HTML content.
///
/// The tag goes right after the opening `<head>` so the hooks are in place
/// before QUnit or the suite scripts load.
fn inject_hooks(content: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(content);
    let script_tag = format!(r#"<script src="{HOOKS_PATH}"></script>"#);

    let lower = html.to_ascii_lowercase();
    let insert_at = lower
        .find("<head")
        .and_then(|start| lower[start..].find('>').map(|end| start + end + 1))
        .unwrap_or(0);

    let mut result = String::with_capacity(html.len() + script_tag.len());
    result.push_str(&html[..insert_at]);
    result.push_str(&script_tag);
    result.push_str(&html[insert_at..]);
    result.into_bytes()
}

/// Determine content type from file extension.
fn determine_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "xml" => "application/xml",
        "properties" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}
