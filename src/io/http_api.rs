//! HTTP API for sensors, dashboards and operators
//!
//! Routes:
//! - `GET  /jail/rooms | /jail/prisoners | /jail/occupancy | /jail/time`
//! - `POST /jail/prisoner | /jail/time | /jail/position | /jail/noise | /jail/smoke | /jail/sweep`
//! - `DELETE /jail/reset`
//! - `GET  /health`, `GET /metrics`
//!
//! The monitor lock is held only for the synchronous operation itself, never
//! across an await. Every response carries `Access-Control-Allow-Origin: *`.

use crate::domain::error::MonitorError;
use crate::io::prometheus;
use crate::services::monitor::Monitor;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Monitor shared between connections
pub type SharedMonitor = Arc<Mutex<Monitor>>;

/// State handed to every request
pub struct ApiState {
    pub monitor: SharedMonitor,
    pub site_id: String,
}

type HttpResponse = Response<Full<Bytes>>;

fn response(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(body.into()))
        .expect("static response should not fail")
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => response(status, "application/json", bytes),
        Err(e) => {
            error!(error = %e, "http_serialize_failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error interno")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    let body = json!({ "error": message }).to_string();
    response(status, "application/json", body)
}

fn monitor_error(err: MonitorError) -> HttpResponse {
    let status = match err {
        MonitorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    debug!(error = %err, "request_rejected");
    error_response(status, err.message())
}

fn preflight() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()))
        .expect("static response should not fail")
}

/// Parse a JSON body. An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, HttpResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "http_invalid_json");
        error_response(StatusCode::BAD_REQUEST, &format!("JSON inválido: {e}"))
    })
}

/// Run a mutating operation that takes a JSON request
fn with_body<Req, Out>(
    body: &Bytes,
    state: &ApiState,
    status: StatusCode,
    op: impl FnOnce(&mut Monitor, Req) -> Result<Out, MonitorError>,
) -> HttpResponse
where
    Req: DeserializeOwned + Default,
    Out: Serialize,
{
    let req = match parse_body::<Req>(body) {
        Ok(req) => req,
        Err(resp) => {
            state.monitor.lock().metrics().record_rejected();
            return resp;
        }
    };
    let result = op(&mut *state.monitor.lock(), req);
    match result {
        Ok(out) => json_response(status, &out),
        Err(e) => monitor_error(e),
    }
}

/// Route a request whose body has already been collected
pub fn dispatch(method: &Method, path: &str, body: &Bytes, state: &ApiState) -> HttpResponse {
    if method == Method::OPTIONS && path.starts_with("/jail/") {
        return preflight();
    }

    match (method, path) {
        (&Method::GET, "/health") => response(StatusCode::OK, "text/plain", "ok"),
        (&Method::GET, "/metrics") => {
            let body = {
                let monitor = state.monitor.lock();
                prometheus::format_prometheus_metrics(&monitor.metrics_summary(), monitor.occupancy(), &state.site_id)
            };
            response(StatusCode::OK, prometheus::CONTENT_TYPE, body)
        }

        (&Method::GET, "/jail/rooms") => json_response(StatusCode::OK, state.monitor.lock().rooms()),
        (&Method::GET, "/jail/prisoners") => json_response(StatusCode::OK, &state.monitor.lock().prisoners()),
        (&Method::GET, "/jail/occupancy") => json_response(StatusCode::OK, state.monitor.lock().occupancy()),
        (&Method::GET, "/jail/time") => json_response(StatusCode::OK, &state.monitor.lock().time()),

        (&Method::POST, "/jail/prisoner") => with_body(body, state, StatusCode::CREATED, Monitor::register_entity),
        (&Method::POST, "/jail/time") => with_body(body, state, StatusCode::OK, Monitor::set_clock),
        (&Method::POST, "/jail/position") => with_body(body, state, StatusCode::OK, Monitor::report_position),
        (&Method::POST, "/jail/noise") => with_body(body, state, StatusCode::OK, Monitor::report_noise),
        (&Method::POST, "/jail/smoke") => with_body(body, state, StatusCode::OK, Monitor::report_smoke),
        (&Method::POST, "/jail/sweep") => json_response(StatusCode::OK, &state.monitor.lock().request_sweep()),
        (&Method::DELETE, "/jail/reset") => {
            state.monitor.lock().reset();
            json_response(StatusCode::OK, &json!({ "message": "Sistema reiniciado" }))
        }

        _ => error_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ApiState>,
) -> Result<HttpResponse, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(path = %parts.uri.path(), limit = %MAX_BODY_BYTES, "http_body_too_large");
            return Ok(error_response(StatusCode::BAD_REQUEST, "Cuerpo de la petición demasiado grande"));
        }
        Err(e) => {
            error!(path = %parts.uri.path(), error = %e, "http_body_read_failed");
            return Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error interno"));
        }
    };

    Ok(dispatch(&parts.method, parts.uri.path(), &body, &state))
}

/// Serve the API on an already bound listener until shutdown
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(addr = %listener.local_addr()?, site = %state.site_id, "http_api_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_api_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_api_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_api_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

/// Bind and start the HTTP API server
pub async fn start_http_server(
    bind_address: &str,
    port: u16,
    state: Arc<ApiState>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{bind_address}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}
