/// HTTP endpoint
/// Serves /calculate plus /health and /metrics for monitoring systems

use chrono::SecondsFormat;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::calculator::Calculator;
use crate::query::parse_calculate_query;

/// Timeout for reading HTTP request (prevents slow-loris attacks)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request head we read
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Request counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Calculations answered with 200
    pub calculations_ok: u64,
    /// Requests rejected with 400
    pub requests_invalid: u64,
    /// Calculations that failed with 503
    pub calculations_failed: u64,
    /// Timestamp of last /calculate request (Unix epoch seconds)
    pub last_request_time: u64,
}

/// Shared request metrics, updated from connection tasks
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    calculations_ok: AtomicU64,
    requests_invalid: AtomicU64,
    calculations_failed: AtomicU64,
    last_request_time: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ok(&self) {
        self.calculations_ok.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_invalid(&self) {
        self.requests_invalid.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_failure(&self) {
        self.calculations_failed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    fn touch(&self) {
        self.last_request_time.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            Ordering::Relaxed,
        );
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            calculations_ok: self.calculations_ok.load(Ordering::Relaxed),
            requests_invalid: self.requests_invalid.load(Ordering::Relaxed),
            calculations_failed: self.calculations_failed.load(Ordering::Relaxed),
            last_request_time: self.last_request_time.load(Ordering::Relaxed),
        }
    }
}

/// Everything a connection handler needs
#[derive(Clone)]
pub struct AppState {
    pub calculator: Arc<Calculator>,
    pub metrics: Arc<ServiceMetrics>,
}

#[derive(Debug, Serialize)]
struct CalculateResponse {
    date: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
    message: String,
}

/// Bind and run the HTTP server until cancelled
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    cancel_token: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind HTTP server on {}: {}", addr, e);
        e
    })?;

    serve(listener, state, cancel_token).await;
    Ok(())
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, state: AppState, cancel_token: CancellationToken) {
    match listener.local_addr() {
        Ok(addr) => info!("Listening on http://{}/calculate", addr),
        Err(e) => warn!("Listening on unknown address: {}", e),
    }

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((mut socket, peer_addr)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&mut socket, &state).await {
                                debug!("Error handling request from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("HTTP server shutting down");
                break;
            }
        }
    }
}

async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    state: &AppState,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];

    // Apply timeout to prevent slow-loris attacks
    let n = match timeout(REQUEST_TIMEOUT, read_request_head(socket, &mut buf)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("Request timeout after {:?}", REQUEST_TIMEOUT);
            return Ok(());
        }
    };

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]);
    let response = route(&request, state).await;

    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;

    Ok(())
}

/// Read until the blank line ending the request head, a full buffer, or EOF
async fn read_request_head<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
        if buf[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    Ok(filled)
}

/// Dispatch one raw request to its handler and build the full HTTP response
pub async fn route(request: &str, state: &AppState) -> String {
    let mut request_line = request.lines().next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("");
    let target = request_line.next().unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    debug!("{} {}", method, target);

    if method != "GET" {
        return build_not_found_response();
    }

    match path {
        "/calculate" | "/calculate/" => handle_calculate(query, state).await,
        "/health" | "/healthz" | "/health/" => {
            let cache = state.calculator.cache();
            build_health_response(
                &state.metrics.status(),
                cache.holiday_count(),
                cache.last_refresh_age().map(|age| age.as_secs()),
            )
        }
        "/metrics" => {
            let holidays = state.calculator.cache().holiday_count();
            build_metrics_response(&state.metrics.status(), holidays)
        }
        _ => build_not_found_response(),
    }
}

async fn handle_calculate(query: &str, state: &AppState) -> String {
    let request = match parse_calculate_query(query) {
        Ok(r) => r,
        Err(e) => {
            debug!("Rejected query {:?}: {}", query, e);
            state.metrics.record_invalid();
            return build_error_response(400, "InvalidParameters", &e.to_string());
        }
    };

    match state.calculator.calculate(request).await {
        Ok(date) => {
            state.metrics.record_ok();
            let body = CalculateResponse {
                date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
            };
            build_json_response(200, &body)
        }
        Err(e) => {
            error!("Calculation failed: {}", e);
            state.metrics.record_failure();
            build_error_response(503, "InternalServerError", &e.to_string())
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

fn build_response(status: u16, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text(status),
        content_type,
        body.len(),
        body
    )
}

fn build_json_response<T: Serialize>(status: u16, body: &T) -> String {
    match serde_json::to_string(body) {
        Ok(json) => build_response(status, "application/json", &json),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            build_response(500, "application/json", r#"{"error":"InternalServerError"}"#)
        }
    }
}

fn build_error_response(status: u16, error: &str, message: &str) -> String {
    build_json_response(
        status,
        &ErrorResponse {
            error,
            message: message.to_string(),
        },
    )
}

fn build_health_response(
    status: &ServiceStatus,
    holidays_loaded: usize,
    holidays_age_secs: Option<u64>,
) -> String {
    let body = serde_json::json!({
        "status": "ok",
        "holidays_loaded": holidays_loaded,
        "holidays_age_secs": holidays_age_secs,
        "calculations_ok": status.calculations_ok,
        "requests_invalid": status.requests_invalid,
        "calculations_failed": status.calculations_failed,
        "last_request_time": status.last_request_time,
    });
    build_json_response(200, &body)
}

fn build_metrics_response(status: &ServiceStatus, holidays_loaded: usize) -> String {
    // Prometheus-compatible metrics format
    let body = format!(
        "# HELP workdays_requests_total Total number of /calculate requests\n\
         # TYPE workdays_requests_total counter\n\
         workdays_requests_total{{result=\"ok\"}} {}\n\
         workdays_requests_total{{result=\"invalid\"}} {}\n\
         workdays_requests_total{{result=\"failed\"}} {}\n\
         # HELP workdays_last_request_timestamp Unix timestamp of last request\n\
         # TYPE workdays_last_request_timestamp gauge\n\
         workdays_last_request_timestamp {}\n\
         # HELP workdays_holidays_loaded Number of holiday dates in the cache\n\
         # TYPE workdays_holidays_loaded gauge\n\
         workdays_holidays_loaded {}\n",
        status.calculations_ok,
        status.requests_invalid,
        status.calculations_failed,
        status.last_request_time,
        holidays_loaded
    );

    build_response(200, "text/plain; version=0.0.4", &body)
}

fn build_not_found_response() -> String {
    build_error_response(
        404,
        "NotFound",
        "Endpoint not found. Use /calculate with query parameters days and/or hours",
    )
}
