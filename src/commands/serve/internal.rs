//! Internal implementation of the serve daemon

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::runtime::{self, RunDir};
use super::{microserver, ServeOptions};
use hearth::error::ServiceError;
use hearth::paths;
use hearth::service::{AppContext, RetrieveRequest, StoreRequest};

// === Transport-free request/response types ===
// Handlers use these, never raw-socket types. The accept loops convert at
// the boundary.

/// HTTP request independent of transport
struct HttpRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

/// HTTP response independent of transport
struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Get header value by name (case-insensitive)
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl HttpResponse {
    /// Create a JSON response
    fn json(status: u16, value: &impl Serialize) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    /// Add a header
    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

// === Server state ===

/// Server state shared across connection threads
pub struct ServerState {
    ctx: Arc<AppContext>,
    version: String,
    token: String,
}

impl ServerState {
    fn new(ctx: Arc<AppContext>, token: String) -> Self {
        Self {
            ctx,
            version: env!("CARGO_PKG_VERSION").to_string(),
            token,
        }
    }
}

// === Helpers ===

/// Generate a random 32-byte hex token
fn generate_token() -> String {
    (0..32)
        .map(|_| format!("{:02x}", fastrand::u8(..)))
        .collect()
}

/// Check bearer token authorization
fn check_auth(request: &HttpRequest, token: &str) -> bool {
    request
        .header("Authorization")
        .map(|h| h == format!("Bearer {}", token))
        .unwrap_or(false)
}

/// Add security headers to response
fn with_security_headers(response: HttpResponse) -> HttpResponse {
    response
        .with_header("X-Content-Type-Options", "nosniff")
        .with_header("X-Frame-Options", "DENY")
}

/// Consistent JSON error response
fn json_error(status: u16, kind: &str, message: &str) -> HttpResponse {
    HttpResponse::json(
        status,
        &serde_json::json!({"error": message, "kind": kind}),
    )
}

/// HTTP status for a service failure
fn status_for(err: &ServiceError) -> u16 {
    match err {
        ServiceError::Validation(_) => 422,
        ServiceError::NotReady(_) => 503,
        ServiceError::Embedding(_) => 502,
        ServiceError::Integrity(_) => 409,
        ServiceError::Schema(_)
        | ServiceError::Store(_)
        | ServiceError::Build(_)
        | ServiceError::DimensionMismatch { .. }
        | ServiceError::Consistency(_)
        | ServiceError::StoredButNotRefreshed { .. }
        | ServiceError::ReloadFailed(_)
        | ServiceError::Search(_) => 500,
    }
}

fn service_error(err: &ServiceError) -> HttpResponse {
    let status = status_for(err);
    if status >= 500 {
        warn!(kind = err.kind(), persisted = err.persisted(), error = %err, "request failed");
    }
    json_error(status, err.kind(), &err.to_string())
}

fn parse_body<T: DeserializeOwned>(request: &HttpRequest) -> Result<T, HttpResponse> {
    if request.body.is_empty() {
        return Err(json_error(400, "bad_request", "Missing request body"));
    }
    serde_json::from_slice(&request.body)
        .map_err(|e| json_error(400, "bad_request", &format!("Invalid JSON: {}", e)))
}

// === Transport-free handlers ===
// Business logic below this line never touches transport types.

/// Route request to handler
fn route_request(request: &HttpRequest, state: &ServerState, require_auth: bool) -> HttpResponse {
    let response = match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => handle_health(state),
        ("GET", "/version") => handle_version(state),
        // Auth is required for TCP only; on UDS the file permissions are the auth
        ("POST", _) if require_auth && !check_auth(request, &state.token) => {
            json_error(401, "unauthorized", "Unauthorized")
        }
        ("POST", "/store") => handle_store(request, state),
        ("POST", "/retrieve") => handle_retrieve(request, state),
        ("POST", "/reload_index") => handle_reload(state),
        _ => json_error(404, "not_found", "Not found"),
    };
    debug!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        "request"
    );
    with_security_headers(response)
}

/// Handle GET /health
fn handle_health(state: &ServerState) -> HttpResponse {
    HttpResponse::json(200, &state.ctx.health())
}

/// Handle GET /version
fn handle_version(state: &ServerState) -> HttpResponse {
    HttpResponse::json(
        200,
        &serde_json::json!({
            "version": state.version,
            "name": "hearth"
        }),
    )
}

/// Handle POST /store
fn handle_store(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let body: StoreRequest = match parse_body(request) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    match state.ctx.store(&body) {
        Ok(resp) => HttpResponse::json(200, &resp),
        Err(e) => service_error(&e),
    }
}

/// Handle POST /retrieve
fn handle_retrieve(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let body: RetrieveRequest = match parse_body(request) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    match state.ctx.retrieve(&body) {
        Ok(hits) => HttpResponse::json(200, &hits),
        Err(e) => service_error(&e),
    }
}

/// Handle POST /reload_index
fn handle_reload(state: &ServerState) -> HttpResponse {
    match state.ctx.reload() {
        Ok(resp) => HttpResponse::json(200, &resp),
        Err(e) => service_error(&e),
    }
}

// === Transport: microserver accept loop ===
// Handles both UDS and TCP via generic Read + Write streams.
// One request per connection. Thread per connection.

fn from_micro(req: microserver::HttpRequest) -> HttpRequest {
    HttpRequest {
        method: req.method,
        path: req.path,
        headers: req.headers,
        body: req.body,
    }
}

fn to_micro(resp: HttpResponse) -> microserver::HttpResponse {
    microserver::HttpResponse {
        status: resp.status,
        headers: resp.headers,
        body: resp.body,
    }
}

/// Handle one connection on any Read + Write stream.
///
/// Takes `&mut` so the caller keeps ownership and can `shutdown(Write)` the
/// concrete stream afterwards, letting the client see EOF promptly.
fn handle_connection(stream: &mut (impl Read + Write), state: &ServerState, require_auth: bool) {
    let resp = match microserver::read_request(stream) {
        Some(Ok(req)) => route_request(&from_micro(req), state, require_auth),
        Some(Err(e)) => {
            let kind = if e.status() == 413 {
                "too_large"
            } else {
                "bad_request"
            };
            with_security_headers(json_error(e.status(), kind, e.message()))
        }
        None => return,
    };

    microserver::write_response(stream, &to_micro(resp));
}

/// Run the serve daemon until SIGINT or SIGTERM
pub fn run_server(options: ServeOptions, ctx: Arc<AppContext>) -> Result<()> {
    let run_dir = RunDir::prepare(paths::serve::run_dir())?;
    debug!(dir = %run_dir.path().display(), "run directory ready");
    runtime::install_signal_handlers();

    // TCP opt-in path (--host flag), bearer token required
    if let Some(ref host) = options.host {
        let token = std::env::var("HEARTH_SERVE_TOKEN").unwrap_or_else(|_| generate_token());
        let token_file = run_dir.write_secret(paths::serve::TOKEN_FILE, token.as_bytes())?;
        let state = Arc::new(ServerState::new(ctx, token));
        let addr = format!("{}:{}", host, options.port);

        if host != "127.0.0.1" && host != "localhost" {
            warn!(
                host = %host,
                "binding to a non-loopback address exposes the server to the network (plain HTTP)"
            );
        }

        let listener = TcpListener::bind(&addr)?;
        info!(addr = %addr, token = %token_file.path().display(), "listening on tcp");
        println!("🚀 hearth memory service starting...");
        println!("   Listening on http://{}", addr);
        println!("   Auth token in {}", token_file.path().display());
        println!("   Press Ctrl+C to stop\n");

        accept_loop(listener, &state, true)?;
        info!("memory service stopped");
        return Ok(());
    }

    // Default: UDS path, no token (file permissions are auth)
    let state = Arc::new(ServerState::new(ctx, String::new()));
    let (listener, socket) = run_dir.bind_socket(paths::serve::SOCKET_FILE)?;

    info!(socket = %socket.path().display(), "listening on unix socket");
    println!("🚀 hearth memory service starting...");
    println!("   Listening on {}", socket.path().display());
    println!(
        "   Test: curl -s --unix-socket {} http://localhost/health",
        socket.path().display()
    );
    println!("   No TCP listener (use --host/--port for network access)");
    println!("   Press Ctrl+C to stop\n");

    accept_loop(listener, &state, false)?;
    info!("memory service stopped");
    Ok(())
}

/// How often an idle accept loop checks the shutdown flag
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// A listener the accept loop can poll
trait Listener {
    type Stream: Read + Write + Send + 'static;

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
    fn accept_stream(&self) -> io::Result<Self::Stream>;
}

/// A connection that can be switched back to blocking and half-closed
trait Connection {
    fn set_blocking(&self) -> io::Result<()>;
    fn finish(&mut self);
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpListener::set_nonblocking(self, nonblocking)
    }

    fn accept_stream(&self) -> io::Result<TcpStream> {
        self.accept().map(|(stream, _)| stream)
    }
}

impl Connection for TcpStream {
    fn set_blocking(&self) -> io::Result<()> {
        self.set_nonblocking(false)
    }

    fn finish(&mut self) {
        let _ = self.shutdown(Shutdown::Write);
    }
}

impl Listener for UnixListener {
    type Stream = UnixStream;

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixListener::set_nonblocking(self, nonblocking)
    }

    fn accept_stream(&self) -> io::Result<UnixStream> {
        self.accept().map(|(stream, _)| stream)
    }
}

impl Connection for UnixStream {
    fn set_blocking(&self) -> io::Result<()> {
        self.set_nonblocking(false)
    }

    fn finish(&mut self) {
        let _ = self.shutdown(Shutdown::Write);
    }
}

/// Thread per connection until shutdown is requested.
///
/// The listener is non-blocking so the loop can observe the shutdown flag
/// between connections; accepted streams are switched back to blocking.
fn accept_loop<L>(listener: L, state: &Arc<ServerState>, require_auth: bool) -> Result<()>
where
    L: Listener,
    L::Stream: Connection,
{
    listener.set_nonblocking(true)?;
    while !runtime::shutdown_requested() {
        match listener.accept_stream() {
            Ok(mut stream) => {
                if let Err(e) = stream.set_blocking() {
                    warn!(error = %e, "could not configure connection");
                    continue;
                }
                let state = Arc::clone(state);
                std::thread::spawn(move || {
                    handle_connection(&mut stream, &state, require_auth);
                    stream.finish();
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => std::thread::sleep(ACCEPT_POLL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => warn!(error = %e, "accept error"),
        }
    }
    Ok(())
}
