//! Minimal blocking HTTP/1.1 server over any Read + Write stream.
//!
//! httparse-based parsing for Unix domain sockets and TCP alike; both
//! implement Read + Write.
//!
//! Limited surface:
//! - One request per connection (no keep-alive)
//! - No chunked transfer encoding (rejected)
//! - POST requires Content-Length
//! - Header cap: 32 KiB, Body cap: 1 MiB (Read::take, not Content-Length trust)

use std::io::{Read, Write};

/// Maximum header section size (32 KiB)
const MAX_HEADER_SIZE: usize = 32 * 1024;

/// Maximum request body size (1 MiB)
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Parsed HTTP request
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// HTTP response to write back
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Why a request could not be read
#[derive(Debug, PartialEq, Eq)]
pub enum ReadError {
    /// Malformed or unsupported request (400)
    Malformed(String),
    /// Body exceeds `MAX_BODY_SIZE` (413)
    TooLarge,
}

impl ReadError {
    pub fn status(&self) -> u16 {
        match self {
            ReadError::Malformed(_) => 400,
            ReadError::TooLarge => 413,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ReadError::Malformed(msg) => msg,
            ReadError::TooLarge => "Request body too large",
        }
    }
}

/// Reason phrase for the status codes the service emits
fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn malformed(msg: impl Into<String>) -> Option<Result<HttpRequest, ReadError>> {
    Some(Err(ReadError::Malformed(msg.into())))
}

/// Read and parse one HTTP request from a stream.
///
/// Returns None if the connection closed before any byte arrived.
/// Returns Some(Err) for requests the caller should answer with an error.
pub fn read_request(stream: &mut impl Read) -> Option<Result<HttpRequest, ReadError>> {
    let mut header_buf = Vec::with_capacity(4096);
    let mut byte = [0u8; 1];

    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                if header_buf.is_empty() {
                    return None;
                }
                return malformed("Connection closed mid-request");
            }
            Ok(_) => {
                header_buf.push(byte[0]);
                if header_buf.len() > MAX_HEADER_SIZE {
                    return malformed("Headers too large");
                }
                if header_buf.len() >= 4 && header_buf[header_buf.len() - 4..] == *b"\r\n\r\n" {
                    break;
                }
            }
            Err(e) => {
                if header_buf.is_empty() {
                    return None;
                }
                return malformed(format!("Read error: {}", e));
            }
        }
    }

    let mut parsed_headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut parsed_headers);

    match req.parse(&header_buf) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return malformed("Incomplete HTTP request"),
        Err(e) => return malformed(format!("HTTP parse error: {}", e)),
    }

    let method = req.method.unwrap_or("").to_string();
    // Query strings are not routed on
    let path = req
        .path
        .unwrap_or("/")
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();

    let mut headers = Vec::new();
    let mut content_length: Option<usize> = None;
    let mut chunked = false;

    for h in req.headers.iter() {
        let name = h.name.to_string();
        let value = String::from_utf8_lossy(h.value).to_string();

        if name.eq_ignore_ascii_case("Content-Length") {
            content_length = value.trim().parse().ok();
        }
        if name.eq_ignore_ascii_case("Transfer-Encoding")
            && value.to_lowercase().contains("chunked")
        {
            chunked = true;
        }

        headers.push((name, value));
    }

    if chunked {
        return malformed("Chunked transfer encoding not supported");
    }

    let body = if method == "POST" || method == "PUT" || method == "PATCH" {
        let Some(len) = content_length else {
            return malformed("POST requires Content-Length");
        };
        if len > MAX_BODY_SIZE {
            return Some(Err(ReadError::TooLarge));
        }
        let mut body = Vec::with_capacity(len);
        if let Err(e) = stream.take(len as u64).read_to_end(&mut body) {
            return malformed(format!("Read error: {}", e));
        }
        if body.len() < len {
            return malformed("Connection closed mid-body");
        }
        body
    } else {
        Vec::new()
    };

    Some(Ok(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

/// Write an HTTP response to a stream.
pub fn write_response(stream: &mut impl Write, response: &HttpResponse) {
    let mut header_block = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason(response.status)
    );
    header_block.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    header_block.push_str("Connection: close\r\n");

    for (name, value) in &response.headers {
        header_block.push_str(&format!("{}: {}\r\n", name, value));
    }
    header_block.push_str("\r\n");

    // Client may have disconnected
    let _ = stream.write_all(header_block.as_bytes());
    if !response.body.is_empty() {
        let _ = stream.write_all(&response.body);
    }
    let _ = stream.flush();
}
