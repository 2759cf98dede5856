//! Minimal HTTP/1.1 plumbing: reads one request off a connection and
//! serialises one response back. Every connection carries exactly one
//! exchange (`Connection: close`).

use std::collections::HashMap;
use std::fmt;

use firos_types::FirosError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::payload;

/// Upper bound on the request line plus headers.
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Upper bound on a request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Options,
    Head,
    Other(String),
}

impl Method {
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "HEAD" => Method::Head,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
            Method::Options => write!(f, "OPTIONS"),
            Method::Head => write!(f, "HEAD"),
            Method::Other(token) => write!(f, "{token}"),
        }
    }
}

/// A fully-read inbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path component of the request target, without the query string.
    pub path: String,
    /// Raw query string (without the leading `?`).
    pub query: String,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Attach a header (builder-style).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Attach a body (builder-style).
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Query-string parameters, multi-valued keys preserved.
    pub fn query_params(&self) -> HashMap<String, Vec<String>> {
        payload::parse_query(&self.query)
    }
}

/// Split a request target into `(path, query)`. Absolute-form targets
/// (`http://host/path?q`) are reduced to their path.
fn split_target(target: &str) -> (String, String) {
    let target = match target.find("://") {
        Some(scheme_end) => {
            let rest = &target[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => target,
    };
    let target = target.split('#').next().unwrap_or_default();
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}

/// Read one request (head and body) from `reader`.
///
/// # Errors
///
/// * [`FirosError::Io`] – the socket failed or closed before a request line.
/// * [`FirosError::Decode`] – malformed request line, header or
///   `Content-Length`, or a head/body exceeding the size limits.
pub async fn read_request<R>(reader: &mut R) -> Result<HttpRequest, FirosError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head_bytes = 0usize;
    let request_line = read_head_line(reader, &mut head_bytes).await?;
    if request_line.is_empty() {
        return Err(FirosError::Io("connection closed before request line".into()));
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(FirosError::Decode(format!("malformed request line {request_line:?}")));
    };
    if !version.starts_with("HTTP/") {
        return Err(FirosError::Decode(format!("unsupported protocol {version:?}")));
    }

    let mut request = HttpRequest::new(Method::parse(method), target);

    loop {
        let line = read_head_line(reader, &mut head_bytes).await?;
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(FirosError::Decode(format!("malformed header {line:?}")));
        };
        request
            .headers
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = match request.header("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| FirosError::Decode(format!("invalid Content-Length {raw:?}")))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(FirosError::Decode(format!(
            "body of {content_length} bytes exceeds the limit of {MAX_BODY_BYTES}"
        )));
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    request.body = body;

    Ok(request)
}

/// Read one CRLF/LF-terminated head line without its terminator. Returns an
/// empty string at end of stream or on a blank line.
async fn read_head_line<R>(reader: &mut R, head_bytes: &mut usize) -> Result<String, FirosError>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let remaining = (MAX_HEAD_BYTES + 1).saturating_sub(*head_bytes) as u64;
    let n = (&mut *reader).take(remaining).read_until(b'\n', &mut raw).await?;
    *head_bytes += n;
    if *head_bytes > MAX_HEAD_BYTES {
        return Err(FirosError::Decode(format!(
            "request head exceeds the limit of {MAX_HEAD_BYTES} bytes"
        )));
    }
    let line = String::from_utf8(raw)
        .map_err(|_| FirosError::Decode("request head is not valid UTF-8".into()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Headers in emission order; `Content-Type` comes first.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// Append a header (builder-style).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Serialise status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
