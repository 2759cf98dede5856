//! Response shaping shared by the handlers.
//!
//! JSON responses (catalog, snapshot, relayed broker errors) carry the
//! permissive [`CORS_HEADERS`]. The plain-text notification acknowledgment
//! and the generic page do not.

use firos_types::FirosError;
use serde::Serialize;
use tracing::error;

use crate::http::HttpResponse;

/// Body of the fallback page served for unmatched routes.
pub const GENERIC_PAGE: &str = "GENERIC PAGE";

/// Body of every notification acknowledgment.
pub const ACK_BODY: &str = "Received by firos";

const CORS_ALLOWED_HEADERS: &str =
    "api-version, content-length, content-md5, content-type, date, request-id, response-time";

/// Fixed CORS header set for browser-facing JSON responses.
pub const CORS_HEADERS: [(&str, &str); 5] = [
    ("Access-Control-Allow-Credentials", "true"),
    ("Access-Control-Allow-Headers", CORS_ALLOWED_HEADERS),
    ("Access-Control-Allow-Methods", "GET,POST,PUT,DELETE"),
    ("Access-Control-Expose-Headers", CORS_ALLOWED_HEADERS),
    ("Access-Control-Allow-Origin", "*"),
];

/// 200 `text/html` fallback for routing misses.
pub fn generic_page() -> HttpResponse {
    HttpResponse::new(200, "text/html", GENERIC_PAGE)
}

/// 200 `text/plain` acknowledgment sent to the broker.
pub fn acknowledgment() -> HttpResponse {
    HttpResponse::new(200, "text/plain", ACK_BODY)
}

/// Append [`CORS_HEADERS`] to `response`.
pub fn with_cors(response: HttpResponse) -> HttpResponse {
    CORS_HEADERS
        .iter()
        .fold(response, |response, (name, value)| response.with_header(name, value))
}

/// Serialise `body` as an `application/json` response with CORS headers.
pub fn json<T: Serialize + ?Sized>(status: u16, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_cors(HttpResponse::new(status, "application/json", bytes)),
        Err(e) => internal_error(&FirosError::from(e)),
    }
}

/// 500 `text/plain` carrying the error description.
pub fn internal_error(err: &FirosError) -> HttpResponse {
    error!(kind = err.kind(), error = %err, "request failed");
    HttpResponse::new(500, "text/plain", err.to_string())
}

/// 400 `text/plain` for requests that could not be read.
pub fn bad_request(err: &FirosError) -> HttpResponse {
    HttpResponse::new(400, "text/plain", err.to_string())
}
