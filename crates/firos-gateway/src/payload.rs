//! Request parameter decoding.
//!
//! [`decode`] turns a request body into a [`Payload`] based on the declared
//! content type; [`parse_query`] handles query strings. Handlers match on the
//! closed [`Payload`] set instead of poking at loosely-typed maps.

use std::collections::HashMap;

use firos_types::FirosError;
use serde_json::Value;

/// Decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `application/x-www-form-urlencoded`: key → values, blank values kept.
    Form(HashMap<String, Vec<String>>),
    /// `multipart/form-data`: field name → raw part bytes. When a field
    /// name repeats, the last part wins.
    Multipart(HashMap<String, Vec<u8>>),
    /// `application/json`
    Json(Value),
    /// Missing or unrecognised content type.
    Empty,
}

/// Decode `body` according to `content_type`.
///
/// # Errors
///
/// Returns [`FirosError::Decode`] for invalid JSON, a multipart body without
/// a `boundary` parameter, or a truncated multipart body.
pub fn decode(content_type: Option<&str>, body: &[u8]) -> Result<Payload, FirosError> {
    let Some(content_type) = content_type else {
        return Ok(Payload::Empty);
    };
    let (mime, params) = parse_content_type(content_type);
    match mime.as_str() {
        "multipart/form-data" => {
            let boundary = params.get("boundary").ok_or_else(|| {
                FirosError::Decode("multipart body without boundary parameter".into())
            })?;
            parse_multipart(body, boundary).map(Payload::Multipart)
        }
        "application/x-www-form-urlencoded" => Ok(Payload::Form(parse_urlencoded(
            &String::from_utf8_lossy(body),
            true,
        ))),
        "application/json" => serde_json::from_slice(body)
            .map(Payload::Json)
            .map_err(|e| FirosError::Decode(format!("invalid JSON body: {e}"))),
        _ => Ok(Payload::Empty),
    }
}

/// Parse a query string. Keys without a value are dropped.
pub fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    parse_urlencoded(query, false)
}

/// Split a `Content-Type` header into its lower-cased media type and its
/// parameters (names lower-cased, quotes stripped from values).
pub fn parse_content_type(header: &str) -> (String, HashMap<String, String>) {
    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let params = parts
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            Some((
                name.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();
    (mime, params)
}

fn parse_urlencoded(input: &str, keep_blank_values: bool) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    for pair in input.split(['&', ';']).filter(|p| !p.is_empty()) {
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (name, value),
            None if keep_blank_values => (pair, ""),
            None => continue,
        };
        if value.is_empty() && !keep_blank_values {
            continue;
        }
        params
            .entry(percent_decode(name))
            .or_default()
            .push(percent_decode(value));
    }
    params
}

/// `+` → space, `%XX` → byte. Malformed escapes are kept literally.
fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => match (
                bytes.get(i + 1).and_then(hex_value),
                bytes.get(i + 2).and_then(hex_value),
            ) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'%'),
            },
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: &u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<HashMap<String, Vec<u8>>, FirosError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut separator = b"\r\n".to_vec();
    separator.extend_from_slice(&delimiter);

    let truncated = || FirosError::Decode("truncated multipart body".into());

    let mut cursor = find(body, &delimiter, 0).ok_or_else(truncated)? + delimiter.len();
    let mut fields = HashMap::new();

    loop {
        if body[cursor..].starts_with(b"--") {
            return Ok(fields);
        }
        cursor = find(body, b"\r\n", cursor).ok_or_else(truncated)? + 2;

        let head_end = find(body, b"\r\n\r\n", cursor).ok_or_else(truncated)?;
        let head = String::from_utf8_lossy(&body[cursor..head_end]);
        let content_start = head_end + 4;
        let content_end = find(body, &separator, content_start).ok_or_else(truncated)?;

        if let Some(name) = part_name(&head) {
            fields.insert(name, body[content_start..content_end].to_vec());
        }
        cursor = content_end + separator.len();
    }
}

/// `name` parameter of a part's `Content-Disposition` header.
fn part_name(head: &str) -> Option<String> {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-disposition"))
        .and_then(|(_, value)| {
            let (_, params) = parse_content_type(value);
            params.get("name").cloned()
        })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
