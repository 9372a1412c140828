//! Outbound dispatch plumbing: a thread-local per-host connection pool, and
//! byte-level HTTP/1.1 request/response builders operating on `HeaderMap`.

use http::{HeaderMap, HeaderName, HeaderValue};
use monoio::net::TcpStream;
use std::collections::{HashMap, VecDeque};

/// Split a fully-rewritten URL (`http://host:port/path?query`) into its
/// authority (for the TCP connect) and its path+query (for the request
/// line and `Host` header).
pub fn split_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://"))?;
    let (authority, path_and_query) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return None;
    }
    let authority = if authority.contains(':') { authority.to_string() } else { format!("{authority}:80") };
    Some((authority, path_and_query.to_string()))
}

/// Thread-local, per-host idle-connection pool for upstream dispatch
/// (suggested default: 20 idle connections per host).
pub struct ConnPool {
    pools: HashMap<String, VecDeque<TcpStream>>,
    max_idle: usize,
}

impl ConnPool {
    pub fn new(max_idle_per_host: usize) -> Self {
        Self { pools: HashMap::new(), max_idle: max_idle_per_host }
    }

    pub fn take(&mut self, authority: &str) -> Option<TcpStream> {
        self.pools.get_mut(authority).and_then(|q| q.pop_front())
    }

    pub fn put(&mut self, authority: String, stream: TcpStream) {
        let queue = self.pools.entry(authority).or_insert_with(VecDeque::new);
        if queue.len() < self.max_idle {
            queue.push_back(stream);
        }
    }
}

impl Default for ConnPool {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Serialize a request line + headers + body into `buf` (cleared first).
pub fn write_request_bytes(buf: &mut Vec<u8>, method: &str, path_and_query: &str, headers: &HeaderMap, body: &[u8]) {
    buf.clear();
    buf.extend_from_slice(method.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(path_and_query.as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");
    write_headers(buf, headers);
    if !body.is_empty() {
        buf.extend_from_slice(b"content-length: ");
        let mut itoa_buf = itoa::Buffer::new();
        buf.extend_from_slice(itoa_buf.format(body.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"connection: keep-alive\r\n\r\n");
    buf.extend_from_slice(body);
}

/// Serialize a status line + headers + body into `buf` (cleared first).
pub fn write_response_bytes(buf: &mut Vec<u8>, status: u16, headers: &HeaderMap, body: &[u8]) {
    buf.clear();
    buf.extend_from_slice(b"HTTP/1.1 ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(status).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status_text(status).as_bytes());
    buf.extend_from_slice(b"\r\n");
    write_headers(buf, headers);
    buf.extend_from_slice(b"content-length: ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(body.len()).as_bytes());
    buf.extend_from_slice(b"\r\nconnection: keep-alive\r\n\r\n");
    buf.extend_from_slice(body);
}

fn write_headers(buf: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

pub fn header_map_from_pairs(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            map.append(name, value);
        }
    }
    map
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_url_separates_authority_and_path() {
        let (authority, path) = split_url("http://backend.local:9090/v1/users?x=1").unwrap();
        assert_eq!(authority, "backend.local:9090");
        assert_eq!(path, "/v1/users?x=1");
    }

    #[test]
    fn split_url_defaults_port_80() {
        let (authority, _) = split_url("http://backend.local/").unwrap();
        assert_eq!(authority, "backend.local:80");
    }

    #[test]
    fn split_url_rejects_unknown_scheme() {
        assert!(split_url("ftp://backend.local/").is_none());
    }

    #[test]
    fn write_request_bytes_includes_status_line_and_body() {
        let mut buf = Vec::new();
        let headers = header_map_from_pairs(&[("x-a", "1")]);
        write_request_bytes(&mut buf, "POST", "/x", &headers, b"body");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("POST /x HTTP/1.1\r\n"));
        assert!(text.contains("x-a: 1\r\n"));
        assert!(text.contains("content-length: 4\r\n"));
        assert!(text.ends_with("body"));
    }

    #[test]
    fn write_response_bytes_includes_status_text() {
        let mut buf = Vec::new();
        write_response_bytes(&mut buf, 404, &HeaderMap::new(), b"");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn conn_pool_respects_max_idle() {
        let pool = ConnPool::new(0);
        assert_eq!(pool.max_idle, 0);
    }
}
