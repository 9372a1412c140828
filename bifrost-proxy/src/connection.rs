//! Per-connection I/O: parses inbound HTTP/1.1, runs identity + the engine
//! decision, dispatches to upstream, and relays the full response back.
//! Streaming is a non-goal: both request and response bodies are fully
//! buffered.

use crate::engine::{self, Decision};
use crate::proxy::{self, ConnPool};
use crate::worker::SharedState;
use bifrost_core::headers::{remove_consumer_headers, remove_hop_and_cors};
use bifrost_core::token::normalize_ip;
use bifrost_observability::access_log::AccessRecord;
use bifrost_observability::gelf::LogRecord;
use http::{HeaderMap, HeaderName, HeaderValue};
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::TcpStream;
use std::cell::RefCell;
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;
use std::time::Instant;

const READ_CHUNK: usize = 8192;

enum DispatchError {
    Connection,
    Other,
}

/// Resolve `authority` (`host:port`) to candidate socket addresses,
/// IPv4-first — the blocking lookup only runs when the pool is empty.
fn resolve_addrs(authority: &str) -> Vec<SocketAddr> {
    if let Ok(sa) = authority.parse::<SocketAddr>() {
        return vec![sa];
    }
    let all: Vec<SocketAddr> = authority.to_socket_addrs().map(|i| i.collect()).unwrap_or_default();
    let mut v4: Vec<SocketAddr> = all.iter().copied().filter(|a| a.is_ipv4()).collect();
    v4.extend(all.iter().copied().filter(|a| a.is_ipv6()));
    v4
}

async fn dial(authority: &str) -> Result<TcpStream, DispatchError> {
    let candidates = resolve_addrs(authority);
    if candidates.is_empty() {
        return Err(DispatchError::Connection);
    }
    for addr in &candidates {
        match TcpStream::connect(*addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) if is_connection_error(&e) => continue,
            Err(_) => return Err(DispatchError::Other),
        }
    }
    Err(DispatchError::Connection)
}

fn is_connection_error(e: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(e.kind(), ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | TimedOut)
}

/// Read one read-chunk's worth of bytes, appending to `accumulated`.
/// Returns the number of bytes read (0 = peer closed).
async fn read_more(stream: &mut TcpStream, chunk: &mut Vec<u8>, accumulated: &mut Vec<u8>) -> Result<usize, DispatchError> {
    let (res, returned) = stream.read(std::mem::take(chunk)).await;
    *chunk = returned;
    let n = match res {
        Ok(n) => n,
        Err(e) if is_connection_error(&e) => return Err(DispatchError::Connection),
        Err(_) => return Err(DispatchError::Other),
    };
    accumulated.extend_from_slice(&chunk[..n]);
    if chunk.len() < READ_CHUNK {
        chunk.resize(READ_CHUNK, 0);
    }
    Ok(n)
}

async fn read_full_response(stream: &mut TcpStream) -> Result<(u16, HeaderMap, Vec<u8>), DispatchError> {
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut accumulated: Vec<u8> = Vec::with_capacity(READ_CHUNK);

    // ── Read until the status line + headers are fully parseable ──
    let (status, headers, content_length, header_len) = loop {
        let n = read_more(stream, &mut chunk, &mut accumulated).await?;
        if n == 0 && accumulated.is_empty() {
            return Err(DispatchError::Connection);
        }

        let mut header_storage = [httparse::EMPTY_HEADER; 64];
        let mut resp = httparse::Response::new(&mut header_storage);
        match resp.parse(&accumulated) {
            Ok(httparse::Status::Complete(header_len)) => {
                let status = resp.code.unwrap_or(502);
                let mut headers = HeaderMap::new();
                let mut content_length = None;
                for h in resp.headers.iter() {
                    if h.name.is_empty() {
                        break;
                    }
                    let value = std::str::from_utf8(h.value).unwrap_or("");
                    if h.name.eq_ignore_ascii_case("content-length") {
                        content_length = value.parse::<usize>().ok();
                    }
                    if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(h.name.as_bytes()), HeaderValue::from_str(value)) {
                        headers.append(name, value);
                    }
                }
                break (status, headers, content_length, header_len);
            }
            Ok(httparse::Status::Partial) => {
                if n == 0 {
                    return Err(DispatchError::Connection);
                }
                continue;
            }
            Err(_) => return Err(DispatchError::Other),
        }
    };

    // ── Read the remaining body, if any ──
    let body_want = content_length.unwrap_or(usize::MAX);
    loop {
        let body_have = accumulated.len() - header_len;
        if body_have >= body_want {
            break;
        }
        let n = read_more(stream, &mut chunk, &mut accumulated).await?;
        if n == 0 {
            break; // connection closed after full body, or no content-length given
        }
    }

    let body = accumulated[header_len..].to_vec();
    Ok((status, headers, body))
}

/// Build the outbound header set per 4.G step 7: strip hop-by-hop/CORS,
/// strip any smuggled `X-Consumer-*`, then re-attach identity/trace headers.
fn build_outbound_headers(
    mut headers: HeaderMap,
    shared: &SharedState,
    identity: &bifrost_core::Consumer,
    token_value: Option<&str>,
    client_ip: &str,
    request_id: &str,
) -> HeaderMap {
    remove_hop_and_cors(&mut headers, shared.config.cors.enable);
    remove_consumer_headers(&mut headers);

    if shared.config.forward_request_ip {
        if let Ok(value) = HeaderValue::from_str(client_ip) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
    }
    if shared.config.forward_request_id {
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(HeaderName::from_static("x-request-id"), value);
        }
    }

    if !identity.is_anonymous() {
        insert_header(&mut headers, "x-consumer-id", &identity.id);
        insert_header(&mut headers, "x-consumer-app", &identity.app);
        insert_header(&mut headers, "x-consumer-username", &identity.username);
        insert_header(&mut headers, "x-consumer-custom-id", &identity.custom_id);
        if !identity.roles.is_empty() {
            let roles: Vec<&str> = identity.roles.iter().map(String::as_str).collect();
            insert_header(&mut headers, "x-consumer-roles", &roles.join(","));
        }
        for (key, value) in &identity.custom_fields {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            let name = format!("x-consumer-{key}");
            insert_header(&mut headers, &name, value);
        }
    }

    if let Some(token) = token_value {
        insert_header(&mut headers, "x-token", token);
    }

    headers
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    }
}

struct InboundRequest {
    method: String,
    path: String,
    raw_query: String,
    host: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

fn parse_inbound(raw: &[u8]) -> Option<(InboundRequest, usize)> {
    let mut header_storage = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut header_storage);
    let header_len = match req.parse(raw).ok()? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return None,
    };

    let method = req.method.unwrap_or("GET").to_string();
    let full_path = req.path.unwrap_or("/");
    let (path, raw_query) = match full_path.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (full_path.to_string(), String::new()),
    };

    let mut headers = HeaderMap::new();
    let mut host = String::new();
    for h in req.headers.iter() {
        if h.name.is_empty() {
            break;
        }
        let value = std::str::from_utf8(h.value).unwrap_or("");
        if h.name.eq_ignore_ascii_case("host") {
            host = value.to_string();
        }
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(h.name.as_bytes()), HeaderValue::from_str(value)) {
            headers.append(name, value);
        }
    }

    Some((InboundRequest { method, path, raw_query, host, headers, body: Vec::new() }, header_len))
}

pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    shared: std::sync::Arc<SharedState>,
    conn_pool: Rc<RefCell<ConnPool>>,
) -> anyhow::Result<()> {
    let client_ip = normalize_ip(&peer_addr.ip().to_string());
    let mut read_buf = vec![0u8; READ_CHUNK];
    let mut filled = 0usize;

    loop {
        let (res, returned) = client.read(std::mem::take(&mut read_buf)).await;
        read_buf = returned;
        let n = match res {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(e.into()),
        };
        filled = n;

        let Some((mut inbound, header_len)) = parse_inbound(&read_buf[..filled]) else {
            let resp = b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
            let (res, _) = client.write_all(resp.to_vec()).await;
            res?;
            return Ok(());
        };
        inbound.body = read_buf[header_len..filled].to_vec();

        let started_at = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let bearer = inbound.headers.get("authorization").and_then(|v| v.to_str().ok()).map(|v| v.trim_start_matches("Bearer ").trim());

        let identity = crate::identity::resolve(
            bearer,
            &client_ip,
            shared.tokens.as_ref(),
            shared.consumers.as_ref(),
            &shared.config,
        )
        .await;

        let host = inbound.host.to_lowercase();
        let path = inbound.path.to_lowercase();

        let (status, resp_headers, resp_body, error_detail) = run_invoke(
            &shared,
            &conn_pool,
            &host,
            &path,
            &inbound,
            &identity,
            &client_ip,
            &request_id,
            0,
        )
        .await;

        let duration_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        shared.metrics.record_request(&inbound.path, &inbound.method, status, duration_ms / 1000.0);

        let access = AccessRecord {
            method: inbound.method.clone(),
            path: inbound.path.clone(),
            protocol: "HTTP/1.1".into(),
            status,
            content_length: resp_body.len() as u64,
            client_ip: client_ip.clone(),
            duration_ms,
            request_id: request_id.clone(),
            origin: inbound.headers.get("origin").and_then(|v| v.to_str().ok()).map(String::from),
            user_agent: inbound.headers.get("user-agent").and_then(|v| v.to_str().ok()).map(String::from),
            consumer_id: (!identity.is_anonymous()).then(|| identity.id.clone()),
            error: error_detail,
        };
        shared.access_log.emit(LogRecord::Access(access));

        let mut buf = Vec::with_capacity(resp_body.len() + 256);
        proxy::write_response_bytes(&mut buf, status, &resp_headers, &resp_body);
        let (res, _) = client.write_all(buf).await;
        res?;
    }
}

type InvokeOutcome = (u16, HeaderMap, Vec<u8>, Option<String>);

/// Recursive `invoke`: at most one retry after evicting a dead upstream.
async fn run_invoke(
    shared: &SharedState,
    conn_pool: &Rc<RefCell<ConnPool>>,
    host: &str,
    path: &str,
    inbound: &InboundRequest,
    identity: &crate::identity::Identity,
    client_ip: &str,
    request_id: &str,
    attempt: u8,
) -> InvokeOutcome {
    let decision = engine::decide(&shared.routes, &shared.services, host, path, &identity.consumer);

    match decision {
        Decision::NoMatch => (404, HeaderMap::new(), Vec::new(), None),
        Decision::Deny { status } => (status, HeaderMap::new(), Vec::new(), None),
        Decision::NoUpstream => (503, HeaderMap::new(), b"no upstreams available".to_vec(), Some("no upstreams available".into())),
        Decision::Allow { route, target_url, service, upstream_name } => {
            let url = engine::rewrite_url(&route, &target_url, &inbound.path, &inbound.raw_query);

            if route.redirect {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&url) {
                    headers.insert(HeaderName::from_static("location"), value);
                }
                return (301, headers, Vec::new(), None);
            }

            let Some((authority, path_and_query)) = proxy::split_url(&url) else {
                return (500, HeaderMap::new(), Vec::new(), Some("invalid upstream url".into()));
            };

            let mut outbound_headers = build_outbound_headers(
                inbound.headers.clone(),
                shared,
                &identity.consumer,
                identity.token_value.as_deref(),
                client_ip,
                request_id,
            );
            insert_header(&mut outbound_headers, "host", authority.split(':').next().unwrap_or(&authority));

            let dispatch_result =
                dispatch(conn_pool, &authority, &path_and_query, &inbound.method, &outbound_headers, &inbound.body).await;

            match dispatch_result {
                Ok((status, mut headers, body)) => {
                    let error_detail =
                        if !(200..400).contains(&status) { Some(String::from_utf8_lossy(&body).into_owned()) } else { None };

                    if shared.config.custom_errors && status == 500 {
                        remove_hop_and_cors(&mut headers, shared.config.cors.enable);
                        return (500, headers, Vec::new(), error_detail);
                    }

                    remove_hop_and_cors(&mut headers, shared.config.cors.enable);
                    (status, headers, body, error_detail)
                }
                Err(DispatchError::Connection) => {
                    if attempt == 0 {
                        if let (Some(service), Some(name)) = (service, upstream_name) {
                            service.unregister_upstream(&name);
                            return Box::pin(run_invoke(
                                shared, conn_pool, host, path, inbound, identity, client_ip, request_id, 1,
                            ))
                            .await;
                        }
                    }
                    (504, HeaderMap::new(), Vec::new(), Some("upstream unreachable".into()))
                }
                Err(DispatchError::Other) => {
                    (500, HeaderMap::new(), Vec::new(), Some("internal dispatch failure".into()))
                }
            }
        }
    }
}

async fn dispatch(
    conn_pool: &Rc<RefCell<ConnPool>>,
    authority: &str,
    path_and_query: &str,
    method: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(u16, HeaderMap, Vec<u8>), DispatchError> {
    let pooled = conn_pool.borrow_mut().take(authority);
    let mut stream = match pooled {
        Some(s) => s,
        None => dial(authority).await?,
    };

    let mut req_buf = Vec::with_capacity(body.len() + 512);
    proxy::write_request_bytes(&mut req_buf, method, path_and_query, headers, body);
    let (res, _) = stream.write_all(req_buf.clone()).await;
    if res.is_err() {
        stream = dial(authority).await?;
        let (res, _) = stream.write_all(req_buf).await;
        res.map_err(|_| DispatchError::Connection)?;
    }

    let result = read_full_response(&mut stream).await?;
    conn_pool.borrow_mut().put(authority.to_string(), stream);
    Ok(result)
}
