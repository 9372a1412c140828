//! Header toolkit: hop-by-hop and CORS header stripping, non-overwriting copy.

use http::{HeaderMap, HeaderName};

/// Headers that apply to a single transport hop and must never be forwarded.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "cache-control",
];

/// Response headers that express the gateway's own CORS policy; any copy of
/// these arriving from upstream is stripped so the gateway stays authoritative.
pub const CORS_RESPONSE: &[&str] = &[
    "access-control-allow-origin",
    "access-control-allow-headers",
    "access-control-allow-methods",
];

/// Append every value from `src` into `dst` without overwriting existing entries.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.append(name.clone(), value.clone());
    }
}

/// Remove every hop-by-hop header from `headers`.
pub fn remove_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Remove every hop-by-hop header, and additionally the CORS response headers
/// when `cors_enabled` is true (so the gateway's CORS policy is authoritative).
pub fn remove_hop_and_cors(headers: &mut HeaderMap, cors_enabled: bool) {
    remove_hop(headers);
    if cors_enabled {
        for name in CORS_RESPONSE {
            headers.remove(*name);
        }
    }
}

/// Remove any inbound `X-Consumer-*` headers — defense-in-depth against a
/// client trying to smuggle identity claims past the gateway.
pub fn remove_consumer_headers(headers: &mut HeaderMap) {
    let to_remove: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().to_ascii_lowercase().starts_with("x-consumer-"))
        .cloned()
        .collect();
    for name in to_remove {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn copy_headers_appends_without_overwrite() {
        let mut dst = HeaderMap::new();
        dst.insert("x-existing", HeaderValue::from_static("1"));
        let mut src = HeaderMap::new();
        src.insert("x-existing", HeaderValue::from_static("2"));
        src.append("x-existing", HeaderValue::from_static("3"));
        copy_headers(&mut dst, &src);
        let values: Vec<_> = dst.get_all("x-existing").iter().collect();
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn remove_hop_strips_all_listed_headers() {
        let mut headers = HeaderMap::new();
        for h in HOP_BY_HOP {
            headers.insert(HeaderName::from_bytes(h.as_bytes()).unwrap(), HeaderValue::from_static("x"));
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        remove_hop(&mut headers);
        assert!(headers.get("content-type").is_some());
        for h in HOP_BY_HOP {
            assert!(headers.get(*h).is_none(), "{h} should have been removed");
        }
    }

    #[test]
    fn remove_hop_and_cors_only_strips_cors_when_enabled() {
        let mut headers = HeaderMap::new();
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
        remove_hop_and_cors(&mut headers, false);
        assert!(headers.get("access-control-allow-origin").is_some());

        remove_hop_and_cors(&mut headers, true);
        assert!(headers.get("access-control-allow-origin").is_none());
    }

    #[test]
    fn remove_consumer_headers_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Consumer-Id", HeaderValue::from_static("smuggled"));
        headers.insert("x-consumer-roles", HeaderValue::from_static("admin"));
        headers.insert("x-request-id", HeaderValue::from_static("keep-me"));
        remove_consumer_headers(&mut headers);
        assert!(headers.get("x-consumer-id").is_none());
        assert!(headers.get("x-consumer-roles").is_none());
        assert!(headers.get("x-request-id").is_some());
    }
}
