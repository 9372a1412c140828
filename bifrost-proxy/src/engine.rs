//! Matching + target-selection decisions. Pure and synchronous: no I/O, so
//! it is exercised directly by unit tests without a runtime.

use bifrost_core::{Consumer, MatchOutcome, Route, RouteSet, Service, ServiceSet};
use std::sync::Arc;

/// What `decide` concluded the engine should do with this request.
pub enum Decision {
    /// Proxy to `target_url`. `service`/`upstream_name` are set when the
    /// target came from a service's `pick_upstream()`, so failure handling
    /// can evict that specific upstream and retry.
    Allow { route: Route, target_url: String, service: Option<Arc<Service>>, upstream_name: Option<String> },
    /// Route matched but `is_allow` denied it. `status` is 401 (anonymous)
    /// or 403 (authenticated but out of whitelist).
    Deny { status: u16 },
    /// No route matched host+path at all.
    NoMatch,
    /// Route matched and was allowed, but no live upstream exists.
    NoUpstream,
}

/// Steps 1-3 of `invoke`: match the route, then resolve its target.
pub fn decide(routes: &RouteSet, services: &ServiceSet, host: &str, path: &str, consumer: &Consumer) -> Decision {
    let route = match routes.match_route(host, path, consumer) {
        MatchOutcome::NoMatch => return Decision::NoMatch,
        MatchOutcome::Denied => {
            let status = if consumer.is_anonymous() { 401 } else { 403 };
            return Decision::Deny { status };
        }
        MatchOutcome::Allowed(route) => route,
    };

    if let Some(service_name) = &route.service {
        let service = services.get_by_name(service_name).or_else(|| services.get(service_name));
        let Some(service) = service else {
            return Decision::NoUpstream;
        };
        return match service.pick_upstream() {
            Some(upstream) => Decision::Allow {
                route,
                target_url: upstream.target_url,
                service: Some(service),
                upstream_name: Some(upstream.name),
            },
            None => Decision::NoUpstream,
        };
    }

    match route.target_url.clone() {
        Some(target_url) => Decision::Allow { route, target_url, service: None, upstream_name: None },
        None => Decision::NoUpstream,
    }
}

/// Step 4: strip the route's path prefix (case-insensitive) when configured,
/// then append the raw query string.
pub fn rewrite_url(route: &Route, target_url: &str, path: &str, raw_query: &str) -> String {
    let new_path = if route.strip_request_path {
        strip_prefix_ci(path, &route.request_path)
    } else {
        path
    };

    let mut url = String::with_capacity(target_url.len() + new_path.len() + raw_query.len() + 1);
    url.push_str(target_url.trim_end_matches('/'));
    if !new_path.starts_with('/') {
        url.push('/');
    }
    url.push_str(new_path);
    if !raw_query.is_empty() {
        url.push('?');
        url.push_str(raw_query);
    }
    url
}

fn strip_prefix_ci<'a>(path: &'a str, prefix: &str) -> &'a str {
    if prefix == "*" || prefix.is_empty() {
        return path;
    }
    if path.len() >= prefix.len() && path[..prefix.len()].eq_ignore_ascii_case(prefix) {
        let rest = &path[prefix.len()..];
        if rest.is_empty() { "/" } else { rest }
    } else {
        path
    }
}
