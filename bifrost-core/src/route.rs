use crate::consumer::Consumer;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A declarative forwarding rule: (host, path-prefix) -> target or named service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub request_host: String,
    pub request_path: String,
    #[serde(default)]
    pub strip_request_path: bool,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub redirect: bool,
    #[serde(default)]
    pub authorization: bool,
    #[serde(default)]
    pub whitelist: HashSet<String>,
    #[serde(default)]
    pub weight: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Route {
    /// Whether `consumer` may use this route. Does not check host/path — only
    /// the authorization/whitelist gate.
    pub fn is_allow(&self, consumer: &Consumer) -> bool {
        if self.authorization && consumer.is_anonymous() {
            return false;
        }
        consumer.has_any_role(&self.whitelist)
    }

    fn host_matches(&self, host: &str) -> bool {
        self.request_host == "*" || self.request_host.eq_ignore_ascii_case(host)
    }

    fn path_matches(&self, path: &str) -> bool {
        if self.request_path == "*" {
            return true;
        }
        path.to_ascii_lowercase()
            .starts_with(&self.request_path.to_ascii_lowercase())
    }
}

/// The outcome of attempting to match a request against the route set.
pub enum MatchOutcome {
    /// A route matched and `consumer` is allowed to use it.
    Allowed(Route),
    /// A route matched host+path but denied the consumer (401 if anonymous, 403 otherwise).
    Denied,
    /// No route matched host+path at all.
    NoMatch,
}

/// In-memory, reloadable, priority-ordered route set.
///
/// Readers take an `ArcSwap::load` snapshot; `reload` builds a fresh sorted
/// vector and swaps the pointer atomically. No reader ever observes a
/// partially updated list.
pub struct RouteSet {
    snapshot: ArcSwap<Vec<Route>>,
}

impl RouteSet {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            snapshot: ArcSwap::new(Arc::new(sorted(routes))),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Replace the working set wholesale, sorted by (`-weight`, `+created_at`).
    pub fn reload(&self, routes: Vec<Route>) {
        self.snapshot.store(Arc::new(sorted(routes)));
    }

    pub fn snapshot(&self) -> Arc<Vec<Route>> {
        self.snapshot.load_full()
    }

    /// Case-insensitive host compare (`*` matches any), prefix path compare
    /// in lowercase (`*` matches any). First hit wins.
    pub fn match_route(&self, host: &str, path: &str, consumer: &Consumer) -> MatchOutcome {
        let routes = self.snapshot.load();
        let mut saw_host_path_match = false;
        for route in routes.iter() {
            if route.host_matches(host) && route.path_matches(path) {
                saw_host_path_match = true;
                if route.is_allow(consumer) {
                    return MatchOutcome::Allowed(route.clone());
                }
            }
        }
        if saw_host_path_match {
            MatchOutcome::Denied
        } else {
            MatchOutcome::NoMatch
        }
    }
}

fn sorted(mut routes: Vec<Route>) -> Vec<Route> {
    routes.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.created_at.cmp(&b.created_at)));
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn route(id: &str, weight: i32, created_offset_secs: i64) -> Route {
        Route {
            id: id.to_string(),
            name: id.to_string(),
            request_host: "*".to_string(),
            request_path: "/".to_string(),
            strip_request_path: false,
            target_url: Some("http://u.local".to_string()),
            service: None,
            redirect: false,
            authorization: false,
            whitelist: HashSet::new(),
            weight,
            created_at: Utc::now() + Duration::seconds(created_offset_secs),
        }
    }

    #[test]
    fn match_route_orders_by_weight_descending() {
        let set = RouteSet::new(vec![route("low", 1, 0), route("high", 10, 0)]);
        match set.match_route("any.example", "/x", &Consumer::anonymous()) {
            MatchOutcome::Allowed(r) => assert_eq!(r.id, "high"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn ties_broken_by_created_at_ascending() {
        let set = RouteSet::new(vec![route("newer", 5, 10), route("older", 5, 0)]);
        match set.match_route("any.example", "/x", &Consumer::anonymous()) {
            MatchOutcome::Allowed(r) => assert_eq!(r.id, "older"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn wildcard_host_and_path_match_anything() {
        let set = RouteSet::new(vec![route("r", 0, 0)]);
        assert!(matches!(
            set.match_route("whatever.example", "/anything", &Consumer::anonymous()),
            MatchOutcome::Allowed(_)
        ));
    }

    #[test]
    fn exact_host_is_case_insensitive() {
        let mut r = route("r", 0, 0);
        r.request_host = "API.example.com".to_string();
        let set = RouteSet::new(vec![r]);
        assert!(matches!(
            set.match_route("api.example.com", "/", &Consumer::anonymous()),
            MatchOutcome::Allowed(_)
        ));
    }

    #[test]
    fn no_host_path_match_is_no_match() {
        let mut r = route("r", 0, 0);
        r.request_host = "only.example.com".to_string();
        let set = RouteSet::new(vec![r]);
        assert!(matches!(
            set.match_route("other.example.com", "/", &Consumer::anonymous()),
            MatchOutcome::NoMatch
        ));
    }

    #[test]
    fn authorization_required_denies_anonymous() {
        let mut r = route("r", 0, 0);
        r.authorization = true;
        let set = RouteSet::new(vec![r]);
        assert!(matches!(
            set.match_route("x.example", "/", &Consumer::anonymous()),
            MatchOutcome::Denied
        ));
    }

    #[test]
    fn whitelist_denies_consumer_without_role() {
        let mut r = route("r", 0, 0);
        r.whitelist.insert("admin".to_string());
        let set = RouteSet::new(vec![r]);
        let mut consumer = Consumer::anonymous();
        consumer.id = "c1".to_string();
        consumer.roles.insert("user".to_string());
        assert!(matches!(
            set.match_route("x.example", "/", &consumer),
            MatchOutcome::Denied
        ));
    }

    #[test]
    fn whitelist_allows_consumer_with_role() {
        let mut r = route("r", 0, 0);
        r.whitelist.insert("admin".to_string());
        let set = RouteSet::new(vec![r]);
        let mut consumer = Consumer::anonymous();
        consumer.id = "c1".to_string();
        consumer.roles.insert("admin".to_string());
        assert!(matches!(
            set.match_route("x.example", "/", &consumer),
            MatchOutcome::Allowed(_)
        ));
    }

    #[test]
    fn reload_replaces_the_snapshot() {
        let set = RouteSet::new(vec![route("a", 0, 0)]);
        assert_eq!(set.snapshot().len(), 1);
        set.reload(vec![route("a", 0, 0), route("b", 0, 1)]);
        assert_eq!(set.snapshot().len(), 2);
    }
}
