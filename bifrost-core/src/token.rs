use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A bearer credential binding an opaque key to a consumer.
///
/// `id` equals the bearer value presented in the `Authorization` header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub id: String,
    pub consumer_id: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    pub expiration: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(id: impl Into<String>, consumer_id: impl Into<String>, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            consumer_id: consumer_id.into(),
            ip_address: None,
            expiration: now + timeout,
            created_at: now,
        }
    }

    /// Seconds remaining until expiration, derived (never negative).
    pub fn expires_in(&self) -> i64 {
        (self.expiration - Utc::now()).num_seconds().max(0)
    }

    /// `now < expiration`. Call sites must delete the token on `false`.
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expiration
    }

    /// `true` if `ip` matches the bound IP, the wildcard `0.0.0.0` disables
    /// the check, or no IP is bound at all. `::1` is normalized to
    /// `127.0.0.1` before comparison.
    pub fn ip_allowed(&self, ip: &str) -> bool {
        let Some(bound) = &self.ip_address else {
            return true;
        };
        if bound == "0.0.0.0" {
            return true;
        }
        bound == normalize_ip(ip)
    }

    /// Push `expiration` out to `now + timeout`.
    pub fn slide(&mut self, timeout: Duration) {
        self.expiration = Utc::now() + timeout;
    }
}

/// Normalize IPv6 loopback to its IPv4 form, matching client-IP resolution
/// at the identity middleware.
pub fn normalize_ip(ip: &str) -> String {
    if ip == "::1" {
        "127.0.0.1".to_string()
    } else {
        ip.to_string()
    }
}
