use serde::Serialize;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// GELF-style timestamp: seconds since the epoch with a fractional component.
pub fn gelf_timestamp() -> f64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs_f64()
}

/// One request's worth of access-log detail, emitted after the handler
/// returns regardless of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AccessRecord {
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub status: u16,
    pub content_length: u64,
    pub client_ip: String,
    pub duration_ms: f64,
    pub request_id: String,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub consumer_id: Option<String>,
    /// Set when `status` fell outside `[200, 400)`: the error body/message
    /// attached to the request context.
    pub error: Option<String>,
}

impl AccessRecord {
    /// GELF wire form: `host`, `short_message`, `timestamp`, plus
    /// `_`-prefixed custom fields.
    pub fn to_gelf(&self, host: &str) -> Value {
        let mut obj = json!({
            "version": "1.1",
            "host": host,
            "short_message": format!("{} {} {}", self.method, self.path, self.status),
            "timestamp": gelf_timestamp(),
            "_request_id": self.request_id,
            "_status": self.status,
            "_content_length": self.content_length,
            "_client_ip": self.client_ip,
            "_duration": self.duration_ms,
            "_method": self.method,
            "_path": self.path,
            "_protocol": self.protocol,
        });
        let map = obj.as_object_mut().expect("object literal");
        if let Some(ua) = &self.user_agent {
            map.insert("_userAgent".into(), json!(ua));
        }
        if let Some(origin) = &self.origin {
            map.insert("_origin".into(), json!(origin));
        }
        if let Some(consumer_id) = &self.consumer_id {
            map.insert("_consumer_id".into(), json!(consumer_id));
        }
        if !(200..400).contains(&self.status) {
            if let Some(err) = &self.error {
                map.insert("full_message".into(), json!(err));
            }
        }
        obj
    }
}

/// Emitted by the recovery middleware when a handler raises.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationRecord {
    pub severity: &'static str,
    pub short_message: String,
    pub full_message: String,
    pub request_id: Option<String>,
}

impl ApplicationRecord {
    pub fn to_gelf(&self, host: &str) -> Value {
        let mut obj = json!({
            "version": "1.1",
            "host": host,
            "short_message": self.short_message,
            "full_message": self.full_message,
            "timestamp": gelf_timestamp(),
            "level": self.severity,
        });
        if let Some(request_id) = &self.request_id {
            obj.as_object_mut()
                .expect("object literal")
                .insert("_request_id".into(), json!(request_id));
        }
        obj
    }
}
