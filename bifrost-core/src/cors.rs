use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// CORS policy singleton. `*` in `allowed_origins` matches any origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsPolicy {
    #[serde(default)]
    pub allowed_origins: HashSet<String>,
}

impl CorsPolicy {
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.contains("*") || self.allowed_origins.contains(origin)
    }
}
