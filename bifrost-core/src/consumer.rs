use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Authenticated principal, scoped by `app` (tenant namespace).
///
/// `(app, username)` is unique across the consumer store; `id` is unique on
/// its own. Created and mutated only via the admin control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Consumer {
    pub id: String,
    pub app: String,
    pub username: String,
    #[serde(default)]
    pub custom_id: String,
    #[serde(default)]
    pub roles: HashSet<String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Consumer {
    /// The anonymous consumer attached to every request that carries no
    /// valid bearer token. Never persisted.
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            app: String::new(),
            username: String::new(),
            custom_id: String::new(),
            roles: HashSet::new(),
            custom_fields: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }

    /// True iff `whitelist` is empty (no restriction) or shares at least one
    /// role with `whitelist`.
    pub fn has_any_role(&self, whitelist: &HashSet<String>) -> bool {
        if whitelist.is_empty() {
            return true;
        }
        self.roles.iter().any(|r| whitelist.contains(r))
    }
}
