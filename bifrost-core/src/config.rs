use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the Bifrost gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BifrostConfig {
    #[serde(default)]
    pub debug: bool,

    /// Listen addresses for the proxy data plane, e.g. `[":8080"]`.
    #[serde(default = "default_binds")]
    pub binds: Vec<String>,

    /// Static bearer tokens authorizing admin calls. Empty = open admin.
    #[serde(default)]
    pub admin_tokens: Vec<String>,

    #[serde(default)]
    pub forward_request_ip: bool,

    #[serde(default)]
    pub forward_request_id: bool,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub gzip: GzipConfig,

    #[serde(default)]
    pub custom_errors: bool,

    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(rename = "type", default)]
    pub type_: DataStoreType,
    #[serde(default)]
    pub connection_string: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataStoreType {
    #[default]
    Memory,
    Mongodb,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token lifetime, **in minutes** (see DESIGN.md for why).
    #[serde(default = "default_token_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub verify_ip: bool,
    #[serde(default)]
    pub sliding_expiration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GzipConfig {
    #[serde(default)]
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default)]
    pub target: LogTargetConfig,
    #[serde(default = "default_true")]
    pub access_log: bool,
    #[serde(default = "default_true")]
    pub application_log: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTargetConfig {
    #[serde(rename = "type", default)]
    pub type_: LogTargetType,
    #[serde(default)]
    pub connection_string: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTargetType {
    #[default]
    Gelf,
    Graylog,
}

impl BifrostConfig {
    /// Load from an explicit YAML path, or else the first of a short list of
    /// default locations, then layer `BIFROST_*` environment overrides
    /// (e.g. `BIFROST_TOKEN__TIMEOUT`).
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["bifrost.yaml", "/etc/bifrost/bifrost.yaml", "config/bifrost.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("BIFROST_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }

    /// `token.timeout` (minutes) expressed as a `chrono::Duration`.
    pub fn token_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token.timeout as i64)
    }
}

impl Default for BifrostConfig {
    fn default() -> Self {
        Self {
            debug: false,
            binds: default_binds(),
            admin_tokens: Vec::new(),
            forward_request_ip: false,
            forward_request_id: false,
            data: DataConfig::default(),
            token: TokenConfig::default(),
            cors: CorsConfig::default(),
            gzip: GzipConfig::default(),
            custom_errors: false,
            logs: LogsConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            type_: DataStoreType::Memory,
            connection_string: String::new(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            timeout: default_token_timeout(),
            verify_ip: false,
            sliding_expiration: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self { enable: false }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            target: LogTargetConfig::default(),
            access_log: true,
            application_log: true,
        }
    }
}

impl Default for LogTargetConfig {
    fn default() -> Self {
        Self {
            type_: LogTargetType::Gelf,
            connection_string: String::new(),
        }
    }
}

fn default_binds() -> Vec<String> {
    vec![":8080".to_string()]
}

fn default_token_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
