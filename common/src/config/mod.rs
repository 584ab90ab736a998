use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err::ProxyError;

/// Full proxy configuration. Loaded once at startup and shared read-only;
/// there is no runtime reload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub proxy: ListenConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub capabilities: CapabilityConfig,
    #[serde(default)]
    pub transformations: TransformConfig,
    #[serde(default)]
    pub business_rules: BusinessRuleConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub base: BaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// "native" is the only compiled-in transport. "odbc" is recognized
    /// for compatibility with existing config files and rejected at
    /// startup.
    pub connection_type: String,

    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,

    pub pool_size: usize,
    pub pool_recycle_seconds: u64,
    pub pool_pre_ping: bool,
    pub acquire_timeout_seconds: u64,
    pub execute_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Structural features the backend rejects: "joins", "unions",
    /// "window_functions".
    pub unsupported_features: Vec<String>,
    /// Function names the backend rejects, e.g. "COUNT".
    pub unsupported_functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub unwrap_subqueries: bool,
    pub max_subquery_depth: usize,
    pub auto_fix_group_by: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRuleConfig {
    pub require_date_filter: bool,
    /// At least one of these must appear in every SELECT's WHERE clause.
    pub date_columns: Vec<String>,
    /// Empty means every schema not on the blocked list is allowed.
    pub allowed_schemas: Vec<String>,
    pub blocked_schemas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub block_writes: bool,
    pub write_operations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BaseConfig {
    /// Log output directory. Stdout-only when unset.
    pub log_dir: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            host: "0.0.0.0".to_string(),
            port: 3307,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            connection_type: "native".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: "".to_string(),
            database: "".to_string(),
            pool_size: 10,
            pool_recycle_seconds: 3600,
            pool_pre_ping: true,
            acquire_timeout_seconds: 30,
            execute_timeout_seconds: 60,
        }
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        CapabilityConfig {
            unsupported_features: vec![
                "joins".to_string(),
                "unions".to_string(),
                "window_functions".to_string(),
            ],
            unsupported_functions: vec!["COUNT".to_string()],
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            unwrap_subqueries: true,
            max_subquery_depth: 2,
            auto_fix_group_by: true,
        }
    }
}

impl Default for BusinessRuleConfig {
    fn default() -> Self {
        BusinessRuleConfig {
            require_date_filter: true,
            date_columns: vec!["cob_date".to_string(), "date_index".to_string()],
            allowed_schemas: vec![],
            blocked_schemas: vec![
                "mysql".to_string(),
                "information_schema".to_string(),
                "performance_schema".to_string(),
                "sys".to_string(),
            ],
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            block_writes: true,
            write_operations: vec![
                "INSERT".to_string(),
                "UPDATE".to_string(),
                "DELETE".to_string(),
                "DROP".to_string(),
                "CREATE".to_string(),
                "ALTER".to_string(),
                "TRUNCATE".to_string(),
                "REPLACE".to_string(),
                "GRANT".to_string(),
                "REVOKE".to_string(),
            ],
        }
    }
}

impl ProxyConfig {
    pub fn is_write_operation(&self, keyword: &str) -> bool {
        self.security
            .write_operations
            .iter()
            .any(|op| op.eq_ignore_ascii_case(keyword))
    }

    pub fn is_unsupported_feature(&self, feature: &str) -> bool {
        self.capabilities
            .unsupported_features
            .iter()
            .any(|f| f.eq_ignore_ascii_case(feature))
    }

    /// Blocked list wins; an empty allow list admits everything else.
    pub fn is_schema_allowed(&self, schema: &str) -> bool {
        if self
            .business_rules
            .blocked_schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
        {
            return false;
        }

        if self.business_rules.allowed_schemas.is_empty() {
            return true;
        }

        self.business_rules
            .allowed_schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
    }
}

/// Load the configuration file at `path`. A present-but-unreadable file
/// is an error, never a silent fall back to defaults.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<ProxyConfig, ProxyError> {
    let mut file = File::open(path.as_ref())?;
    let mut s = String::new();

    file.read_to_string(&mut s)?;
    toml::from_str(s.as_str()).map_err(|e| ProxyError::ConfigFileParse(e.to_string()))
}
