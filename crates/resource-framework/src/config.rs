//! # API Configuration
//!
//! Settings are plain JSON. A deployment ships a default document and, optionally, an
//! environment-specific one whose top-level keys replace the default's
//! (see [`ApiConfig::layered`]). Every key is optional.
//!
//! ```json
//! {
//!   "root": "/api",
//!   "version": "1.0.0",
//!   "navigator": { "default_limit": 20, "max_limit": 20 },
//!   "store": { "buffer_size": 64 },
//!   "hooks": { "timeout_ms": 30000 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration document must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL prefix every route is mounted under, e.g. `/api`.
    pub root: String,
    pub version: String,
    pub navigator: NavigatorConfig,
    pub store: StoreConfig,
    pub hooks: HookConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            version: "1.0.0".to_string(),
            navigator: NavigatorConfig::default(),
            store: StoreConfig::default(),
            hooks: HookConfig::default(),
        }
    }
}

/// Pagination window bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Page size when the caller gives none.
    pub default_limit: usize,
    /// Largest page a caller may ask for.
    pub max_limit: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the store actor's request channel.
    pub buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub timeout_ms: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl HookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ApiConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads `default_json`, then replaces its top-level keys with those of `env_json`.
    ///
    /// The merge is shallow: an environment `navigator` object replaces the whole default
    /// `navigator` object, and missing nested keys fall back to built-in defaults.
    pub fn layered(default_json: &str, env_json: Option<&str>) -> Result<Self, ConfigError> {
        let mut merged = object(default_json)?;
        if let Some(env_json) = env_json {
            for (key, value) in object(env_json)? {
                merged.insert(key, value);
            }
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

fn object(json: &str) -> Result<serde_json::Map<String, Value>, ConfigError> {
    match serde_json::from_str(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_json("{}").unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.navigator.default_limit, 20);
        assert_eq!(config.navigator.max_limit, 20);
        assert_eq!(config.hooks.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_layered_merge_is_shallow() {
        let default = r#"{"root": "/api", "navigator": {"default_limit": 10, "max_limit": 50}}"#;
        let env = r#"{"navigator": {"max_limit": 30}, "version": "2.0.0"}"#;

        let config = ApiConfig::layered(default, Some(env)).unwrap();
        assert_eq!(config.root, "/api");
        assert_eq!(config.version, "2.0.0");
        assert_eq!(config.navigator.max_limit, 30);
        // replaced wholesale, so the default document's 10 is gone
        assert_eq!(config.navigator.default_limit, 20);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            ApiConfig::layered("[]", None),
            Err(ConfigError::NotAnObject)
        ));
        assert!(matches!(
            ApiConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
