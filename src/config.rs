//! Core configuration

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};

/// Settings applied when a [`CoreService`](crate::handlers::CoreService) starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Install the meta model when the store holds none yet
    pub bootstrap_meta_model: bool,
    /// Load every stored type into the cache at startup
    pub preload_types: bool,
    /// Upper bound for recursion in cascading deletes and child loading
    pub max_cascade_depth: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bootstrap_meta_model: true,
            preload_types: false,
            max_cascade_depth: 64,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = CoreConfig::from_json_str(r#"{"preload_types": true}"#).unwrap();
        assert!(config.preload_types);
        assert!(config.bootstrap_meta_model);
        assert_eq!(config.max_cascade_depth, 64);
    }

    #[test]
    fn test_malformed_config() {
        assert!(matches!(
            CoreConfig::from_json_str("{\"max_cascade_depth\": -1}"),
            Err(CoreError::Serialization(_))
        ));
    }
}
