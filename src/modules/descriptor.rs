//! # Module descriptors.
//!
//! The inbound configuration is an ordered list of descriptors, usually
//! decoded from JSON:
//!
//! ```json
//! {
//!   "modules": [
//!     { "id": "feed",  "type": "ticker", "tasks_queue_size": 64, "params": { "period_ms": 500 } },
//!     { "id": "spare", "type": "ticker", "disable": true }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SupervisorError;

/// One module entry of the configuration. Immutable after load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique identifier.
    pub id: String,
    /// Type tag handed to the factory.
    #[serde(rename = "type")]
    pub module_type: String,
    /// Disabled entries are skipped by the loader.
    #[serde(default, rename = "disable")]
    pub disabled: bool,
    /// Queue-size hint for the module's own executor.
    #[serde(default, rename = "tasks_queue_size", skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
    /// Opaque parameters passed to `Module::configure`.
    #[serde(default)]
    pub params: Value,
}

impl ModuleDescriptor {
    /// Creates an enabled descriptor with no parameters.
    pub fn new(id: impl Into<String>, module_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module_type: module_type.into(),
            disabled: false,
            queue_size: None,
            params: Value::Null,
        }
    }

    /// Sets the parameters payload.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Sets the queue-size hint.
    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = Some(size);
        self
    }

    /// Marks the descriptor disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Top-level modules configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Ordered module descriptors.
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
}

impl ModulesConfig {
    /// Decodes a JSON document.
    pub fn parse(text: &str) -> Result<Self, SupervisorError> {
        serde_json::from_str(text).map_err(|e| SupervisorError::InvalidConfiguration {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_descriptor_fields() {
        let cfg = ModulesConfig::parse(
            r#"{"modules":[
                {"id":"feed","type":"ticker","tasks_queue_size":64,"params":{"period_ms":500}},
                {"id":"spare","type":"ticker","disable":true}
            ]}"#,
        )
        .unwrap();

        assert_eq!(cfg.modules.len(), 2);
        let feed = &cfg.modules[0];
        assert_eq!(feed.module_type, "ticker");
        assert_eq!(feed.queue_size, Some(64));
        assert_eq!(feed.params, json!({"period_ms": 500}));
        assert!(!feed.disabled);

        let spare = &cfg.modules[1];
        assert!(spare.disabled);
        assert_eq!(spare.params, Value::Null);
        assert_eq!(spare.queue_size, None);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ModulesConfig::parse("{\"modules\": [").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn missing_type_is_invalid() {
        let err = ModulesConfig::parse(r#"{"modules":[{"id":"x"}]}"#).unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
    }
}
