//! Linker configuration: reserved name prefixes and naming conventions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkerConfig {
    /// Provider-intrinsic namespaces. References into them always count as
    /// resolved.
    pub intrinsic_prefixes: Vec<String>,
    /// Marks deferred references that survive resolution and are rewritten
    /// by finalization.
    pub preserve_prefix: String,
    /// Hierarchical name separator.
    pub separator: String,
    /// Scope entry expanding to every function of the module.
    pub wildcard_scope: String,
    /// Entity type whose environment bindings use the secret prefix.
    pub secret_type: String,
    pub secret_env_prefix: String,
    pub plain_env_prefix: String,
    /// Delimiter used to join list values bound to environment variables.
    pub list_delimiter: String,
    /// Prefix of synthetic template-substitution arguments.
    pub synthetic_arg_prefix: String,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        LinkerConfig {
            intrinsic_prefixes: vec!["AWS::".to_owned()],
            preserve_prefix: "@".to_owned(),
            separator: "::".to_owned(),
            wildcard_scope: "all".to_owned(),
            secret_type: "Secret".to_owned(),
            secret_env_prefix: "SEC_".to_owned(),
            plain_env_prefix: "STR_".to_owned(),
            list_delimiter: ",".to_owned(),
            synthetic_arg_prefix: "P".to_owned(),
        }
    }
}

impl LinkerConfig {
    pub fn is_intrinsic(&self, key: &str) -> bool {
        self.intrinsic_prefixes
            .iter()
            .any(|p| !p.is_empty() && key.starts_with(p.as_str()))
    }

    /// Returns the bare name when `key` carries the preserve marker.
    pub fn strip_preserve<'k>(&self, key: &'k str) -> Option<&'k str> {
        if self.preserve_prefix.is_empty() {
            return None;
        }
        key.strip_prefix(self.preserve_prefix.as_str())
    }

    /// Keys that are never looked up in the graph and never block promotion.
    pub fn is_exempt(&self, key: &str) -> bool {
        self.is_intrinsic(key) || self.strip_preserve(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_recognize_reserved_names() {
        let config = LinkerConfig::default();
        assert!(config.is_exempt("AWS::Region"));
        assert!(config.is_exempt("@Bucket"));
        assert!(!config.is_exempt("Bucket"));
        assert_eq!(config.strip_preserve("@Bucket"), Some("Bucket"));
        assert_eq!(config.strip_preserve("Bucket"), None);
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: LinkerConfig =
            serde_json::from_str(r#"{"intrinsic_prefixes": ["AWS::", "Custom::"]}"#).unwrap();
        assert!(config.is_intrinsic("Custom::Thing"));
        assert_eq!(config.preserve_prefix, "@");
        assert_eq!(config.wildcard_scope, "all");
    }

    #[test]
    fn empty_preserve_prefix_disables_marker() {
        let config = LinkerConfig {
            preserve_prefix: String::new(),
            ..LinkerConfig::default()
        };
        assert!(!config.is_exempt("Bucket"));
    }
}
