//! Configuration types

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::namespace::KeyNamespace;

/// What `flush` does when deleting one object fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Stop at the first failed delete and return its error. Objects not yet
    /// visited stay cached.
    #[default]
    AbortOnFirstError,
    /// Attempt every delete, then report all failures together.
    ContinueOnError,
}

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Namespace for this cache's objects inside the bucket.
    pub key_prefix: String,
    /// Bucket (or database) the objects live in.
    pub bucket: String,
    /// Name of the owning cache, used as a metrics label.
    pub cache_name: String,
    #[serde(default)]
    pub flush_policy: FlushPolicy,
}

impl BackendConfig {
    pub fn new(
        key_prefix: impl Into<String>,
        bucket: impl Into<String>,
        cache_name: impl Into<String>,
    ) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            bucket: bucket.into(),
            cache_name: cache_name.into(),
            flush_policy: FlushPolicy::default(),
        }
    }

    /// Set the flush policy.
    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Parse a `[backend]`-less TOML document holding the fields above.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("key_prefix", &self.key_prefix),
            ("bucket", &self.bucket),
            ("cache_name", &self.cache_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.key_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults_to_abort() {
        let config = BackendConfig::new("pages", "cache-bucket", "frontend");
        assert_eq!(config.flush_policy, FlushPolicy::AbortOnFirstError);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = BackendConfig::new("pages", "cache-bucket", "frontend")
            .with_flush_policy(FlushPolicy::ContinueOnError)
            .with_key_prefix("pages-v2");
        assert_eq!(config.flush_policy, FlushPolicy::ContinueOnError);
        assert_eq!(config.key_prefix, "pages-v2");
        assert_eq!(config.namespace().prefix(), "pages-v2");
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let cases = [
            (BackendConfig::new("", "b", "c"), "key_prefix"),
            (BackendConfig::new("p", "  ", "c"), "bucket"),
            (BackendConfig::new("p", "b", ""), "cache_name"),
        ];
        for (config, field) in cases {
            assert_eq!(
                config.validate(),
                Err(ConfigError::MissingRequired {
                    field: field.to_string()
                })
            );
        }
    }

    #[test]
    fn test_from_toml_str() {
        let config = BackendConfig::from_toml_str(
            r#"
            key_prefix = "sessions"
            bucket = "shared-cache"
            cache_name = "session-cache"
            flush_policy = "continue_on_error"
            "#,
        )
        .expect("config should parse");
        assert_eq!(config.key_prefix, "sessions");
        assert_eq!(config.bucket, "shared-cache");
        assert_eq!(config.cache_name, "session-cache");
        assert_eq!(config.flush_policy, FlushPolicy::ContinueOnError);
    }

    #[test]
    fn test_from_toml_str_default_policy() {
        let config = BackendConfig::from_toml_str(
            r#"
            key_prefix = "sessions"
            bucket = "shared-cache"
            cache_name = "session-cache"
            "#,
        )
        .expect("config should parse");
        assert_eq!(config.flush_policy, FlushPolicy::AbortOnFirstError);
    }

    #[test]
    fn test_from_toml_str_unknown_policy() {
        let err = BackendConfig::from_toml_str(
            r#"
            key_prefix = "sessions"
            bucket = "shared-cache"
            cache_name = "session-cache"
            flush_policy = "sometimes"
            "#,
        )
        .expect_err("unknown policy should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_toml_str_validates() {
        let err = BackendConfig::from_toml_str(
            r#"
            key_prefix = ""
            bucket = "shared-cache"
            cache_name = "session-cache"
            "#,
        )
        .expect_err("blank prefix should fail");
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                field: "key_prefix".to_string()
            }
        );
    }
}
