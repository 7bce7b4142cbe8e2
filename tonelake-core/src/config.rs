//! Configuration for a pipeline run.
//!
//! The configuration is a flat JSON key-value file naming the two storage
//! roots and, for S3 roots, the access credentials. It is loaded exactly once
//! at process start into a `LakeConfig` that is passed by parameter into each
//! transform.
//!
//! Leaf values may be literal strings or `ConfigValue` objects that indirect
//! through an environment variable:
//!
//! ```json
//! {
//!   "inputData": "s3://udacity-dend/",
//!   "outputData": "s3://my-lake/out/",
//!   "aws": {
//!     "accessKeyId":     { "envVar": "AWS_ACCESS_KEY_ID" },
//!     "secretAccessKey": { "envVar": "AWS_SECRET_ACCESS_KEY" },
//!     "region": "us-west-2"
//!   }
//! }
//! ```

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Environment variable naming the config file; defaults to `lake.json`.
pub const CONFIG_PATH_ENV: &str = "TONELAKE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "lake.json";

/// A configuration leaf that can be indirected through an environment
/// variable (envVar/defaultVal).
#[derive(Debug, Clone, Default)]
pub struct ConfigValue {
    pub env_var: Option<String>,
    pub default_val: Option<String>,
}

impl ConfigValue {
    pub fn resolve(&self) -> Option<String> {
        if let Some(var) = &self.env_var {
            if let Ok(val) = std::env::var(var) {
                if !val.is_empty() {
                    return Some(val);
                }
            }
        }
        self.default_val.clone()
    }
}

/// AWS credential and endpoint configuration for S3 storage roots.
#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// Optional endpoint override (e.g. LocalStack/MinIO)
    pub endpoint: Option<String>,
}

impl AwsConfig {
    fn from_json(json: &JsonValue) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::config("aws config must be an object"))?;

        let mut config = AwsConfig::default();

        for (key, value) in obj {
            match key.as_str() {
                "accessKeyId" | "access_key_id" => {
                    config.access_key_id = resolve_string(value);
                }
                "secretAccessKey" | "secret_access_key" => {
                    config.secret_access_key = resolve_string(value);
                }
                "region" => {
                    config.region = resolve_string(value);
                }
                "endpoint" => {
                    config.endpoint = resolve_string(value);
                }
                _ => {
                    return Err(Error::config(format!(
                        "Unknown aws configuration field: '{}'",
                        key
                    )));
                }
            }
        }

        Ok(config)
    }
}

/// Main pipeline configuration: the two storage roots plus credentials.
#[derive(Debug, Clone)]
pub struct LakeConfig {
    /// Root of the raw JSON sources (filesystem path or `s3://bucket/prefix`)
    pub input_data: String,
    /// Root the five output tables are written under
    pub output_data: String,
    /// Credentials for S3 roots; optional for filesystem roots
    pub aws: Option<AwsConfig>,
}

impl LakeConfig {
    /// Parse configuration from JSON
    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::config("Configuration must be an object"))?;

        let mut input_data: Option<String> = None;
        let mut output_data: Option<String> = None;
        let mut aws: Option<AwsConfig> = None;

        for (key, value) in obj {
            match key.as_str() {
                "inputData" | "input_data" => {
                    input_data = resolve_string(value);
                }
                "outputData" | "output_data" => {
                    output_data = resolve_string(value);
                }
                "aws" => {
                    aws = Some(AwsConfig::from_json(value)?);
                }
                _ => {
                    return Err(Error::config(format!(
                        "Unknown configuration field: '{}'",
                        key
                    )));
                }
            }
        }

        Ok(LakeConfig {
            input_data: input_data
                .ok_or_else(|| Error::config("inputData required in configuration"))?,
            output_data: output_data
                .ok_or_else(|| Error::config("outputData required in configuration"))?,
            aws,
        })
    }

    /// Load configuration from the file named by `TONELAKE_CONFIG`
    /// (default `lake.json`).
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {}", path, e)))?;
        let json: JsonValue = serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("Invalid JSON in config {}: {}", path, e)))?;
        Self::from_json(&json)
    }
}

/// Resolve a string field that may be a literal or a ConfigValue object.
fn resolve_string(value: &JsonValue) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }

    if let Some(obj) = value.as_object() {
        let spec = ConfigValue {
            env_var: obj.get("envVar").and_then(|v| v.as_str()).map(String::from),
            default_val: obj
                .get("defaultVal")
                .and_then(|v| v.as_str())
                .map(String::from),
        };
        return spec.resolve();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_config() {
        let json = json!({
            "inputData": "/data/raw/",
            "outputData": "/data/lake/"
        });

        let config = LakeConfig::from_json(&json).unwrap();
        assert_eq!(config.input_data, "/data/raw/");
        assert_eq!(config.output_data, "/data/lake/");
        assert!(config.aws.is_none());
    }

    #[test]
    fn test_parse_aws_config() {
        let json = json!({
            "inputData": "s3://bucket-a/",
            "outputData": "s3://bucket-b/out/",
            "aws": {
                "accessKeyId": "AKIA123",
                "secretAccessKey": "secret",
                "region": "us-west-2"
            }
        });

        let config = LakeConfig::from_json(&json).unwrap();
        let aws = config.aws.unwrap();
        assert_eq!(aws.access_key_id.as_deref(), Some("AKIA123"));
        assert_eq!(aws.region.as_deref(), Some("us-west-2"));
        assert!(aws.endpoint.is_none());
    }

    #[test]
    fn test_env_var_indirection_default() {
        let json = json!({
            "inputData": {
                "envVar": "TONELAKE_TEST_UNSET_INPUT",
                "defaultVal": "/fallback/raw/"
            },
            "outputData": "/data/lake/"
        });

        let config = LakeConfig::from_json(&json).unwrap();
        assert_eq!(config.input_data, "/fallback/raw/");
    }

    #[test]
    fn test_missing_output_errors() {
        let json = json!({ "inputData": "/data/raw/" });
        let err = LakeConfig::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("outputData"));
    }

    #[test]
    fn test_unknown_field_errors() {
        let json = json!({
            "inputData": "/a/",
            "outputData": "/b/",
            "unknownField": true
        });
        let err = LakeConfig::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("Unknown configuration field"));
    }
}
