//! Service configuration.
//!
//! Every field has a default so a missing file or an empty document still
//! yields a working local setup; a config file only needs to name what it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable consulted when the config carries no upstream key.
pub const API_KEY_ENV: &str = "SHIORI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,
    /// Streamed chat endpoint of the model provider.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    /// Bearer token for the upstream; `SHIORI_API_KEY` is the fallback.
    /// Local dev upstreams typically run keyless.
    #[serde(default)]
    pub api_key: Option<String>,
    /// How many tool rounds one request may recurse through before it is
    /// failed instead of re-entering the stream.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_upstream_url() -> String {
    "http://localhost:5656/branch/main/ai/rag".to_string()
}

fn default_max_tool_rounds() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            upstream_url: default_upstream_url(),
            api_key: None,
            max_tool_rounds: default_max_tool_rounds(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Config {
    /// Load from a TOML file, apply the env fallback, validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults (plus the env fallback) when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Config::default();
                config.apply_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                if !key.is_empty() {
                    self.api_key = Some(key);
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if self.upstream_url.is_empty() {
            return Err(Error::Config("upstream_url must not be empty".to_string()));
        }
        if self.max_tool_rounds == 0 {
            return Err(Error::Config(
                "max_tool_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model, "gpt-4-turbo-preview");
        assert_eq!(config.max_tool_rounds, 8);
        assert!(config.api_key.is_none());
        assert!(config.temperature.is_none());
    }

    #[test]
    #[serial]
    fn test_partial_file_fills_in_defaults() {
        let file = write_config("model = \"gpt-4o\"\nmax_tool_rounds = 3\n");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tool_rounds, 3);
        assert_eq!(config.upstream_url, default_upstream_url());
    }

    #[test]
    fn test_unparseable_file_is_config_error() {
        let file = write_config("model = [not toml");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_round_budget_rejected() {
        let file = write_config("max_tool_rounds = 0\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_tool_rounds"));
    }

    #[test]
    #[serial]
    fn test_env_key_fills_missing_api_key() {
        // set_var is unsafe in edition 2024; serialized tests keep it sound
        unsafe { std::env::set_var(API_KEY_ENV, "sk-from-env") };
        let config = Config::load_or_default(None).unwrap();
        unsafe { std::env::remove_var(API_KEY_ENV) };
        assert_eq!(config.api_key.as_deref(), Some("sk-from-env"));
    }

    #[test]
    #[serial]
    fn test_file_key_wins_over_env() {
        unsafe { std::env::set_var(API_KEY_ENV, "sk-from-env") };
        let file = write_config("api_key = \"sk-from-file\"\n");
        let config = Config::load(file.path()).unwrap();
        unsafe { std::env::remove_var(API_KEY_ENV) };
        assert_eq!(config.api_key.as_deref(), Some("sk-from-file"));
    }
}
