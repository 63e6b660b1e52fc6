//! Configuration parsing and management.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::boundary::{PolicyError, SandboxPolicy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid sandbox policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Main configuration struct matching the playpen.yml schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub console: ConsoleConfig,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

fn default_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Quiescence window before an edit is committed to the preview
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Base URL bare specifiers are templated through
    #[serde(default = "default_module_host")]
    pub module_host: String,

    /// Baseline resolution entries; `null` values are templated through
    /// `module_host`. `None` keeps the built-in react baseline.
    #[serde(default)]
    pub baseline: Option<IndexMap<String, Option<String>>>,

    /// Module loader that transpiles and runs the embedded source
    #[serde(default = "default_transpiler_url")]
    pub transpiler_url: String,

    /// Extra classic scripts loaded into the document head (e.g. styling runtimes)
    #[serde(default = "default_head_scripts")]
    pub head_scripts: Vec<String>,

    /// Component rendered when the source has no recognizable default export
    #[serde(default = "default_fallback_component")]
    pub fallback_component: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            module_host: default_module_host(),
            baseline: None,
            transpiler_url: default_transpiler_url(),
            head_scripts: default_head_scripts(),
            fallback_component: default_fallback_component(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_module_host() -> String {
    String::from("https://esm.sh")
}

fn default_transpiler_url() -> String {
    String::from("https://esm.sh/tsx")
}

fn default_head_scripts() -> Vec<String> {
    vec![String::from(
        "https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4",
    )]
}

fn default_fallback_component() -> String {
    String::from(crate::exports::DEFAULT_COMPONENT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            capabilities: default_capabilities(),
            referrer_policy: default_referrer_policy(),
        }
    }
}

fn default_capabilities() -> Vec<String> {
    SandboxPolicy::default()
        .tokens()
        .map(str::to_string)
        .collect()
}

fn default_referrer_policy() -> String {
    String::from("no-referrer")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Snapshot file for durable user state
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".playpen/state.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Optional cap on retained log entries; oldest entries are evicted first
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.sandbox_policy()?;
        if self.preview.module_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "preview.module_host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.preview.fallback_component.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "preview.fallback_component",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The capability grant for the preview frame
    pub fn sandbox_policy(&self) -> Result<SandboxPolicy, PolicyError> {
        SandboxPolicy::parse(self.sandbox.capabilities.iter().map(String::as_str))
    }

    /// Snapshot file, resolved relative to the config file
    pub fn state_path(&self) -> PathBuf {
        self.resolve_path(&self.state.path)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(config_path) = &self.config_path {
            if let Some(parent) = config_path.parent() {
                parent.join(path)
            } else {
                path.to_path_buf()
            }
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.preview.debounce_ms, 250);
        assert_eq!(config.preview.module_host, "https://esm.sh");
        assert_eq!(config.preview.fallback_component, "App");
        assert_eq!(config.console.max_entries, None);
        assert!(config.sandbox_policy().is_ok());
    }

    #[test]
    fn test_top_navigation_is_rejected() {
        let yaml = r#"
sandbox:
  capabilities: [allow-scripts, allow-top-navigation]
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Policy(PolicyError::TopNavigation(_))));
    }

    #[test]
    fn test_unknown_capability_is_rejected() {
        let yaml = "sandbox:\n  capabilities: [allow-scripts, allow-everything]\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Policy(PolicyError::Unknown(_)))
        ));
    }

    #[test]
    fn test_state_path_resolves_relative_to_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("playpen.yml");
        fs::write(&path, "state:\n  path: data/state.json\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.state_path(), dir.path().join("data/state.json"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.yml")).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:8000");
        assert_eq!(config.state_path(), PathBuf::from(".playpen/state.json"));
    }

    #[test]
    fn test_baseline_override() {
        let yaml = r#"
preview:
  module_host: "https://cdn.example"
  baseline:
    react: "https://cdn.example/react@18"
    react-dom/client: null
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let baseline = config.preview.baseline.unwrap();
        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline["react-dom/client"], None);
    }
}
