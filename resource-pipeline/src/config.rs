//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: RESOURCE_PIPELINE_, nesting separator: `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/resource-pipeline/{service_name}/config.toml
//! 4. Default values
//!
//! The loaded [`Config`] is immutable. It is built once before any request is
//! served and shared by reference (`Arc<Config>`) with every dispatcher.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

const ENV_PREFIX: &str = "RESOURCE_PIPELINE_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Request pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Request pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Name of the registered authenticator used by the auth stage.
    ///
    /// `None` means requests are not authenticated.
    #[serde(default)]
    pub auth_lookup: Option<String>,

    /// Page size used when a list request does not specify one
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Upper bound for client-supplied page sizes
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,

    /// Envelope code for successful responses
    #[serde(default = "default_success_code")]
    pub success_code: i64,

    /// Include fault text in `500` envelopes. Debug deployments only.
    #[serde(default)]
    pub expose_fault_details: bool,

    /// Envelope messages
    #[serde(default)]
    pub messages: MessagesConfig,
}

/// Messages placed in the `msg` field of envelopes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagesConfig {
    /// Successful responses
    #[serde(default = "default_success_message")]
    pub success: String,

    /// No subject could be resolved
    #[serde(default = "default_access_denied_message")]
    pub access_denied: String,

    /// Subject resolved but the policy refused the action
    #[serde(default = "default_access_denied_message")]
    pub forbidden: String,

    /// Instance absent or outside the accessible set
    #[serde(default = "default_not_found_message")]
    pub not_found: String,

    /// Confirmation for a successful destroy
    #[serde(default = "default_destroyed_message")]
    pub destroyed: String,

    /// Generic text for unhandled faults
    #[serde(default = "default_fault_message")]
    pub fault: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            success: default_success_message(),
            access_denied: default_access_denied_message(),
            forbidden: default_access_denied_message(),
            not_found: default_not_found_message(),
            destroyed: default_destroyed_message(),
            fault: default_fault_message(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auth_lookup: None,
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            success_code: default_success_code(),
            expose_fault_details: false,
            messages: MessagesConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the authentication lookup name
    #[must_use]
    pub fn with_auth_lookup(mut self, name: impl Into<String>) -> Self {
        self.auth_lookup = Some(name.into());
        self
    }

    /// Set the page size bounds
    #[must_use]
    pub fn with_page_sizes(mut self, default_per_page: u32, max_per_page: u32) -> Self {
        self.default_per_page = default_per_page;
        self.max_per_page = max_per_page;
        self
    }

    /// Expose fault details in `500` envelopes
    #[must_use]
    pub fn with_fault_details(mut self, expose: bool) -> Self {
        self.expose_fault_details = expose;
        self
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_per_page() -> u32 {
    20
}

fn default_max_per_page() -> u32 {
    100
}

fn default_success_code() -> i64 {
    200
}

fn default_success_message() -> String {
    "Success".to_string()
}

fn default_access_denied_message() -> String {
    "access denied".to_string()
}

fn default_not_found_message() -> String {
    "resource not found".to_string()
}

fn default_destroyed_message() -> String {
    "deleted successfully".to_string()
}

fn default_fault_message() -> String {
    "internal server error".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is inferred from the running binary.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "resource-pipeline".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut defaults = Config::default();
        defaults.service.name = service_name.to_string();

        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        // Lowest priority first so that higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the XDG search. Environment variables still override the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("resource-pipeline");
        if let Some(path) = xdg_dirs.find_config_file(Path::new(service_name).join("config.toml")) {
            paths.push(path);
        }

        paths
    }

    /// Whether the service runs in a production environment
    pub fn is_production(&self) -> bool {
        matches!(self.service.environment.as_str(), "prod" | "production")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "resource-pipeline".to_string(),
                log_level: default_log_level(),
                environment: default_environment(),
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.pipeline.default_per_page, 20);
        assert_eq!(config.pipeline.max_per_page, 100);
        assert_eq!(config.pipeline.success_code, 200);
        assert!(config.pipeline.auth_lookup.is_none());
        assert!(!config.pipeline.expose_fault_details);
        assert_eq!(config.pipeline.messages.access_denied, "access denied");
        assert_eq!(config.pipeline.messages.not_found, "resource not found");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "blog"
environment = "production"

[pipeline]
auth_lookup = "current_user"
max_per_page = 50

[pipeline.messages]
access_denied = "zugriff verweigert"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "blog");
        assert!(config.is_production());
        assert_eq!(config.pipeline.auth_lookup.as_deref(), Some("current_user"));
        assert_eq!(config.pipeline.max_per_page, 50);
        assert_eq!(config.pipeline.default_per_page, 20);
        assert_eq!(config.pipeline.messages.access_denied, "zugriff verweigert");
        assert_eq!(config.pipeline.messages.success, "Success");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_pipeline_config_builders() {
        let config = PipelineConfig::default()
            .with_auth_lookup("current_user")
            .with_page_sizes(10, 25)
            .with_fault_details(true);
        assert_eq!(config.auth_lookup.as_deref(), Some("current_user"));
        assert_eq!(config.default_per_page, 10);
        assert_eq!(config.max_per_page, 25);
        assert!(config.expose_fault_details);
    }
}
