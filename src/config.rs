//! Configuration management for the schema synchronizer
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (polyn.toml)
//! - Environment variables (POLYN_*, nested with `__`)
//! - The flat variables `POLYN_ENV`, `NATS_SERVERS`, `NATS_CREDENTIALS`,
//!   `NATS_CA_FILE` and `NATS_TLS`
//!
//! ## Example config file (polyn.toml):
//! ```toml
//! env = "production"
//!
//! [nats]
//! servers = ["nats://nats-1:4222", "nats://nats-2:4222"]
//! credentials = "/etc/polyn/nats.creds"
//! tls = true
//! ca_file = "/etc/polyn/ca.pem"
//!
//! [registry]
//! store_name = "POLYN_SCHEMAS"
//! schemas_dir = "./schemas"
//! discovery_wait_ms = 500
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config_crate::{Config, ConfigBuilder, ConfigError, Environment, File};
use config_crate::builder::DefaultState;
use serde::{Deserialize, Serialize};

/// Default schema registry bucket
pub const DEFAULT_STORE_NAME: &str = "POLYN_SCHEMAS";

/// Main configuration, resolved once at startup and passed down explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynConfig {
    /// Deployment environment name
    #[serde(default = "default_env")]
    pub env: String,

    /// NATS connection settings
    #[serde(default)]
    pub nats: NatsConfig,

    /// Schema registry settings
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// NATS connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatsConfig {
    /// Server URLs
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    /// Path to a `.creds` file
    #[serde(default, deserialize_with = "empty_as_none")]
    pub credentials: Option<PathBuf>,

    /// Require TLS
    #[serde(default)]
    pub tls: bool,

    /// Extra root certificate for TLS
    #[serde(default, deserialize_with = "empty_as_none")]
    pub ca_file: Option<PathBuf>,
}

/// Schema registry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Key-value bucket holding the schemas
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Directory the schema documents are read from
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: PathBuf,

    /// Silence, in milliseconds, that ends registry discovery
    #[serde(default = "default_discovery_wait_ms")]
    pub discovery_wait_ms: u64,
}

// Default value functions
fn default_env() -> String {
    "development".to_string()
}

fn default_servers() -> Vec<String> {
    vec!["nats://127.0.0.1:4222".to_string()]
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_schemas_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_discovery_wait_ms() -> u64 {
    500
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            credentials: None,
            tls: false,
            ca_file: None,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            store_name: default_store_name(),
            schemas_dir: default_schemas_dir(),
            discovery_wait_ms: default_discovery_wait_ms(),
        }
    }
}

impl Default for PolynConfig {
    fn default() -> Self {
        Self {
            env: default_env(),
            nats: NatsConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn discovery_wait(&self) -> Duration {
        Duration::from_millis(self.discovery_wait_ms)
    }
}

/// Flat process variables and the keys they set
const FLAT_VARS: [(&str, &str); 4] = [
    ("POLYN_ENV", "env"),
    ("NATS_CREDENTIALS", "nats.credentials"),
    ("NATS_CA_FILE", "nats.ca_file"),
    ("NATS_TLS", "nats.tls"),
];

impl PolynConfig {
    /// Load configuration from default locations and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, additionally reading `config_path` if given
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        Self::load_with_vars(config_path, &vars)
    }

    /// Load configuration against an explicit set of environment variables
    pub fn load_with_vars(
        config_path: Option<&str>,
        vars: &[(String, String)],
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["polyn.toml", ".polyn.toml", "config/polyn.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "polyn", "polyn") {
            let xdg_config = config_dir.config_dir().join("polyn.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (POLYN_*)
        let prefixed = vars
            .iter()
            .filter(|(key, _)| key.starts_with("POLYN_") && key.contains("__"))
            .cloned()
            .collect();
        builder = builder.add_source(
            Environment::with_prefix("POLYN")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("nats.servers")
                .try_parsing(true)
                .source(Some(prefixed)),
        );

        builder = apply_flat_vars(builder, vars)?;

        builder.build()?.try_deserialize()
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn apply_flat_vars(
    mut builder: ConfigBuilder<DefaultState>,
    vars: &[(String, String)],
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let lookup = |name: &str| {
        vars.iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    if let Some(servers) = lookup("NATS_SERVERS") {
        let servers: Vec<String> = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        builder = builder.set_override("nats.servers", servers)?;
    }

    for (var, key) in FLAT_VARS {
        let Some(value) = lookup(var) else { continue };
        builder = if key == "nats.tls" {
            builder.set_override(key, parse_flag(&value))?
        } else {
            builder.set_override(key, value)?
        };
    }

    Ok(builder)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
