use crate::error::ConfigError;
use crate::fmp::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_LOCAL_RELAY_URL: &str = "http://127.0.0.1:8888";

// Per-IP limits for the relay routes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second each client may make.
    pub requests_per_second: u64,
    /// Requests a client may make at once before the rate applies.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 20,
        }
    }
}

impl RateLimitConfig {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.requests_per_second == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_PER_SECOND",
                value: "0".to_string(),
            });
        }
        if self.burst_size == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_BURST",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }

    /// Time for one spent request to come back, at millisecond resolution.
    /// Rates above 1000/s saturate at one per millisecond.
    pub fn replenish_interval(&self) -> Duration {
        Duration::from_millis((1000 / self.requests_per_second.max(1)).max(1))
    }
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize)]
pub struct ConfigYaml {
    pub api_key: String,
    pub node_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub upstream_base_url: Option<String>,
    pub upstream_timeout_secs: Option<u64>,
    pub statement_limit: Option<usize>,
    pub cors_permissive: Option<bool>,
    pub rate_limit: Option<RateLimitConfig>,
}

// Holds application-wide settings
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub node_name: String,
    pub environment: String,
    pub port: u16,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub statement_limit: Option<usize>,
    pub cors_permissive: bool,
    pub rate_limit: RateLimitConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"[REDACTED]")
            .field("node_name", &self.node_name)
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field("upstream_base_url", &self.upstream_base_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("statement_limit", &self.statement_limit)
            .field("cors_permissive", &self.cors_permissive)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            dotenvy::dotenv().ok(); // Load .env file if present
            Self::from_lookup(|key| env::var(key).ok())
        }
    }

    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml_config: ConfigYaml = serde_yaml::from_str(yaml_content)?;

        if yaml_config.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }

        Ok(Self {
            api_key: yaml_config.api_key,
            node_name: yaml_config.node_name.unwrap_or_else(default_node_name),
            environment: yaml_config.environment.unwrap_or_else(default_environment),
            port: yaml_config.port.unwrap_or(DEFAULT_PORT),
            upstream_base_url: yaml_config
                .upstream_base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            upstream_timeout: Duration::from_secs(yaml_config.upstream_timeout_secs.unwrap_or(30)),
            statement_limit: yaml_config.statement_limit,
            cors_permissive: yaml_config.cors_permissive.unwrap_or(true),
            rate_limit: yaml_config.rate_limit.unwrap_or_default().validate()?,
        })
    }

    /// Build the config from a key lookup. `load` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("API_KEY"))?;

        let defaults = RateLimitConfig::default();

        Ok(Self {
            api_key,
            node_name: lookup("NODE_NAME").unwrap_or_else(default_node_name),
            environment: lookup("ENVIRONMENT").unwrap_or_else(default_environment),
            port: parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT),
            upstream_base_url: lookup("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            upstream_timeout: Duration::from_secs(
                parse_var(&lookup, "UPSTREAM_TIMEOUT_SECS")?.unwrap_or(30),
            ),
            statement_limit: parse_var(&lookup, "STATEMENT_LIMIT")?,
            cors_permissive: parse_var(&lookup, "CORS_PERMISSIVE")?.unwrap_or(true),
            rate_limit: RateLimitConfig {
                requests_per_second: parse_var(&lookup, "RATE_LIMIT_PER_SECOND")?
                    .unwrap_or(defaults.requests_per_second),
                burst_size: parse_var(&lookup, "RATE_LIMIT_BURST")?.unwrap_or(defaults.burst_size),
            }
            .validate()?,
        })
    }
}

fn default_node_name() -> String {
    "fmp-income-relay".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

// --- Client-side settings ---

/// Which relay instance the client talks to.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub use_local_relay: bool,
    pub local_relay_url: String,
    pub deployed_relay_url: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            use_local_relay: true,
            local_relay_url: DEFAULT_LOCAL_RELAY_URL.to_string(),
            deployed_relay_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let use_local_relay = parse_var(&lookup, "USE_LOCAL_RELAY")?.unwrap_or(defaults.use_local_relay);
        let deployed_relay_url = lookup("DEPLOYED_RELAY_URL");

        if !use_local_relay && deployed_relay_url.is_none() {
            return Err(ConfigError::Missing("DEPLOYED_RELAY_URL"));
        }

        Ok(Self {
            use_local_relay,
            local_relay_url: lookup("LOCAL_RELAY_URL").unwrap_or(defaults.local_relay_url),
            deployed_relay_url,
            timeout: parse_var(&lookup, "RELAY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }

    pub fn relay_url(&self) -> &str {
        match (&self.deployed_relay_url, self.use_local_relay) {
            (Some(deployed), false) => deployed,
            _ => &self.local_relay_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("API_KEY", "k")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.environment, "development");
        assert_eq!(config.upstream_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.statement_limit, None);
        assert!(config.cors_permissive);
        assert_eq!(config.rate_limit.requests_per_second, 10);
        assert_eq!(config.rate_limit.replenish_interval(), Duration::from_millis(100));
        assert_eq!(config.rate_limit.burst_size, 20);
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("API_KEY", "k"),
            ("PORT", "9000"),
            ("ENVIRONMENT", "production"),
            ("STATEMENT_LIMIT", "5"),
            ("CORS_PERMISSIVE", "false"),
            ("RATE_LIMIT_BURST", "3"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.environment, "production");
        assert_eq!(config.statement_limit, Some(5));
        assert!(!config.cors_permissive);
        assert_eq!(config.rate_limit.burst_size, 3);
    }

    #[test]
    fn test_missing_or_invalid_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing("API_KEY"))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("API_KEY", "  ")])),
            Err(ConfigError::Missing("API_KEY"))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("PORT", "eighty")])),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
api_key: from-yaml
port: 7000
statement_limit: 10
rate_limit:
  requests_per_second: 2
  burst_size: 4
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.api_key, "from-yaml");
        assert_eq!(config.port, 7000);
        assert_eq!(config.statement_limit, Some(10));
        assert_eq!(config.rate_limit.requests_per_second, 2);
        assert_eq!(config.rate_limit.replenish_interval(), Duration::from_millis(500));
        assert_eq!(config.node_name, "fmp-income-relay");
    }

    #[test]
    fn test_rate_limit_is_requests_per_second() {
        let limits = |rate| RateLimitConfig { requests_per_second: rate, burst_size: 1 };
        assert_eq!(limits(1).replenish_interval(), Duration::from_secs(1));
        assert_eq!(limits(4).replenish_interval(), Duration::from_millis(250));
        assert_eq!(limits(5000).replenish_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("RATE_LIMIT_PER_SECOND", "0")])),
            Err(ConfigError::Invalid { name: "RATE_LIMIT_PER_SECOND", .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("API_KEY", "k"), ("RATE_LIMIT_BURST", "0")])),
            Err(ConfigError::Invalid { name: "RATE_LIMIT_BURST", .. })
        ));
        let yaml = "api_key: k\nrate_limit:\n  requests_per_second: 0\n  burst_size: 4\n";
        assert!(AppConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = AppConfig::from_lookup(lookup_from(&[("API_KEY", "hunter2")])).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_client_relay_toggle() {
        let local = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(local.relay_url(), DEFAULT_LOCAL_RELAY_URL);

        let deployed = ClientConfig::from_lookup(lookup_from(&[
            ("USE_LOCAL_RELAY", "false"),
            ("DEPLOYED_RELAY_URL", "https://relay.example.com"),
        ]))
        .unwrap();
        assert_eq!(deployed.relay_url(), "https://relay.example.com");

        assert!(matches!(
            ClientConfig::from_lookup(lookup_from(&[("USE_LOCAL_RELAY", "false")])),
            Err(ConfigError::Missing("DEPLOYED_RELAY_URL"))
        ));
    }
}
