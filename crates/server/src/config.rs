use std::env;
use std::path::PathBuf;
use std::time::Duration;

use agentid_types::OrganizationId;

/// Log output format of the server binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A configured API key and the organization it acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyEntry {
    pub organization_id: OrganizationId,
    pub key: String,
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Keys accepted by the authenticator
    pub api_keys: Vec<ApiKeyEntry>,
    /// Upper bound for each dependency call on the verify path
    pub verify_timeout: Duration,
    /// TOML file with the trust weight table, thresholds and alert impacts
    pub trust_config: Option<PathBuf>,
    /// Period of the scheduled trust recalculation; `None` disables it
    pub recalc_interval: Option<Duration>,
    /// TOML or JSON file of agents and grants registered at startup
    pub agents_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("AGENTID_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("AGENTID_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("AGENTID_PORT"))?;

        let api_keys = parse_api_keys(
            &lookup("AGENTID_API_KEYS").ok_or(ConfigError::MissingEnvVar("AGENTID_API_KEYS"))?,
        )?;

        let verify_timeout_ms: u64 = lookup("AGENTID_VERIFY_TIMEOUT_MS")
            .unwrap_or_else(|| "25".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("AGENTID_VERIFY_TIMEOUT_MS"))?;
        if verify_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("AGENTID_VERIFY_TIMEOUT_MS"));
        }

        let trust_config = lookup("AGENTID_TRUST_CONFIG").map(PathBuf::from);

        let recalc_interval = match lookup("AGENTID_RECALC_INTERVAL_SECS") {
            None => Some(Duration::from_secs(3600)),
            Some(value) => match value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue("AGENTID_RECALC_INTERVAL_SECS"))?
            {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        let agents_file = lookup("AGENTID_AGENTS")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let log_format = match lookup("AGENTID_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("AGENTID_LOG_FORMAT")),
        };

        Ok(Self {
            host,
            port,
            api_keys,
            verify_timeout: Duration::from_millis(verify_timeout_ms),
            trust_config,
            recalc_interval,
            agents_file,
            log_format,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `org_id:key` pairs separated by commas
fn parse_api_keys(raw: &str) -> Result<Vec<ApiKeyEntry>, ConfigError> {
    let keys = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (organization, key) = entry
                .split_once(':')
                .ok_or(ConfigError::InvalidValue("AGENTID_API_KEYS"))?;
            let organization_id = organization
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("AGENTID_API_KEYS"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidValue("AGENTID_API_KEYS"));
            }
            Ok(ApiKeyEntry {
                organization_id,
                key: key.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if keys.is_empty() {
        return Err(ConfigError::InvalidValue("AGENTID_API_KEYS"));
    }
    Ok(keys)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
