use reqwest::header::HeaderName;
use thiserror::Error;
use url::Url;

/// Base URL of the upstream task API when nothing overrides it.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.manus.im";

/// Header that carries the caller's API key to the upstream service.
pub const DEFAULT_API_KEY_HEADER: &str = "API_KEY";

/// 50MB
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {name} has an invalid value: {value}")]
    InvalidEnvVar { name: &'static str, value: String },
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub limits: LimitsConfig,
    pub cors: CorsConfig,
    pub monitoring: MonitoringConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream task API configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key_header: String,
    /// `None` leaves the HTTP client's own default in place.
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_body_bytes: usize,
}

/// CORS configuration. An empty origin list allows any origin.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Monitoring configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub enable_metrics: bool,
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(ConfigError::InvalidEnvVar {
                name: "LOG_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            timeout_seconds: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            enable_metrics: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment (and a `.env` file if present),
    /// falling back to defaults for anything unset.
    pub fn load() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = AppConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            self.server.port = parse_env("SERVER_PORT", port)?;
        }

        if let Ok(base_url) = std::env::var("UPSTREAM_BASE_URL") {
            self.upstream.base_url = base_url;
        }
        if let Ok(header) = std::env::var("UPSTREAM_API_KEY_HEADER") {
            self.upstream.api_key_header = header;
        }
        if let Ok(timeout) = std::env::var("UPSTREAM_TIMEOUT_SECONDS") {
            self.upstream.timeout_seconds = Some(parse_env("UPSTREAM_TIMEOUT_SECONDS", timeout)?);
        }

        if let Ok(max_body) = std::env::var("MAX_BODY_BYTES") {
            self.limits.max_body_bytes = parse_env("MAX_BODY_BYTES", max_body)?;
        }

        if let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = parse_origins(&origins);
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.monitoring.log_level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.monitoring.log_format = format.parse()?;
        }
        if let Ok(enabled) = std::env::var("ENABLE_METRICS") {
            self.monitoring.enable_metrics = parse_env("ENABLE_METRICS", enabled)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        let base = Url::parse(&self.upstream.base_url).map_err(|e| {
            ConfigError::InvalidValue(format!(
                "Upstream base URL {} is not a valid URL: {}",
                self.upstream.base_url, e
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue(format!(
                "Upstream base URL must use http or https, got {}",
                base.scheme()
            )));
        }

        self.api_key_header()?;

        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "Maximum body size cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The credential header as a typed header name.
    pub fn api_key_header(&self) -> ConfigResult<HeaderName> {
        HeaderName::from_bytes(self.upstream.api_key_header.as_bytes()).map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid upstream API key header name: {}",
                self.upstream.api_key_header
            ))
        })
    }

    /// Upstream base URL without a trailing slash, ready for path joining.
    pub fn upstream_base_url(&self) -> &str {
        self.upstream.base_url.trim_end_matches('/')
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvVar { name, value })
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && *s != "*")
        .map(|s| s.to_string())
        .collect()
}
