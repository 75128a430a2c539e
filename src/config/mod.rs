//! Configuration types and builders.

use crate::error::{ConfigError, McpError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which transport the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
    Streamable,
}

impl TransportKind {
    /// Parse a transport kind from a string.
    ///
    /// Accepts a few common spellings for the streamable transport.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            "streamable" | "streamable-http" | "streamable_http" => Some(Self::Streamable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Streamable => "streamable",
        }
    }
}

impl TryFrom<&str> for TransportKind {
    type Error = ConfigError;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(s).ok_or_else(|| ConfigError::InvalidValue {
            field: "transport".into(),
            message: format!(
                "Unknown transport: '{}'. Valid transports: stdio, http, streamable",
                s
            )
            .into(),
        })
    }
}

/// Cross-origin settings shared by both HTTP transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Allowed origins; `*` allows any origin.
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["*".into()],
        }
    }
}

impl CorsConfig {
    /// Whether `origin` matches an allow-list entry or a wildcard.
    pub fn allows(&self, origin: &str) -> bool {
        self.origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
    /// Deadline for producing response headers.
    pub request_timeout: Duration,
    /// Idle time after which a streamable session expires.
    pub session_timeout: Duration,
    /// Maximum number of requests handled concurrently.
    pub max_connections: usize,
    /// Default drain deadline used by the binary on shutdown.
    pub shutdown_timeout: Duration,
    /// PEM certificate chain; serving switches to HTTPS when set with a key.
    pub tls_cert: Option<PathBuf>,
    /// PEM private key matching `tls_cert`.
    pub tls_key: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            cors: CorsConfig::default(),
            request_timeout: Duration::from_secs(30),
            session_timeout: Duration::from_secs(5 * 60),
            max_connections: 100,
            shutdown_timeout: Duration::from_secs(10),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl HttpConfig {
    /// `host:port` string suitable for binding.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Certificate and key paths when HTTPS is configured.
    pub fn tls(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingField("host".into()).into());
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections".into(),
                message: "Max connections must be greater than 0".into(),
            }
            .into());
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "session_timeout".into(),
                message: "Session timeout must be greater than 0".into(),
            }
            .into());
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout".into(),
                message: "Request timeout must be greater than 0".into(),
            }
            .into());
        }
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "tls".into(),
                message: "TLS needs both a certificate and a key".into(),
            }
            .into());
        }
        if self.cors.enabled && self.cors.origins.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cors.origins".into(),
                message: "At least one origin is required when CORS is enabled".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Builder for HttpConfig with fluent API.
#[derive(Default)]
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn cors_enabled(mut self, enabled: bool) -> Self {
        self.config.cors.enabled = enabled;
        self
    }

    pub fn cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cors.origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn tls_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tls_cert = Some(path.into());
        self
    }

    pub fn tls_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tls_key = Some(path.into());
        self
    }

    /// Override fields from `MCP_*` environment variables.
    pub fn from_env(mut self) -> Result<Self> {
        if let Ok(host) = env::var("MCP_HOST") {
            self.config.host = host;
        }

        if let Ok(port) = env::var("MCP_PORT") {
            self.config.port = port
                .parse()
                .map_err(|_| invalid("MCP_PORT", "Invalid port number"))?;
        }

        if let Ok(enabled) = env::var("MCP_CORS_ENABLED") {
            self.config.cors.enabled = enabled
                .parse()
                .map_err(|_| invalid("MCP_CORS_ENABLED", "Expected true or false"))?;
        }

        if let Ok(origins) = env::var("MCP_CORS_ORIGINS") {
            self.config.cors.origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(secs) = env::var("MCP_REQUEST_TIMEOUT_SECS") {
            self.config.request_timeout = parse_secs("MCP_REQUEST_TIMEOUT_SECS", &secs)?;
        }

        if let Ok(secs) = env::var("MCP_SESSION_TIMEOUT_SECS") {
            self.config.session_timeout = parse_secs("MCP_SESSION_TIMEOUT_SECS", &secs)?;
        }

        if let Ok(max) = env::var("MCP_MAX_CONNECTIONS") {
            self.config.max_connections = max
                .parse()
                .map_err(|_| invalid("MCP_MAX_CONNECTIONS", "Expected a positive integer"))?;
        }

        if let Ok(secs) = env::var("MCP_SHUTDOWN_TIMEOUT_SECS") {
            self.config.shutdown_timeout = parse_secs("MCP_SHUTDOWN_TIMEOUT_SECS", &secs)?;
        }

        if let Ok(cert) = env::var("MCP_TLS_CERT") {
            self.config.tls_cert = Some(cert.into());
        }

        if let Ok(key) = env::var("MCP_TLS_KEY") {
            self.config.tls_key = Some(key.into());
        }

        Ok(self)
    }

    pub fn build(self) -> Result<HttpConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn invalid(field: &'static str, message: &'static str) -> McpError {
    McpError::Config(ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    })
}

fn parse_secs(field: &'static str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| invalid(field, "Expected a number of seconds"))
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub transport: TransportKind,
    pub http: HttpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "calculator-server".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            transport: TransportKind::default(),
            http: HttpConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load the full configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(transport) = env::var("MCP_TRANSPORT") {
            builder = builder.transport(TransportKind::try_from(transport.as_str())?);
        }
        let http = HttpConfigBuilder::new().from_env()?.build()?;
        Ok(builder.http(http).build())
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn http(mut self, http: HttpConfig) -> Self {
        self.config.http = http;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!(TransportKind::parse("stdio"), Some(TransportKind::Stdio));
        assert_eq!(TransportKind::parse("HTTP"), Some(TransportKind::Http));
        assert_eq!(
            TransportKind::parse("streamable-http"),
            Some(TransportKind::Streamable)
        );
        assert_eq!(TransportKind::parse("websocket"), None);
        assert!(TransportKind::try_from("websocket").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.http.addr(), "127.0.0.1:8080");
        assert_eq!(config.http.session_timeout, Duration::from_secs(300));
        assert!(config.http.cors.enabled);
        assert!(config.http.validate().is_ok());
    }

    #[test]
    fn test_http_config_builder() {
        let config = HttpConfigBuilder::new()
            .host("0.0.0.0")
            .port(8083)
            .cors_origins(["https://example.com"])
            .session_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.addr(), "0.0.0.0:8083");
        assert!(config.cors.allows("https://example.com"));
        assert!(!config.cors.allows("https://evil.test"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(HttpConfigBuilder::new().host("").build().is_err());
        assert!(HttpConfigBuilder::new().max_connections(0).build().is_err());
        assert!(
            HttpConfigBuilder::new()
                .session_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            HttpConfigBuilder::new()
                .cors_origins(Vec::<String>::new())
                .build()
                .is_err()
        );
        assert!(
            HttpConfigBuilder::new()
                .cors_enabled(false)
                .cors_origins(Vec::<String>::new())
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_tls_requires_cert_and_key() {
        assert!(HttpConfigBuilder::new().tls_cert("cert.pem").build().is_err());
        assert!(HttpConfigBuilder::new().tls_key("key.pem").build().is_err());

        let config = HttpConfigBuilder::new()
            .tls_cert("cert.pem")
            .tls_key("key.pem")
            .build()
            .unwrap();
        let (cert, key) = config.tls().unwrap();
        assert_eq!(cert, Path::new("cert.pem"));
        assert_eq!(key, Path::new("key.pem"));
        assert!(HttpConfig::default().tls().is_none());
    }

    #[test]
    fn test_wildcard_origin() {
        let cors = CorsConfig::default();
        assert!(cors.allows("http://x.test"));
    }
}
