use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin used when building magic-link URLs
    #[serde(default = "default_public_origin")]
    pub public_origin: String,
    /// Mark session cookies Secure (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_origin: default_public_origin(),
            secure_cookies: false,
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Static bearer key accepted on admin routes as a coarse bootstrap
    /// path. Disabled when unset. Overridable via VEILPORT_ADMIN_API_KEY.
    #[serde(default)]
    pub admin_api_key: Option<String>,
    /// Bootstrap super_admin created at startup if no admins exist
    #[serde(default = "default_bootstrap_email")]
    pub bootstrap_admin_email: String,
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_api_key: None,
            bootstrap_admin_email: default_bootstrap_email(),
            bootstrap_admin_password: None,
        }
    }
}

fn default_bootstrap_email() -> String {
    "admin@localhost".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Login attempts allowed per IP per window
    #[serde(default = "default_login_attempts_per_window")]
    pub login_attempts_per_window: u32,
    #[serde(default = "default_login_window_seconds")]
    pub login_window_seconds: u64,
    /// Magic-link requests allowed per email per window
    #[serde(default = "default_magic_link_requests_per_window")]
    pub magic_link_requests_per_window: u32,
    #[serde(default = "default_magic_link_window_seconds")]
    pub magic_link_window_seconds: u64,
    /// Seconds between cleanup sweeps of stale counters
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            login_attempts_per_window: default_login_attempts_per_window(),
            login_window_seconds: default_login_window_seconds(),
            magic_link_requests_per_window: default_magic_link_requests_per_window(),
            magic_link_window_seconds: default_magic_link_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_login_attempts_per_window() -> u32 {
    20
}

fn default_login_window_seconds() -> u64 {
    60
}

fn default_magic_link_requests_per_window() -> u32 {
    3
}

fn default_magic_link_window_seconds() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_tls: default_smtp_tls(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

impl EmailConfig {
    /// Email sending requires at least a host and a from address
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Veilport".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Config>(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        // Environment takes precedence over the file for the API key
        if let Ok(key) = std::env::var("VEILPORT_ADMIN_API_KEY") {
            if !key.is_empty() {
                config.auth.admin_api_key = Some(key);
            }
        }

        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            email: EmailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
