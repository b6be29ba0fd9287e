use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default JWT signing secret. Only suitable for local development;
/// production deployments must set `auth.jwt_secret` or `JWT_SECRET`.
pub const INSECURE_DEFAULT_SECRET: &str = "dev_secret_change_me";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5174
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Password for the seeded admin account. A random one is generated
    /// (and logged once) when unset and no admin exists yet.
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_days: default_token_ttl_days(),
            admin_username: default_admin_username(),
            admin_password: None,
        }
    }
}

fn default_jwt_secret() -> String {
    INSECURE_DEFAULT_SECRET.to_string()
}

fn default_token_ttl_days() -> i64 {
    7
}

fn default_admin_username() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_uploads_dir")]
    pub dir: PathBuf,
    /// Image used for events/crew created without one.
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            placeholder_image: default_placeholder_image(),
        }
    }
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_placeholder_image() -> String {
    "/logo-runtosip.png".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_preview_user_agent")]
    pub user_agent: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_preview_timeout(),
            user_agent: default_preview_user_agent(),
        }
    }
}

fn default_preview_timeout() -> u64 {
    5
}

fn default_preview_user_agent() -> String {
    "RunToSipBot/1.0 (+https://runtosip.example)".to_string()
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
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();

        if config.auth.jwt_secret == INSECURE_DEFAULT_SECRET {
            warn!(
                "auth.jwt_secret is the insecure development default; set JWT_SECRET in production"
            );
        }

        Ok(config)
    }

    /// Environment variables take precedence over the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            uploads: UploadsConfig::default(),
            preview: PreviewConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
