//! Server configuration from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;

use portfolio_store::StoreConfig;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default chat API base URL.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Credentials for the chat notifier.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token.
    pub bot_token: String,
    /// Target chat.
    pub chat_id: String,
    /// API base URL, without trailing slash.
    pub api_base: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Development mode: hot reload, reload-script injection, store fallback.
    pub dev_mode: bool,
    /// Deployment identifier; present only in hosted deployments.
    pub deployment_id: Option<String>,
    /// Root of the site content (index.html, data.json, static assets).
    pub content_dir: PathBuf,
    /// Location of the durable key-value store.
    pub kv_path: PathBuf,
    /// Chat notifier credentials; notifications are disabled when absent.
    pub telegram: Option<TelegramConfig>,
    /// Bearer secret for the email webhook; unchecked when absent.
    pub webhook_auth_token: Option<String>,
    /// Bearer secret for admin endpoints; admin is closed when absent.
    pub admin_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            dev_mode: false,
            deployment_id: None,
            content_dir: PathBuf::from("."),
            kv_path: PathBuf::from("./data/kv"),
            telegram: None,
            webhook_auth_token: None,
            admin_api_key: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// All optional:
    /// - `PORT`: Server port (default: 8000)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    /// - `APP_ENV=development` or `DEV_MODE=1|true`: development mode
    /// - `DEPLOYMENT_ID`: set by the hosting platform
    /// - `CONTENT_DIR`: site root (default: ".")
    /// - `KV_PATH`: store location (default: "./data/kv")
    /// - `TELEGRAM_BOT_MESSAGE_TOKEN`, `TELEGRAM_CHAT_ID`, `TELEGRAM_API_BASE`
    /// - `WEBHOOK_AUTH_TOKEN`, `ADMIN_API_KEY`
    ///
    /// Empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT".to_string(),
                reason: format!("'{}' is not a valid port", raw),
            })?,
            None => defaults.port,
        };

        let dev_mode = var("APP_ENV").is_some_and(|v| v == "development")
            || var("DEV_MODE").is_some_and(|v| matches!(v.as_str(), "1" | "true"));

        let telegram = match (var("TELEGRAM_BOT_MESSAGE_TOKEN"), var("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base: var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            dev_mode,
            deployment_id: var("DEPLOYMENT_ID"),
            content_dir: var("CONTENT_DIR").map(PathBuf::from).unwrap_or(defaults.content_dir),
            kv_path: var("KV_PATH").map(PathBuf::from).unwrap_or(defaults.kv_path),
            telegram,
            webhook_auth_token: var("WEBHOOK_AUTH_TOKEN"),
            admin_api_key: var("ADMIN_API_KEY"),
        })
    }

    /// Whether the process runs outside a hosted production deployment.
    pub fn is_local(&self) -> bool {
        self.dev_mode || self.deployment_id.is_none()
    }

    /// Human-readable environment name.
    pub fn environment(&self) -> &'static str {
        if self.dev_mode {
            "development"
        } else if self.is_local() {
            "local"
        } else {
            "production"
        }
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.kv_path.clone(),
            allow_fallback: self.dev_mode,
            local: self.is_local(),
        }
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("dev_mode", &self.dev_mode)
            .field("deployment_id", &self.deployment_id)
            .field("content_dir", &self.content_dir)
            .field("kv_path", &self.kv_path)
            .field("telegram", &self.telegram)
            .field("webhook_auth", &self.webhook_auth_token.is_some())
            .field("admin_api", &self.admin_api_key.is_some())
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}
