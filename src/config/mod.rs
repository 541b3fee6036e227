use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Base (administrative) connection URL. Every tenant profile is cloned from it.
    pub url: Option<String>,
    /// Reserved identifier the base profile is registered under.
    pub base_alias: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Selector bound to requests whose session carries none.
    pub default_selector: String,
    /// CSV listing of `company_code,database,"description"` lines.
    pub directory_file: PathBuf,
    /// Entity kinds that always live in the base database.
    pub tenant_independent: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub session_secret: String,
    pub session_expiry_hours: u64,
    pub session_cookie_name: String,
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let preset = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        // A config file replaces the preset wholesale; env vars still win over both
        let base = match env::var("APP_CONFIG_FILE") {
            Ok(path) => match Self::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring config file {}: {}", path, e);
                    preset
                }
            },
            Err(_) => preset,
        };

        base.with_env_overrides()
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_BASE_ALIAS") {
            self.database.base_alias = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANCY_DEFAULT_SELECTOR") {
            self.tenancy.default_selector = v;
        }
        if let Ok(v) = env::var("TENANCY_DIRECTORY_FILE") {
            self.tenancy.directory_file = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TENANCY_INDEPENDENT_KINDS") {
            self.tenancy.tenant_independent = split_list(&v);
        }

        // API overrides
        if let Some(v) = env::var("API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("SESSION_SECRET") {
            self.security.session_secret = v;
        }
        if let Ok(v) = env::var("SESSION_EXPIRY_HOURS") {
            self.security.session_expiry_hours = v.parse().unwrap_or(self.security.session_expiry_hours);
        }
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.security.session_cookie_name = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig::default(),
            tenancy: TenancyConfig::default(),
            api: ApiConfig::default(),
            security: SecurityConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                ..DatabaseConfig::default()
            },
            tenancy: TenancyConfig::default(),
            api: ApiConfig::default(),
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                session_secret: String::new(),
                session_expiry_hours: 24,
                secure_cookies: true,
                ..SecurityConfig::default()
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                ..DatabaseConfig::default()
            },
            tenancy: TenancyConfig::default(),
            api: ApiConfig {
                enable_request_logging: false,
                ..ApiConfig::default()
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                session_secret: String::new(),
                session_expiry_hours: 8,
                secure_cookies: true,
                ..SecurityConfig::default()
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            base_alias: "default".to_string(),
            max_connections: 10,
            connection_timeout: 30,
        }
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            default_selector: "silicon4".to_string(),
            directory_file: PathBuf::from("databases.txt"),
            tenant_independent: vec!["session".to_string(), "sessions".to_string()],
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            enable_request_logging: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["http://localhost:3000".to_string()],
            session_secret: "development-session-secret".to_string(),
            session_expiry_hours: 24 * 7, // 1 week
            session_cookie_name: "ledger_session".to_string(),
            secure_cookies: false,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
