use serde::Serialize;
use sqlx::postgres::PgConnectOptions;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use super::TenantError;

const DEFAULT_PORT: u16 = 5432;

/// Everything needed to open a connection to one physical database.
///
/// Tenant profiles are copies of the base profile that differ only in
/// `database`, so host, credentials and driver options are shared.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProfile {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: String,
    /// Driver options carried as URL query parameters (`sslmode`, ...)
    pub options: BTreeMap<String, String>,
}

impl ConnectionProfile {
    /// Parse a `postgres://` URL into a profile.
    pub fn from_url(raw: &str) -> Result<Self, TenantError> {
        let url = Url::parse(raw)
            .map_err(|e| TenantError::Configuration(format!("invalid database URL: {}", e)))?;

        let scheme = url.scheme();
        if scheme != "postgres" && scheme != "postgresql" {
            return Err(TenantError::Configuration(format!(
                "unsupported database scheme '{}'",
                scheme
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TenantError::Configuration("database URL has no host".to_string()))?;

        let database = url.path().trim_start_matches('/');
        if database.is_empty() {
            return Err(TenantError::Configuration(
                "database URL has no database name".to_string(),
            ));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            username: url.username().to_string(),
            password: url.password().map(str::to_string),
            database: database.to_string(),
            options: url.query_pairs().into_owned().collect(),
        })
    }

    /// Copy of this profile pointing at `database`.
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..self.clone()
        }
    }

    pub fn connection_url(&self) -> String {
        self.render(self.password.as_deref())
    }

    /// Connection URL safe for logs and CLI output.
    pub fn redacted(&self) -> String {
        self.render(self.password.as_ref().map(|_| "***"))
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, TenantError> {
        self.connection_url().parse::<PgConnectOptions>().map_err(|e| {
            TenantError::Configuration(format!(
                "cannot build connect options for '{}': {}",
                self.database, e
            ))
        })
    }

    fn render(&self, password: Option<&str>) -> String {
        let mut out = format!("{}://", self.scheme);
        if !self.username.is_empty() {
            out.push_str(&self.username);
            if let Some(password) = password {
                out.push(':');
                out.push_str(password);
            }
            out.push('@');
        }
        out.push_str(&format!("{}:{}/{}", self.host, self.port, self.database));
        if !self.options.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.options.iter())
                .finish();
            out.push('?');
            out.push_str(&query);
        }
        out
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("options", &self.options)
            .finish()
    }
}

impl fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
