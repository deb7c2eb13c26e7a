use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::store::PoolSettings;

/// Connection parameters for the Postgres store.
#[derive(Clone, Deserialize)]
pub struct DbConfig {
    /// Full connection string. Takes precedence over the discrete fields.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub sslmode: String,
    pub timezone: Option<String>,
    pub prefer_simple_protocol: bool,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let password = get("DB_PASSWORD");
        if database_url.is_none() && password.is_none() {
            anyhow::bail!("either DATABASE_URL or DB_PASSWORD must be set");
        }

        let db = DbConfig {
            database_url,
            host: get("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_or(&get, "DB_PORT", 5432)?,
            user: get("DB_USER").unwrap_or_else(|| "postgres".into()),
            password,
            name: get("DB_NAME").unwrap_or_else(|| "postgres".into()),
            sslmode: get("DB_SSLMODE").unwrap_or_else(|| "prefer".into()),
            timezone: get("DB_TIMEZONE").filter(|v| !v.is_empty()),
            prefer_simple_protocol: parse_or(&get, "DB_PREFER_SIMPLE_PROTOCOL", false)?,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            acquire_timeout_secs: parse_or(&get, "DB_ACQUIRE_TIMEOUT_SECS", 30)?,
        };

        Ok(Self {
            db,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080)?,
            request_timeout: Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?),
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

impl DbConfig {
    /// Builds driver options. Malformed connection strings are reported by sqlx.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        let mut opts = match &self.database_url {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .context("parse DATABASE_URL")?,
            None => {
                let ssl_mode = self
                    .sslmode
                    .parse::<PgSslMode>()
                    .with_context(|| format!("invalid DB_SSLMODE {:?}", self.sslmode))?;
                PgConnectOptions::new()
                    .host(&self.host)
                    .port(self.port)
                    .username(&self.user)
                    .password(self.password.as_deref().unwrap_or_default())
                    .database(&self.name)
                    .ssl_mode(ssl_mode)
            }
        };

        if let Some(tz) = &self.timezone {
            opts = opts.options([("TimeZone", tz.as_str())]);
        }
        // No prepared statement cache: every query goes out as a fresh statement.
        if self.prefer_simple_protocol {
            opts = opts.statement_cache_capacity(0);
        }
        Ok(opts)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("sslmode", &self.sslmode)
            .field("timezone", &self.timezone)
            .field("prefer_simple_protocol", &self.prefer_simple_protocol)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_password_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[("DB_PASSWORD", "secret")])).unwrap();
        assert_eq!(cfg.db.host, "localhost");
        assert_eq!(cfg.db.port, 5432);
        assert_eq!(cfg.db.user, "postgres");
        assert_eq!(cfg.db.name, "postgres");
        assert_eq!(cfg.db.sslmode, "prefer");
        assert!(!cfg.db.prefer_simple_protocol);
        assert_eq!(cfg.db.max_connections, 10);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("DB_HOST", "db")])).unwrap_err();
        assert!(err.to_string().contains("DB_PASSWORD"));
    }

    #[test]
    fn database_url_alone_is_enough() {
        let cfg = AppConfig::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://app:pw@db.internal:6543/fit",
        )]))
        .unwrap();
        let opts = cfg.db.connect_options().unwrap();
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_database(), Some("fit"));
    }

    #[test]
    fn discrete_parameters_build_options() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DB_HOST", "pg"),
            ("DB_PORT", "5433"),
            ("DB_USER", "fit"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "tracker"),
            ("DB_SSLMODE", "disable"),
            ("DB_TIMEZONE", "Europe/London"),
            ("DB_PREFER_SIMPLE_PROTOCOL", "true"),
        ]))
        .unwrap();
        assert!(cfg.db.prefer_simple_protocol);
        let opts = cfg.db.connect_options().unwrap();
        assert_eq!(opts.get_host(), "pg");
        assert_eq!(opts.get_port(), 5433);
        assert_eq!(opts.get_username(), "fit");
        assert_eq!(opts.get_database(), Some("tracker"));
        assert!(matches!(opts.get_ssl_mode(), PgSslMode::Disable));
    }

    #[test]
    fn unknown_sslmode_is_rejected() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DB_PASSWORD", "pw"),
            ("DB_SSLMODE", "sometimes"),
        ]))
        .unwrap();
        assert!(cfg.db.connect_options().is_err());
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DB_PASSWORD", "pw"),
            ("DB_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DB_PASSWORD", "hunter2"),
            ("DATABASE_URL", "postgres://u:hunter2@h/db"),
        ]))
        .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DB_PASSWORD", "pw"),
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
    }
}
