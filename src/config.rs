use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;

use crate::access::ITEMS_PER_PAGE;
use crate::auth::SESSION_DAYS;

/// Runtime settings, read from the environment.
///
/// | variable | default |
/// |---|---|
/// | `DATABASE_URL` | unset: in-memory store and auth |
/// | `ALUNOS_BIND` | `127.0.0.1:3000` |
/// | `ALUNOS_PAGE_SIZE` | `10` |
/// | `ALUNOS_SESSION_DAYS` | `2` |
/// | `ALUNOS_DB_CONNECTIONS` | `5` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind: SocketAddr,
    pub page_size: u32,
    pub session_days: i64,
    pub db_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            page_size: ITEMS_PER_PAGE,
            session_days: SESSION_DAYS,
            db_connections: 5,
        }
    }
}

fn parsed<T>(vars: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Self::from_vars(&|key| env::var(key).ok())
    }

    pub fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();
        let config = Config {
            database_url: vars("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            bind: parsed(vars, "ALUNOS_BIND", defaults.bind)?,
            page_size: parsed(vars, "ALUNOS_PAGE_SIZE", defaults.page_size)?,
            session_days: parsed(vars, "ALUNOS_SESSION_DAYS", defaults.session_days)?,
            db_connections: parsed(vars, "ALUNOS_DB_CONNECTIONS", defaults.db_connections)?,
        };
        if config.page_size == 0 {
            anyhow::bail!("ALUNOS_PAGE_SIZE must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(&|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(from(&[]).unwrap(), Config::default());
        assert_eq!(Config::default().page_size, 10);
    }

    #[test]
    fn overrides() {
        let config = from(&[
            ("DATABASE_URL", "postgres://localhost/alunos"),
            ("ALUNOS_BIND", "0.0.0.0:8080"),
            ("ALUNOS_PAGE_SIZE", "25"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/alunos"));
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn rejects_garbage() {
        assert!(from(&[("ALUNOS_PAGE_SIZE", "ten")]).is_err());
        assert!(from(&[("ALUNOS_PAGE_SIZE", "0")]).is_err());
        assert!(from(&[("ALUNOS_BIND", "nowhere")]).is_err());
        assert_eq!(from(&[("DATABASE_URL", " ")]).unwrap().database_url, None);
    }
}
