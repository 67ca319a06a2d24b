use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::persistence::HttpBackendConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where the timetable lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite { database_url: String },
    Http { base_url: String, api_token: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub backend: BackendKind,
    /// 0 disables the refresh scheduler.
    pub refresh_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr: SocketAddr = match var("BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                value,
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let backend = match var("TIMETABLE_BACKEND").as_deref() {
            None | Some("sqlite") => BackendKind::Sqlite {
                database_url: var("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://timetable.db".to_string()),
            },
            Some("http") => BackendKind::Http {
                base_url: var("TIMETABLE_API_URL").ok_or(ConfigError::Missing("TIMETABLE_API_URL"))?,
                api_token: var("TIMETABLE_API_TOKEN"),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "TIMETABLE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let refresh_interval_secs: u64 = match var("REFRESH_INTERVAL_SECS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "REFRESH_INTERVAL_SECS",
                value,
            })?,
            None => 0,
        };

        Ok(Self {
            bind_addr,
            backend,
            refresh_interval_secs,
        })
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

impl BackendKind {
    pub fn http_config(&self) -> Option<HttpBackendConfig> {
        match self {
            BackendKind::Http { base_url, api_token } => {
                let mut config = HttpBackendConfig::new(base_url.clone());
                config.api_token = api_token.clone();
                Some(config)
            }
            BackendKind::Sqlite { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.backend,
            BackendKind::Sqlite {
                database_url: "sqlite://timetable.db".to_string()
            }
        );
        assert_eq!(config.refresh_interval(), None);
    }

    #[test]
    fn test_http_backend() {
        let config = Config::from_lookup(lookup(&[
            ("TIMETABLE_BACKEND", "http"),
            ("TIMETABLE_API_URL", "http://localhost:8080/api"),
            ("TIMETABLE_API_TOKEN", "secret"),
            ("REFRESH_INTERVAL_SECS", "30"),
        ]))
        .unwrap();

        let http = config.backend.http_config().unwrap();
        assert_eq!(http.base_url, "http://localhost:8080/api");
        assert_eq!(http.api_token.as_deref(), Some("secret"));
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_http_backend_requires_url() {
        let err = Config::from_lookup(lookup(&[("TIMETABLE_BACKEND", "http")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TIMETABLE_API_URL"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])),
            Err(ConfigError::Invalid { name: "BIND_ADDR", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TIMETABLE_BACKEND", "mongo")])),
            Err(ConfigError::Invalid { name: "TIMETABLE_BACKEND", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("REFRESH_INTERVAL_SECS", "-1")])),
            Err(ConfigError::Invalid { name: "REFRESH_INTERVAL_SECS", .. })
        ));
    }
}
