//! Process configuration read from the environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::chat::rate_limit::DEFAULT_MAX_REQUESTS;
use crate::llm::groq::DEFAULT_BASE_URL;
use crate::llm::GroqModel;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RESUME_PATH: &str = "public/resume.pdf";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub groq_api_key: String,
    pub groq_model: GroqModel,
    pub groq_base_url: String,
    pub bind_addr: SocketAddr,
    pub max_requests_per_minute: u32,
    pub max_tokens: u32,
    pub upstream_timeout: Duration,
    pub resume_path: PathBuf,
    /// `None` means the profile compiled into the binary
    pub profile_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let groq_api_key = get("GROQ_API_KEY").ok_or(ConfigError::Missing("GROQ_API_KEY"))?;

        let groq_model = get("GROQ_MODEL")
            .map(|id| GroqModel::from_id(&id))
            .unwrap_or_default();
        let groq_base_url = get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let bind_addr = parse_or("RELAY_BIND_ADDR", get("RELAY_BIND_ADDR"), || {
            DEFAULT_BIND_ADDR.parse().map_err(|_| ConfigError::Invalid {
                var: "RELAY_BIND_ADDR",
                value: DEFAULT_BIND_ADDR.to_string(),
            })
        })?;

        let max_requests_per_minute = parse_or(
            "RELAY_MAX_REQUESTS_PER_MINUTE",
            get("RELAY_MAX_REQUESTS_PER_MINUTE"),
            || Ok(DEFAULT_MAX_REQUESTS),
        )?;
        if max_requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                var: "RELAY_MAX_REQUESTS_PER_MINUTE",
                value: "0".to_string(),
            });
        }

        let max_tokens = parse_or("RELAY_MAX_TOKENS", get("RELAY_MAX_TOKENS"), || {
            Ok(DEFAULT_MAX_TOKENS)
        })?;

        let timeout_secs: u64 = parse_or(
            "RELAY_UPSTREAM_TIMEOUT_SECS",
            get("RELAY_UPSTREAM_TIMEOUT_SECS"),
            || Ok(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "RELAY_UPSTREAM_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            groq_api_key,
            groq_model,
            groq_base_url,
            bind_addr,
            max_requests_per_minute,
            max_tokens,
            upstream_timeout: Duration::from_secs(timeout_secs),
            resume_path: get("RELAY_RESUME_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESUME_PATH)),
            profile_path: get("RELAY_PROFILE_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T, D>(var: &'static str, raw: Option<String>, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    D: FnOnce() -> Result<T, ConfigError>,
{
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("GROQ_API_KEY", "gsk_test")])).unwrap();

        assert_eq!(config.groq_api_key, "gsk_test");
        assert_eq!(config.groq_model, GroqModel::Llama33Versatile);
        assert_eq!(config.groq_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.bind_addr, "127.0.0.1:3030".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_requests_per_minute, 10);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.upstream_timeout, Duration::from_secs(60));
        assert_eq!(config.resume_path, PathBuf::from("public/resume.pdf"));
        assert!(config.profile_path.is_none());
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("GROQ_API_KEY")
        );
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("GROQ_API_KEY", "   ")])).unwrap_err(),
            ConfigError::Missing("GROQ_API_KEY")
        );
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("GROQ_MODEL", "llama-3.1-8b-instant"),
            ("RELAY_BIND_ADDR", "0.0.0.0:8080"),
            ("RELAY_MAX_REQUESTS_PER_MINUTE", "3"),
            ("RELAY_UPSTREAM_TIMEOUT_SECS", "5"),
            ("RELAY_PROFILE_PATH", "/etc/profile.json"),
        ]))
        .unwrap();

        assert_eq!(config.groq_model, GroqModel::Llama31Instant);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_requests_per_minute, 3);
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.profile_path, Some(PathBuf::from("/etc/profile.json")));
    }

    #[test]
    fn test_malformed_values() {
        let err = AppConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("RELAY_MAX_TOKENS", "lots"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "RELAY_MAX_TOKENS",
                value: "lots".to_string()
            }
        );

        assert!(AppConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("RELAY_MAX_REQUESTS_PER_MINUTE", "0"),
        ]))
        .is_err());
    }
}
