use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use companion_llm::RetryPolicy;
use companion_llm::replicate::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone, PartialEq)]
pub enum LlmProvider {
    Replicate {
        api_key: String,
        model: String,
        base_url: String,
    },
    /// Fixed greeting, no network.
    Canned,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub llm: LlmProvider,
    pub retry: RetryPolicy,
    pub history_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("COMPANION_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("COMPANION_JWT_SECRET is unset or still a placeholder");
        }

        let llm = match var("COMPANION_LLM_PROVIDER").as_deref().unwrap_or("replicate") {
            "replicate" => LlmProvider::Replicate {
                api_key: var("REPLICATE_API_KEY")
                    .context("REPLICATE_API_KEY is required for the replicate provider")?,
                model: var("REPLICATE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
                base_url: var("REPLICATE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            },
            "canned" => LlmProvider::Canned,
            other => bail!("Unknown COMPANION_LLM_PROVIDER '{}'", other),
        };

        let defaults = RetryPolicy::default();
        let max_attempts: u32 = parse(&var, "COMPANION_LLM_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            bail!("COMPANION_LLM_MAX_ATTEMPTS must be at least 1");
        }
        let backoff_ms: u64 = parse(
            &var,
            "COMPANION_LLM_BACKOFF_MS",
            defaults.base_delay.as_millis() as u64,
        )?;

        let history_limit: u32 = parse(&var, "COMPANION_HISTORY_LIMIT", 20)?;
        if history_limit == 0 {
            bail!("COMPANION_HISTORY_LIMIT must be at least 1");
        }

        Ok(Self {
            host: var("COMPANION_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&var, "COMPANION_PORT", 3000)?,
            db_path: var("COMPANION_DB_PATH").unwrap_or_else(|| "companion.db".into()).into(),
            jwt_secret,
            jwt_issuer: var("COMPANION_JWT_ISSUER"),
            llm,
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(backoff_ms),
            },
            history_limit,
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid {} '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[
            ("COMPANION_JWT_SECRET", "s3cret"),
            ("REPLICATE_API_KEY", "r8_key"),
        ])
        .unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("companion.db"));
        assert_eq!(cfg.jwt_issuer, None);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay, Duration::from_secs(1));
        assert_eq!(cfg.history_limit, 20);
        assert_eq!(
            cfg.llm,
            LlmProvider::Replicate {
                api_key: "r8_key".into(),
                model: DEFAULT_MODEL.into(),
                base_url: DEFAULT_BASE_URL.into(),
            }
        );
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(config(&[("COMPANION_LLM_PROVIDER", "canned")]).is_err());
        assert!(config(&[
            ("COMPANION_JWT_SECRET", "dev-secret-change-me"),
            ("COMPANION_LLM_PROVIDER", "canned"),
        ])
        .is_err());
    }

    #[test]
    fn replicate_needs_an_api_key() {
        assert!(config(&[("COMPANION_JWT_SECRET", "s3cret")]).is_err());
        assert!(config(&[("COMPANION_JWT_SECRET", "s3cret"), ("REPLICATE_API_KEY", " ")]).is_err());
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = config(&[
            ("COMPANION_JWT_SECRET", "s3cret"),
            ("COMPANION_LLM_PROVIDER", "canned"),
            ("COMPANION_PORT", "8080"),
            ("COMPANION_LLM_BACKOFF_MS", "250"),
            ("COMPANION_JWT_ISSUER", "https://auth.example.com"),
        ])
        .unwrap();
        assert_eq!(cfg.llm, LlmProvider::Canned);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.retry.base_delay, Duration::from_millis(250));
        assert_eq!(cfg.jwt_issuer.as_deref(), Some("https://auth.example.com"));

        let base = [("COMPANION_JWT_SECRET", "s3cret"), ("COMPANION_LLM_PROVIDER", "canned")];
        assert!(config(&[base[0], base[1], ("COMPANION_PORT", "http")]).is_err());
        assert!(config(&[base[0], base[1], ("COMPANION_LLM_MAX_ATTEMPTS", "0")]).is_err());
        assert!(config(&[base[0], base[1], ("COMPANION_HISTORY_LIMIT", "0")]).is_err());
        assert_eq!(
            config(&[base[0], base[1], ("COMPANION_HISTORY_LIMIT", "1")]).unwrap().history_limit,
            1
        );
        assert!(config(&[base[0], ("COMPANION_LLM_PROVIDER", "openai")]).is_err());
    }
}
