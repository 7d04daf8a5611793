// Command implementations and shared configuration overrides

pub mod config;
pub mod run;

use std::collections::HashMap;

use clap::Args;
use loadcheck_harness::config::{ConfigError, LoadTestConfig};

/// Flags that take precedence over the matching LOAD_* environment variables
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Target endpoint URL [LOAD_TARGET_URL]
    #[arg(long)]
    pub url: Option<String>,

    /// HTTP method [LOAD_METHOD]
    #[arg(long)]
    pub method: Option<String>,

    /// Query sent in the request body [LOAD_QUERY]
    #[arg(long)]
    pub query: Option<String>,

    /// Virtual users, 50 to 100 [LOAD_CONCURRENCY]
    #[arg(long, short = 'c')]
    pub concurrency: Option<u32>,

    /// Requests per virtual user [LOAD_ITERATIONS]
    #[arg(long, short = 'n')]
    pub iterations: Option<u32>,

    /// Allowed P95 latency in ms [LOAD_P95_MS]
    #[arg(long)]
    pub p95_ms: Option<u64>,

    /// Allowed failure rate as a fraction [LOAD_MAX_FAILURE_RATE]
    #[arg(long)]
    pub max_failure_rate: Option<f64>,

    /// Count non-2xx responses as failures [LOAD_FAIL_ON_NON_2XX]
    #[arg(long, value_name = "BOOL")]
    pub fail_on_non_2xx: Option<bool>,

    /// Overall run timeout in ms [LOAD_TEST_TIMEOUT_MS]
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Per-request timeout in ms [LOAD_REQUEST_TIMEOUT_MS]
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Minimum number of matched docs in a valid response [LOAD_MIN_MATCHED_DOCS]
    #[arg(long)]
    pub min_matched_docs: Option<usize>,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

impl Overrides {
    /// Resolve flags over the process environment
    pub fn resolve(&self) -> Result<LoadTestConfig, ConfigError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve flags over an arbitrary variable source
    pub fn resolve_with<F>(&self, fallback: F) -> Result<LoadTestConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = self.as_vars();
        let mut config =
            LoadTestConfig::from_lookup(|name| vars.get(name).cloned().or_else(|| fallback(name)))?;

        for (name, value) in &self.headers {
            config.target.headers.insert(name.clone(), value.clone());
        }

        Ok(config)
    }

    fn as_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        let mut set = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                vars.insert(name, value);
            }
        };

        set("LOAD_TARGET_URL", self.url.clone());
        set("LOAD_METHOD", self.method.clone());
        set("LOAD_QUERY", self.query.clone());
        set("LOAD_CONCURRENCY", self.concurrency.map(|v| v.to_string()));
        set("LOAD_ITERATIONS", self.iterations.map(|v| v.to_string()));
        set("LOAD_P95_MS", self.p95_ms.map(|v| v.to_string()));
        set(
            "LOAD_MAX_FAILURE_RATE",
            self.max_failure_rate.map(|v| v.to_string()),
        );
        set(
            "LOAD_FAIL_ON_NON_2XX",
            self.fail_on_non_2xx.map(|v| v.to_string()),
        );
        set("LOAD_TEST_TIMEOUT_MS", self.timeout_ms.map(|v| v.to_string()));
        set(
            "LOAD_REQUEST_TIMEOUT_MS",
            self.request_timeout_ms.map(|v| v.to_string()),
        );
        set(
            "LOAD_MIN_MATCHED_DOCS",
            self.min_matched_docs.map(|v| v.to_string()),
        );

        vars
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {raw:?}"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in {raw:?}"));
    }

    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_flags_take_precedence_over_environment() {
        let overrides = Overrides {
            concurrency: Some(90),
            fail_on_non_2xx: Some(false),
            ..Default::default()
        };

        let config = overrides
            .resolve_with(env(&[
                ("LOAD_CONCURRENCY", "60"),
                ("LOAD_ITERATIONS", "7"),
                ("LOAD_FAIL_ON_NON_2XX", "true"),
            ]))
            .unwrap();

        assert_eq!(config.virtual_users, 90);
        assert_eq!(config.iterations_per_user, 7);
        assert!(!config.status_policy.treat_non_2xx_as_failure);
    }

    #[test]
    fn test_flag_can_fix_invalid_environment_value() {
        let overrides = Overrides {
            concurrency: Some(50),
            ..Default::default()
        };

        let config = overrides
            .resolve_with(env(&[("LOAD_CONCURRENCY", "10")]))
            .unwrap();
        assert_eq!(config.virtual_users, 50);
    }

    #[test]
    fn test_out_of_range_flag_is_rejected() {
        let overrides = Overrides {
            concurrency: Some(150),
            ..Default::default()
        };

        let err = overrides.resolve_with(env(&[])).unwrap_err();
        assert_eq!(err, ConfigError::ConcurrencyOutOfRange(150));
    }

    #[test]
    fn test_extra_headers_are_added() {
        let overrides = Overrides {
            headers: vec![("X-Api-Key".to_string(), "secret".to_string())],
            ..Default::default()
        };

        let config = overrides.resolve_with(env(&[])).unwrap();
        assert_eq!(
            config.target.headers.get("X-Api-Key").map(String::as_str),
            Some("secret")
        );
        assert_eq!(
            config.target.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer abc:def"),
            Ok(("Authorization".to_string(), "Bearer abc:def".to_string()))
        );
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header(": value").is_err());
    }
}
