//! Load test configuration
//!
//! Configuration is built once (from the environment or by hand), validated,
//! and passed by reference into the runner. Nothing is read from the
//! environment after startup.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Method, Url};
use serde_json::{json, Value};

use crate::classify::{ResponseContract, StatusPolicy};
use crate::sla::SlaThresholds;

/// Smallest accepted number of virtual users
pub const MIN_VIRTUAL_USERS: u32 = 50;
/// Largest accepted number of virtual users
pub const MAX_VIRTUAL_USERS: u32 = 100;

pub const DEFAULT_TARGET_URL: &str = "http://localhost:8000/generate";
pub const DEFAULT_QUERY: &str = "a";
pub const DEFAULT_VIRTUAL_USERS: u32 = 50;
pub const DEFAULT_ITERATIONS_PER_USER: u32 = 50;
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Configuration errors, raised before any request is sent
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {message}")]
    InvalidValue {
        name: String,
        value: String,
        message: String,
    },

    #[error("virtual users must be between 50 and 100. Received: {0}")]
    ConcurrencyOutOfRange(u32),

    #[error("max failure rate must be within [0, 1]. Received: {0}")]
    FailureRateOutOfRange(f64),

    #[error("invalid target URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unsupported HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// The request every virtual user sends
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Endpoint URL
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Fixed JSON body
    pub body: Value,
}

impl TargetConfig {
    /// Target with the default JSON headers and a `{ "query": ... }` body
    pub fn new(url: impl Into<String>, query: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            url: url.into(),
            method: Method::POST,
            headers,
            body: json!({ "query": query.into() }),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_URL, DEFAULT_QUERY)
    }
}

/// Full configuration of one load test run
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    pub target: TargetConfig,
    /// Concurrent request streams, must lie in 50..=100
    pub virtual_users: u32,
    /// Sequential requests per virtual user
    pub iterations_per_user: u32,
    pub thresholds: SlaThresholds,
    pub status_policy: StatusPolicy,
    pub contract: ResponseContract,
    /// Wall-clock budget for the entire run
    pub run_timeout: Duration,
    /// Budget for a single request, exceeding it counts as a network error
    pub request_timeout: Duration,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            virtual_users: DEFAULT_VIRTUAL_USERS,
            iterations_per_user: DEFAULT_ITERATIONS_PER_USER,
            thresholds: SlaThresholds::default(),
            status_policy: StatusPolicy::default(),
            contract: ResponseContract::default(),
            run_timeout: Duration::from_millis(DEFAULT_RUN_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl LoadTestConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `LOAD_TARGET_URL`: endpoint (default: http://localhost:8000/generate)
    /// - `LOAD_METHOD`: HTTP method (default: POST)
    /// - `LOAD_QUERY`: query sent in the request body (default: "a")
    /// - `LOAD_CONCURRENCY`: virtual users, 50 to 100 (default: 50)
    /// - `LOAD_ITERATIONS`: requests per virtual user (default: 50)
    /// - `LOAD_P95_MS`: allowed P95 latency in ms (default: 1500)
    /// - `LOAD_MAX_FAILURE_RATE`: allowed failure rate as a fraction (default: 0.02)
    /// - `LOAD_FAIL_ON_NON_2XX`: count non-2xx responses as
    ///   failures, `true` or `1` (case-insensitive) enable it (default: true)
    /// - `LOAD_TEST_TIMEOUT_MS`: overall run timeout (default: 300000)
    /// - `LOAD_REQUEST_TIMEOUT_MS`: per-request timeout (default: 30000)
    /// - `LOAD_MIN_MATCHED_DOCS`: minimum `data.matched_docs` length (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("LOAD_TARGET_URL").unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        let query = lookup("LOAD_QUERY").unwrap_or_else(|| DEFAULT_QUERY.to_string());

        let mut target = TargetConfig::new(url, query);
        if let Some(method) = lookup("LOAD_METHOD") {
            target.method = parse_method(&method)?;
        }

        let defaults = Self::default();
        let config = Self {
            target,
            virtual_users: parse_var(&lookup, "LOAD_CONCURRENCY", defaults.virtual_users)?,
            iterations_per_user: parse_var(
                &lookup,
                "LOAD_ITERATIONS",
                defaults.iterations_per_user,
            )?,
            thresholds: SlaThresholds {
                max_failure_rate: parse_var(
                    &lookup,
                    "LOAD_MAX_FAILURE_RATE",
                    defaults.thresholds.max_failure_rate,
                )?,
                max_p95_latency_ms: parse_var(
                    &lookup,
                    "LOAD_P95_MS",
                    defaults.thresholds.max_p95_latency_ms,
                )?,
            },
            status_policy: StatusPolicy {
                treat_non_2xx_as_failure: lookup("LOAD_FAIL_ON_NON_2XX")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.status_policy.treat_non_2xx_as_failure),
            },
            contract: ResponseContract {
                min_matched_docs: parse_var(
                    &lookup,
                    "LOAD_MIN_MATCHED_DOCS",
                    defaults.contract.min_matched_docs,
                )?,
            },
            run_timeout: Duration::from_millis(parse_var(
                &lookup,
                "LOAD_TEST_TIMEOUT_MS",
                DEFAULT_RUN_TIMEOUT_MS,
            )?),
            request_timeout: Duration::from_millis(parse_var(
                &lookup,
                "LOAD_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every bound that must hold before the run starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_VIRTUAL_USERS..=MAX_VIRTUAL_USERS).contains(&self.virtual_users) {
            return Err(ConfigError::ConcurrencyOutOfRange(self.virtual_users));
        }

        let rate = self.thresholds.max_failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::FailureRateOutOfRange(rate));
        }

        if self.run_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("run timeout"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("request timeout"));
        }

        let url = Url::parse(&self.target.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.target.url.clone(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.target.url.clone(),
                message: format!("unsupported scheme {}", url.scheme()),
            });
        }

        Ok(())
    }

    /// Total number of requests a complete run issues
    pub fn total_requests(&self) -> u64 {
        u64::from(self.virtual_users) * u64::from(self.iterations_per_user)
    }

    /// JSON view of the resolved configuration
    pub fn to_json(&self) -> Value {
        json!({
            "target": {
                "url": self.target.url,
                "method": self.target.method.as_str(),
                "headers": self.target.headers,
                "body": self.target.body,
            },
            "virtualUsers": self.virtual_users,
            "iterationsPerUser": self.iterations_per_user,
            "totalRequests": self.total_requests(),
            "thresholds": {
                "maxFailureRate": self.thresholds.max_failure_rate,
                "p95ThresholdMs": self.thresholds.max_p95_latency_ms,
                "failOnNon2xx": self.status_policy.treat_non_2xx_as_failure,
            },
            "minMatchedDocs": self.contract.min_matched_docs,
            "runTimeoutMs": self.run_timeout.as_millis() as u64,
            "requestTimeoutMs": self.request_timeout.as_millis() as u64,
        })
    }
}

/// Parse an HTTP method name, case-insensitively
pub fn parse_method(value: &str) -> Result<Method, ConfigError> {
    match value.trim().to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        _ => Err(ConfigError::InvalidMethod(value.to_string())),
    }
}

/// `true` or `1`, case-insensitive; anything else is false
fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
    }
}
