//! HTTP transport
//!
//! The runner only needs "send this request, give me status and body". The
//! [`Transport`] trait is that seam; [`ReqwestTransport`] is the production
//! implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use crate::config::TargetConfig;

/// A fully prepared request, built once and reused by every virtual user
#[derive(Debug, Clone)]
pub struct TargetRequest {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl From<&TargetConfig> for TargetRequest {
    fn from(target: &TargetConfig) -> Self {
        Self {
            url: target.url.clone(),
            method: target.method.clone(),
            headers: target.headers.clone(),
            body: target.body.to_string().into_bytes(),
        }
    }
}

/// A received response with its body fully read
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// No usable response was received
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Sends one request and returns the response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TargetRequest) -> Result<RawResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose requests give up after `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &TargetRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .body(request.body.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse { status, body })
    }
}
