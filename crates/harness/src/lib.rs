//! # Load Test Harness
//!
//! Concurrent load testing for JSON search endpoints with SLA gating.
//!
//! ## Features
//!
//! - **Fixed-volume fan-out**: `virtual_users` concurrent streams, each issuing
//!   `iterations_per_user` sequential requests
//! - **Response classification**: status policy, JSON decoding and a response
//!   contract (`success`, `status`, `data.matched_docs`)
//! - **Aggregation**: failure rate, average and P95 latency, throughput,
//!   status and failure-reason histograms
//! - **SLA gating**: maximum failure rate and maximum P95 latency
//! - **Reports**: text, JSON and HTML artifacts
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LoadTestRunner                          │
//! │  (spawns virtual users, enforces run timeout, aggregates)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Transport (trait)                          │
//! │  (ReqwestTransport in production, fakes in tests)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            classify → Summary → SlaThresholds                │
//! │  (per-request outcome, aggregate, terminal assertion)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use loadcheck_harness::prelude::*;
//!
//! let config = LoadTestConfig::from_env()?;
//! let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
//! let report = LoadTestRunner::new(config, transport).run().await?;
//! println!("{}", report.to_text());
//! report.assert_sla()?;
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sla;
pub mod transport;

/// Prelude for common imports
pub mod prelude {
    pub use crate::classify::{classify_response, ResponseContract, StatusPolicy};
    pub use crate::config::{ConfigError, LoadTestConfig, TargetConfig};
    pub use crate::error::HarnessError;
    pub use crate::metrics::{percentile, FailureReason, RequestResult, Summary};
    pub use crate::report::{LoadTestReport, ReportArtifacts, ReportConfig, ReportError, ReportWriter};
    pub use crate::runner::LoadTestRunner;
    pub use crate::sla::{SlaThresholds, SlaViolation};
    pub use crate::transport::{
        RawResponse, ReqwestTransport, TargetRequest, Transport, TransportError,
    };
}
