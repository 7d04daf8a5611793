//! Run-level errors
//!
//! Per-request failures are never errors here: they are recorded as a
//! [`FailureReason`](crate::metrics::FailureReason) and aggregated. Only the
//! conditions below end a run.

use std::time::Duration;

use crate::config::ConfigError;
use crate::sla::SlaViolation;

/// Error that ends a load test run
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Configuration rejected before any request was sent
    #[error("invalid load test configuration: {0}")]
    Config(#[from] ConfigError),

    /// The whole run exceeded its wall-clock budget
    #[error("load test exceeded its {}ms timeout", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// A virtual user task panicked or was cancelled
    #[error("virtual user task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// The aggregate results violate the SLA
    #[error("SLA violated: {}", format_violations(.0))]
    SlaViolated(Vec<SlaViolation>),
}

impl HarnessError {
    /// Whether this error was raised before any request was issued
    pub fn is_config(&self) -> bool {
        matches!(self, HarnessError::Config(_))
    }
}

fn format_violations(violations: &[SlaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sla_violated_message_lists_every_violation() {
        let err = HarnessError::SlaViolated(vec![
            SlaViolation::FailureRate {
                actual: 0.5,
                allowed: 0.02,
            },
            SlaViolation::P95Latency {
                actual_ms: 2000,
                allowed_ms: 1500,
            },
        ]);

        let message = err.to_string();
        assert!(message.contains("Failure rate 0.5 exceeded 0.02"), "{message}");
        assert!(message.contains("P95 2000ms exceeded 1500ms"), "{message}");
    }

    #[test]
    fn test_timeout_message() {
        let err = HarnessError::Timeout {
            timeout: Duration::from_millis(300_000),
        };
        assert_eq!(err.to_string(), "load test exceeded its 300000ms timeout");
    }
}
