//! SLA evaluation
//!
//! The terminal check of a run: the aggregate must stay within the allowed
//! failure rate and P95 latency.

use std::fmt;

use serde::Serialize;

use crate::metrics::Summary;

/// Limits a passing run must respect
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaThresholds {
    /// Maximum failure rate as a fraction in [0, 1]
    pub max_failure_rate: f64,
    /// Maximum P95 latency in milliseconds
    pub max_p95_latency_ms: u64,
}

impl Default for SlaThresholds {
    fn default() -> Self {
        Self {
            max_failure_rate: 0.02,
            max_p95_latency_ms: 1500,
        }
    }
}

/// A single breached threshold
#[derive(Debug, Clone, PartialEq)]
pub enum SlaViolation {
    FailureRate { actual: f64, allowed: f64 },
    P95Latency { actual_ms: u64, allowed_ms: u64 },
}

impl fmt::Display for SlaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlaViolation::FailureRate { actual, allowed } => {
                write!(f, "Failure rate {actual} exceeded {allowed}")
            }
            SlaViolation::P95Latency {
                actual_ms,
                allowed_ms,
            } => write!(f, "P95 {actual_ms}ms exceeded {allowed_ms}ms"),
        }
    }
}

impl SlaThresholds {
    /// Check a summary against both thresholds
    ///
    /// Both conditions are always evaluated so a report lists every breach.
    pub fn evaluate(&self, summary: &Summary) -> Result<(), Vec<SlaViolation>> {
        let mut violations = Vec::new();

        if summary.failure_rate > self.max_failure_rate {
            violations.push(SlaViolation::FailureRate {
                actual: summary.failure_rate,
                allowed: self.max_failure_rate,
            });
        }

        if summary.p95_latency_ms > self.max_p95_latency_ms {
            violations.push(SlaViolation::P95Latency {
                actual_ms: summary.p95_latency_ms,
                allowed_ms: self.max_p95_latency_ms,
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{FailureReason, RequestResult};
    use std::time::Duration;

    fn summary(ok: usize, failed: usize, latency_ms: u64) -> Summary {
        let mut results = vec![RequestResult::success(latency_ms, 200); ok];
        results.extend(vec![
            RequestResult::failure(latency_ms, Some(500), FailureReason::HttpStatus);
            failed
        ]);
        Summary::from_results(&results, Duration::from_secs(1))
    }

    #[test]
    fn test_passes_within_thresholds() {
        let thresholds = SlaThresholds::default();
        assert_eq!(thresholds.evaluate(&summary(98, 2, 1500)), Ok(()));
    }

    #[test]
    fn test_failure_rate_violation() {
        let thresholds = SlaThresholds::default();
        let err = thresholds.evaluate(&summary(97, 3, 100)).unwrap_err();

        assert_eq!(
            err,
            vec![SlaViolation::FailureRate {
                actual: 0.03,
                allowed: 0.02
            }]
        );
        assert_eq!(err[0].to_string(), "Failure rate 0.03 exceeded 0.02");
    }

    #[test]
    fn test_p95_violation() {
        let thresholds = SlaThresholds::default();
        let err = thresholds.evaluate(&summary(100, 0, 1501)).unwrap_err();

        assert_eq!(
            err,
            vec![SlaViolation::P95Latency {
                actual_ms: 1501,
                allowed_ms: 1500
            }]
        );
        assert_eq!(err[0].to_string(), "P95 1501ms exceeded 1500ms");
    }

    #[test]
    fn test_reports_both_violations() {
        let thresholds = SlaThresholds {
            max_failure_rate: 0.0,
            max_p95_latency_ms: 10,
        };
        let err = thresholds.evaluate(&summary(50, 50, 20)).unwrap_err();
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn test_empty_run_never_passes() {
        let thresholds = SlaThresholds {
            max_failure_rate: 0.5,
            max_p95_latency_ms: 1000,
        };
        let empty = Summary::from_results(&[], Duration::ZERO);
        assert!(thresholds.evaluate(&empty).is_err());
    }
}
