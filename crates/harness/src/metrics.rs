//! Metrics collection for load tests
//!
//! Collects one [`RequestResult`] per request and derives the run [`Summary`]
//! once every virtual user has finished.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Status histogram key for requests that never received a response
pub const NETWORK_ERROR_KEY: &str = "NETWORK_ERROR";

/// Why a request was counted as failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Status code rejected by the status policy
    HttpStatus,
    /// Body could not be decoded as JSON
    InvalidJson,
    /// JSON body does not match the response contract
    ResponseShape,
    /// No response was received (connection error or timeout)
    NetworkError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::HttpStatus => "http_status",
            FailureReason::InvalidJson => "invalid_json",
            FailureReason::ResponseShape => "response_shape",
            FailureReason::NetworkError => "network_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResult {
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<FailureReason>,
}

impl RequestResult {
    pub fn success(latency_ms: u64, status: u16) -> Self {
        Self {
            latency_ms,
            status: Some(status),
            ok: true,
            reason: None,
        }
    }

    pub fn failure(latency_ms: u64, status: Option<u16>, reason: FailureReason) -> Self {
        Self {
            latency_ms,
            status,
            ok: false,
            reason: Some(reason),
        }
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn reason(&self) -> Option<FailureReason> {
        self.reason
    }

    /// Key used in the status histogram
    pub fn status_key(&self) -> String {
        match self.status {
            Some(status) => status.to_string(),
            None => NETWORK_ERROR_KEY.to_string(),
        }
    }
}

/// Append-only results collection shared by all virtual users
#[derive(Debug, Default)]
pub struct ResultLog {
    results: Mutex<Vec<RequestResult>>,
}

impl ResultLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Record a result
    pub fn push(&self, result: RequestResult) {
        self.results.lock().push(result);
    }

    /// Number of results recorded so far
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything recorded so far, leaving the log empty
    pub fn drain(&self) -> Vec<RequestResult> {
        std::mem::take(&mut *self.results.lock())
    }
}

/// Percentile (0.0 to 1.0) by sorted-index selection
///
/// Index is `floor(len * p)` clamped to the last element. No interpolation.
pub fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Aggregate statistics of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_requests: u64,
    pub success_requests: u64,
    pub failed_requests: u64,
    /// Fraction of failed requests, 1.0 when nothing was sent
    pub failure_rate: f64,
    pub avg_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    /// Requests per second over the run, rounded to 2 decimals
    pub throughput_rps: f64,
    pub duration_ms: u64,
    pub status_counts: BTreeMap<String, u64>,
    pub failure_reasons: BTreeMap<String, u64>,
}

impl Summary {
    /// Aggregate results collected over `duration` of wall-clock time
    pub fn from_results(results: &[RequestResult], duration: Duration) -> Self {
        let total_requests = results.len() as u64;
        let failed_requests = results.iter().filter(|r| !r.ok).count() as u64;
        let success_requests = total_requests - failed_requests;

        let failure_rate = if total_requests == 0 {
            1.0
        } else {
            failed_requests as f64 / total_requests as f64
        };

        let latencies: Vec<u64> = results.iter().map(|r| r.latency_ms).collect();
        let sum: u64 = latencies.iter().sum();
        let avg_latency_ms = (sum as f64 / latencies.len().max(1) as f64).round() as u64;

        let duration_secs = duration.as_secs_f64();
        let throughput_rps = if duration_secs > 0.0 {
            round2(total_requests as f64 / duration_secs)
        } else {
            0.0
        };

        let mut status_counts = BTreeMap::new();
        let mut failure_reasons = BTreeMap::new();
        for result in results {
            *status_counts.entry(result.status_key()).or_insert(0) += 1;
            if let Some(reason) = result.reason {
                *failure_reasons.entry(reason.as_str().to_string()).or_insert(0) += 1;
            }
        }

        Self {
            total_requests,
            success_requests,
            failed_requests,
            failure_rate,
            avg_latency_ms,
            p95_latency_ms: percentile(&latencies, 0.95),
            min_latency_ms: latencies.iter().copied().min().unwrap_or(0),
            max_latency_ms: latencies.iter().copied().max().unwrap_or(0),
            throughput_rps,
            duration_ms: duration.as_millis() as u64,
            status_counts,
            failure_reasons,
        }
    }

    /// Failure rate as a percentage rounded to 2 decimals
    pub fn failure_rate_percent(&self) -> f64 {
        round2(self.failure_rate * 100.0)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_percentile_uses_sorted_index() {
        let values: Vec<u64> = (1..=100).map(|i| i * 10).collect();
        // floor(100 * 0.95) = 95, the 96th smallest value
        assert_eq!(percentile(&values, 0.95), 960);

        let mut reversed = values.clone();
        reversed.reverse();
        assert_eq!(percentile(&reversed, 0.95), 960);
    }

    #[test]
    fn test_percentile_edges() {
        assert_eq!(percentile(&[], 0.95), 0);
        assert_eq!(percentile(&[42], 0.95), 42);
        assert_eq!(percentile(&[1, 2, 3], 1.0), 3);
        // floor(3 * 0.95) = 2
        assert_eq!(percentile(&[5, 1, 9], 0.95), 9);
        assert_eq!(percentile(&[5, 1, 9], 0.0), 1);
    }

    #[test]
    fn test_empty_run_fails_closed() {
        let summary = Summary::from_results(&[], Duration::ZERO);

        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.failure_rate, 1.0);
        assert!(!summary.failure_rate.is_nan());
        assert_eq!(summary.avg_latency_ms, 0);
        assert_eq!(summary.p95_latency_ms, 0);
        assert_eq!(summary.throughput_rps, 0.0);
        assert!(summary.status_counts.is_empty());
    }

    #[test]
    fn test_summary_aggregates_outcomes() {
        let results = vec![
            RequestResult::success(100, 200),
            RequestResult::success(120, 200),
            RequestResult::failure(80, Some(500), FailureReason::HttpStatus),
            RequestResult::failure(90, Some(200), FailureReason::ResponseShape),
            RequestResult::failure(3000, None, FailureReason::NetworkError),
        ];

        let summary = Summary::from_results(&results, Duration::from_millis(1500));

        assert_eq!(summary.total_requests, 5);
        assert_eq!(summary.success_requests, 2);
        assert_eq!(summary.failed_requests, 3);
        assert_eq!(
            summary.success_requests + summary.failed_requests,
            summary.total_requests
        );
        assert_eq!(summary.failure_rate, 0.6);
        assert_eq!(summary.failure_rate_percent(), 60.0);
        // (100 + 120 + 80 + 90 + 3000) / 5 = 678
        assert_eq!(summary.avg_latency_ms, 678);
        assert_eq!(summary.p95_latency_ms, 3000);
        assert_eq!(summary.min_latency_ms, 80);
        assert_eq!(summary.max_latency_ms, 3000);
        // 5 / 1.5 = 3.333..
        assert_eq!(summary.throughput_rps, 3.33);

        assert_eq!(summary.status_counts.get("200"), Some(&3));
        assert_eq!(summary.status_counts.get("500"), Some(&1));
        assert_eq!(summary.status_counts.get(NETWORK_ERROR_KEY), Some(&1));

        assert_eq!(summary.failure_reasons.len(), 3);
        assert_eq!(summary.failure_reasons.get("http_status"), Some(&1));
        assert_eq!(summary.failure_reasons.get("response_shape"), Some(&1));
        assert_eq!(summary.failure_reasons.get("network_error"), Some(&1));
    }

    #[test]
    fn test_average_latency_rounds() {
        let results = vec![RequestResult::success(1, 200), RequestResult::success(2, 200)];
        // 1.5 rounds up
        assert_eq!(
            Summary::from_results(&results, Duration::from_secs(1)).avg_latency_ms,
            2
        );
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = Summary::from_results(&[RequestResult::success(10, 200)], Duration::from_secs(1));
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["totalRequests"], 1);
        assert_eq!(value["p95LatencyMs"], 10);
        assert_eq!(value["statusCounts"]["200"], 1);
    }

    #[tokio::test]
    async fn test_result_log_concurrent_append() {
        let log = Arc::new(ResultLog::with_capacity(1000));
        let mut handles = Vec::new();

        for task in 0..10u64 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    log.push(RequestResult::success(task * 100 + i, 200));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(log.len(), 1000);
        let drained = log.drain();
        assert_eq!(drained.len(), 1000);
        assert!(log.is_empty());
    }
}
