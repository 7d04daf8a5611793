//! Load test runner
//!
//! Fans out one task per virtual user, each issuing its iterations
//! sequentially, waits for all of them under the run timeout, then
//! aggregates.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classify::{classify_response, ResponseContract, StatusPolicy};
use crate::config::LoadTestConfig;
use crate::error::HarnessError;
use crate::metrics::{FailureReason, RequestResult, ResultLog, Summary};
use crate::report::LoadTestReport;
use crate::transport::{TargetRequest, Transport};

const MAX_PREALLOCATED_RESULTS: u64 = 1_000_000;

/// Runs a configured load test against a transport
pub struct LoadTestRunner {
    config: LoadTestConfig,
    transport: Arc<dyn Transport>,
}

impl LoadTestRunner {
    pub fn new(config: LoadTestConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Execute every request and aggregate the results
    ///
    /// Fails before sending anything if the configuration is invalid, and
    /// with [`HarnessError::Timeout`] if the run exceeds its budget. Request
    /// failures are recorded in the summary, never returned.
    pub async fn run(&self) -> Result<LoadTestReport, HarnessError> {
        self.config.validate()?;

        let virtual_users = self.config.virtual_users;
        let iterations = self.config.iterations_per_user;
        info!(
            url = %self.config.target.url,
            method = %self.config.target.method,
            virtual_users,
            iterations,
            "Starting load test"
        );

        let request = Arc::new(TargetRequest::from(&self.config.target));
        let log = Arc::new(ResultLog::with_capacity(
            self.config.total_requests().min(MAX_PREALLOCATED_RESULTS) as usize,
        ));
        let policy = self.config.status_policy;
        let contract = self.config.contract;

        let started = Instant::now();
        let mut users = JoinSet::new();

        for user in 0..virtual_users {
            let transport = self.transport.clone();
            let request = request.clone();
            let log = log.clone();

            users.spawn(async move {
                for iteration in 0..iterations {
                    let result =
                        execute_request(transport.as_ref(), &request, policy, &contract).await;
                    if let Some(reason) = result.reason() {
                        debug!(
                            user,
                            iteration,
                            %reason,
                            status = ?result.status(),
                            latency_ms = result.latency_ms(),
                            "Request failed"
                        );
                    }
                    log.push(result);
                }
            });
        }

        let join_all = async {
            while let Some(joined) = users.join_next().await {
                joined?;
            }
            Ok::<(), HarnessError>(())
        };

        match tokio::time::timeout(self.config.run_timeout, join_all).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!(
                    timeout_ms = self.config.run_timeout.as_millis() as u64,
                    completed = log.len(),
                    expected = self.config.total_requests(),
                    "Load test timed out"
                );
                return Err(HarnessError::Timeout {
                    timeout: self.config.run_timeout,
                });
            }
        }

        let duration = started.elapsed();
        let results = log.drain();
        let summary = Summary::from_results(&results, duration);

        info!(
            total = summary.total_requests,
            failed = summary.failed_requests,
            failure_rate = summary.failure_rate,
            avg_latency_ms = summary.avg_latency_ms,
            p95_latency_ms = summary.p95_latency_ms,
            throughput_rps = summary.throughput_rps,
            "Load test complete"
        );

        Ok(LoadTestReport::new(&self.config, summary))
    }

    /// Run, log the text summary, then assert the SLA
    pub async fn run_and_assert(&self) -> Result<LoadTestReport, HarnessError> {
        let report = self.run().await?;
        info!("\n{}", report.to_text());
        report.assert_sla()?;
        Ok(report)
    }
}

/// Issue one request and classify its outcome
///
/// Latency covers sending, receiving the body and classification.
pub async fn execute_request(
    transport: &dyn Transport,
    request: &TargetRequest,
    policy: StatusPolicy,
    contract: &ResponseContract,
) -> RequestResult {
    let start = Instant::now();

    match transport.send(request).await {
        Err(err) => {
            debug!(error = %err, "Transport failure");
            RequestResult::failure(elapsed_ms(start), None, FailureReason::NetworkError)
        }
        Ok(response) => match classify_response(response.status, &response.body, policy, contract)
        {
            Ok(()) => RequestResult::success(elapsed_ms(start), response.status),
            Err(reason) => RequestResult::failure(elapsed_ms(start), Some(response.status), reason),
        },
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
