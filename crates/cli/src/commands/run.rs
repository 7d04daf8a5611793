// Run command - execute the load test and gate on the SLA

use std::sync::Arc;

use anyhow::Context;
use loadcheck_harness::prelude::*;

use crate::output::OutputFormat;

pub async fn run(
    config: LoadTestConfig,
    report_config: Option<ReportConfig>,
    output: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let transport =
        ReqwestTransport::new(config.request_timeout).context("Failed to build HTTP client")?;
    let runner = LoadTestRunner::new(config, Arc::new(transport));

    let report = runner.run().await.context("Load test did not complete")?;

    // Artifacts are for observability, failing to write them does not change the verdict
    if let Some(report_config) = report_config {
        match ReportWriter::new(report_config).write(&report) {
            Ok(artifacts) => {
                if output.is_text() && !quiet {
                    println!("Text report:  {}", artifacts.text.display());
                    println!("JSON report:  {}", artifacts.json.display());
                    println!("HTML report:  {}", artifacts.html.display());
                    println!();
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to write report artifacts"),
        }
    }

    if output.is_text() {
        println!("{}", report.to_text());
    } else {
        output.print_value(&report.to_json_value())?;
    }

    report.assert_sla()?;

    if output.is_text() && !quiet {
        println!();
        println!("SLA passed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_response(docs: usize) -> Value {
        let matched: Vec<Value> = (1..=docs).map(|id| json!({ "id": id })).collect();
        json!({
            "data": { "summary": "ok", "matched_docs": matched },
            "message": "Search completed successfully",
            "success": true,
            "status": 200,
        })
    }

    async fn backend(docs: usize) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_response(docs)))
            .mount(&server)
            .await;
        server
    }

    fn config_for(server: &MockServer) -> LoadTestConfig {
        LoadTestConfig {
            target: TargetConfig::new(format!("{}/generate", server.uri()), "a"),
            virtual_users: 50,
            iterations_per_user: 1,
            ..LoadTestConfig::default()
        }
    }

    /// A regular file where the report directory should be, so artifact writing fails
    fn unwritable_report_config(name: &str) -> ReportConfig {
        let blocker =
            std::env::temp_dir().join(format!("loadcheck-{name}-{}", std::process::id()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        ReportConfig {
            output_dir: blocker,
            ..ReportConfig::default()
        }
    }

    fn is_sla_violation(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::SlaViolated(_))
        )
    }

    #[tokio::test]
    async fn test_healthy_backend_passes() {
        let server = backend(10).await;

        run(config_for(&server), None, OutputFormat::Text, true)
            .await
            .expect("SLA should pass");
    }

    #[tokio::test]
    async fn test_short_result_list_fails_the_run() {
        let server = backend(5).await;

        let err = run(config_for(&server), None, OutputFormat::Json, true)
            .await
            .unwrap_err();
        assert!(is_sla_violation(&err), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn test_report_write_failure_keeps_passing_verdict() {
        let server = backend(10).await;
        let report_config = unwritable_report_config("report-pass");

        let result = run(
            config_for(&server),
            Some(report_config.clone()),
            OutputFormat::Text,
            false,
        )
        .await;

        std::fs::remove_file(&report_config.output_dir).ok();
        result.expect("artifact failure must not fail the run");
    }

    #[tokio::test]
    async fn test_report_write_failure_keeps_failing_verdict() {
        let server = backend(5).await;
        let report_config = unwritable_report_config("report-fail");

        let result = run(
            config_for(&server),
            Some(report_config.clone()),
            OutputFormat::Text,
            false,
        )
        .await;

        std::fs::remove_file(&report_config.output_dir).ok();
        let err = result.unwrap_err();
        assert!(is_sla_violation(&err), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn test_invalid_concurrency_is_a_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_response(10)))
            .expect(0)
            .mount(&server)
            .await;

        let config = LoadTestConfig {
            virtual_users: 10,
            ..config_for(&server)
        };
        let err = run(config, None, OutputFormat::Text, true)
            .await
            .unwrap_err();
        assert!(
            matches!(err.downcast_ref::<HarnessError>(), Some(e) if e.is_config()),
            "unexpected error: {err:#}"
        );
    }
}
