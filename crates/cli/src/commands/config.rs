// Config command - show the resolved configuration

use loadcheck_harness::config::LoadTestConfig;

use crate::output::{print_field, OutputFormat};

pub fn run(config: &LoadTestConfig, output: OutputFormat) -> anyhow::Result<()> {
    if !output.is_text() {
        return output.print_value(&config.to_json());
    }

    print_field("Endpoint", &config.target.url);
    print_field("Method", config.target.method.as_str());
    print_field("Body", &config.target.body.to_string());
    for (name, value) in &config.target.headers {
        print_field("Header", &format!("{name}: {value}"));
    }
    print_field("Virtual users", &config.virtual_users.to_string());
    print_field("Iterations per user", &config.iterations_per_user.to_string());
    print_field("Total requests", &config.total_requests().to_string());
    print_field(
        "Max failure rate",
        &format!("{:.2}%", config.thresholds.max_failure_rate * 100.0),
    );
    print_field(
        "Max P95 latency",
        &format!("{} ms", config.thresholds.max_p95_latency_ms),
    );
    print_field(
        "Non-2xx is failure",
        &config.status_policy.treat_non_2xx_as_failure.to_string(),
    );
    print_field(
        "Min matched docs",
        &config.contract.min_matched_docs.to_string(),
    );
    print_field(
        "Run timeout",
        &format!("{} ms", config.run_timeout.as_millis()),
    );
    print_field(
        "Request timeout",
        &format!("{} ms", config.request_timeout.as_millis()),
    );

    Ok(())
}
