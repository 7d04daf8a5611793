//! Report generation
//!
//! Renders a completed run as a human-readable text summary, a
//! machine-readable JSON summary and a standalone HTML page, and writes
//! them as artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use minijinja::{context, Environment};
use serde::Serialize;
use serde_json::Value;

use crate::config::LoadTestConfig;
use crate::error::HarnessError;
use crate::metrics::{round2, Summary};
use crate::sla::{SlaThresholds, SlaViolation};

pub const DEFAULT_REPORT_DIR: &str = "target/load-test-reports";

/// Errors while rendering or writing report artifacts
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render report template: {0}")]
    Template(#[from] minijinja::Error),
}

/// Configuration for report generation
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Output directory for reports
    pub output_dir: PathBuf,
    /// Report title
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            title: "Load Test Report".to_string(),
        }
    }
}

impl ReportConfig {
    /// Read `LOAD_REPORT_DIR`, falling back to the default directory
    pub fn from_env() -> Self {
        let output_dir = std::env::var("LOAD_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORT_DIR));

        Self {
            output_dir,
            ..Default::default()
        }
    }
}

/// A completed run together with the settings it was judged against
#[derive(Debug, Clone)]
pub struct LoadTestReport {
    pub url: String,
    pub method: String,
    pub body: Value,
    pub concurrency: u32,
    pub iterations_per_user: u32,
    pub summary: Summary,
    pub thresholds: SlaThresholds,
    pub fail_on_non_2xx: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonTarget<'a> {
    url: &'a str,
    method: &'a str,
    body: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonThresholds {
    max_failure_rate: f64,
    p95_threshold_ms: u64,
    fail_on_non_2xx: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary<'a> {
    target: JsonTarget<'a>,
    concurrency: u32,
    iterations_per_worker: u32,
    total_requests: u64,
    success_requests: u64,
    failed_requests: u64,
    /// Percent, 2 decimals
    failure_rate: f64,
    avg_latency_ms: u64,
    p95_latency_ms: u64,
    min_latency_ms: u64,
    max_latency_ms: u64,
    throughput_rps: f64,
    duration_ms: u64,
    status_counts: &'a std::collections::BTreeMap<String, u64>,
    failure_reasons: &'a std::collections::BTreeMap<String, u64>,
    thresholds: JsonThresholds,
    generated_at: String,
}

impl LoadTestReport {
    pub fn new(config: &LoadTestConfig, summary: Summary) -> Self {
        Self {
            url: config.target.url.clone(),
            method: config.target.method.as_str().to_string(),
            body: config.target.body.clone(),
            concurrency: config.virtual_users,
            iterations_per_user: config.iterations_per_user,
            summary,
            thresholds: config.thresholds,
            fail_on_non_2xx: config.status_policy.treat_non_2xx_as_failure,
            generated_at: Utc::now(),
        }
    }

    /// Check the summary against the thresholds
    pub fn evaluate(&self) -> Result<(), Vec<SlaViolation>> {
        self.thresholds.evaluate(&self.summary)
    }

    /// Like [`evaluate`](Self::evaluate), as a run-level error
    pub fn assert_sla(&self) -> Result<(), HarnessError> {
        self.evaluate().map_err(|violations| {
            for violation in &violations {
                tracing::warn!(%violation, "SLA violation");
            }
            HarnessError::SlaViolated(violations)
        })
    }

    pub fn passed(&self) -> bool {
        self.evaluate().is_ok()
    }

    /// Human-readable summary block
    pub fn to_text(&self) -> String {
        let s = &self.summary;
        [
            "Load Test Result Summary".to_string(),
            format!("Endpoint: {}", self.url),
            format!("Method: {}", self.method),
            format!("Concurrency (virtual users): {}", self.concurrency),
            format!("Iterations per user: {}", self.iterations_per_user),
            format!("Total requests: {}", s.total_requests),
            format!("Successful requests: {}", s.success_requests),
            format!("Failed requests: {}", s.failed_requests),
            format!(
                "Failure rate: {:.2}% (allowed <= {:.2}%)",
                s.failure_rate * 100.0,
                self.thresholds.max_failure_rate * 100.0
            ),
            format!("Average latency: {} ms", s.avg_latency_ms),
            format!(
                "P95 latency: {} ms (allowed <= {} ms)",
                s.p95_latency_ms, self.thresholds.max_p95_latency_ms
            ),
            format!("Throughput: {} req/sec", s.throughput_rps),
            format!("Status counts: {}", compact_json(&s.status_counts)),
            format!("Failure reasons: {}", compact_json(&s.failure_reasons)),
        ]
        .join("\n")
    }

    /// Machine-readable summary
    pub fn to_json_value(&self) -> Value {
        let s = &self.summary;
        let summary = JsonSummary {
            target: JsonTarget {
                url: &self.url,
                method: &self.method,
                body: &self.body,
            },
            concurrency: self.concurrency,
            iterations_per_worker: self.iterations_per_user,
            total_requests: s.total_requests,
            success_requests: s.success_requests,
            failed_requests: s.failed_requests,
            failure_rate: s.failure_rate_percent(),
            avg_latency_ms: s.avg_latency_ms,
            p95_latency_ms: s.p95_latency_ms,
            min_latency_ms: s.min_latency_ms,
            max_latency_ms: s.max_latency_ms,
            throughput_rps: s.throughput_rps,
            duration_ms: s.duration_ms,
            status_counts: &s.status_counts,
            failure_reasons: &s.failure_reasons,
            thresholds: JsonThresholds {
                max_failure_rate: self.thresholds.max_failure_rate,
                p95_threshold_ms: self.thresholds.max_p95_latency_ms,
                fail_on_non_2xx: self.fail_on_non_2xx,
            },
            generated_at: self.generated_at.to_rfc3339(),
        };

        // Only plain structs and string-keyed maps, serialization cannot fail
        serde_json::to_value(summary).unwrap_or(Value::Null)
    }

    pub fn to_json_pretty(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&self.to_json_value())?)
    }

    /// Standalone HTML page
    pub fn to_html(&self, title: &str) -> Result<String, ReportError> {
        let mut env = Environment::new();
        // The .html name turns on auto-escaping
        env.add_template("report.html", REPORT_TEMPLATE)?;
        let template = env.get_template("report.html")?;

        let s = &self.summary;
        let violations: Vec<String> = match self.evaluate() {
            Ok(()) => Vec::new(),
            Err(violations) => violations.iter().map(ToString::to_string).collect(),
        };

        Ok(template.render(context! {
            title => title,
            url => self.url,
            method => self.method,
            body => compact_json(&self.body),
            generated_at => self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            concurrency => self.concurrency,
            iterations => self.iterations_per_user,
            total_requests => s.total_requests,
            success_requests => s.success_requests,
            failed_requests => s.failed_requests,
            failure_rate_percent => format!("{:.2}", s.failure_rate * 100.0),
            allowed_failure_rate_percent => format!("{:.2}", self.thresholds.max_failure_rate * 100.0),
            avg_latency_ms => s.avg_latency_ms,
            p95_latency_ms => s.p95_latency_ms,
            allowed_p95_ms => self.thresholds.max_p95_latency_ms,
            min_latency_ms => s.min_latency_ms,
            max_latency_ms => s.max_latency_ms,
            throughput_rps => round2(s.throughput_rps),
            duration_secs => format!("{:.2}", s.duration_ms as f64 / 1000.0),
            status_counts => s.status_counts,
            failure_reasons => s.failure_reasons,
            fail_on_non_2xx => self.fail_on_non_2xx,
            passed => violations.is_empty(),
            violations => violations,
        })?)
    }
}

fn compact_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Paths of the artifacts written for one run
#[derive(Debug, Clone)]
pub struct ReportArtifacts {
    pub text: PathBuf,
    pub json: PathBuf,
    pub html: PathBuf,
}

/// Writes report artifacts to the configured directory
pub struct ReportWriter {
    config: ReportConfig,
}

impl ReportWriter {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Write text, JSON and HTML artifacts, returning their absolute paths
    pub fn write(&self, report: &LoadTestReport) -> Result<ReportArtifacts, ReportError> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir)?;

        let stem = format!(
            "load_test_{}",
            report.generated_at.format("%Y%m%d_%H%M%S_%3f")
        );

        let text = write_artifact(output_dir, &stem, "txt", &report.to_text())?;
        let json = write_artifact(output_dir, &stem, "json", &report.to_json_pretty()?)?;
        let html = write_artifact(
            output_dir,
            &stem,
            "html",
            &report.to_html(&self.config.title)?,
        )?;

        tracing::info!(
            text = %text.display(),
            json = %json.display(),
            html = %html.display(),
            "Report artifacts written"
        );

        Ok(ReportArtifacts { text, json, html })
    }
}

fn write_artifact(
    dir: &Path,
    stem: &str,
    extension: &str,
    contents: &str,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(format!("{stem}.{extension}"));
    fs::write(&path, contents)?;

    // Return absolute path for clickable terminal links
    Ok(path.canonicalize().unwrap_or(path))
}

const REPORT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title }} - {{ method }} {{ url }}</title>
    <style>
        :root {
            --bg-primary: #1a1a2e;
            --bg-secondary: #16213e;
            --bg-card: #1f2940;
            --text-primary: #eee;
            --text-secondary: #888;
            --success: #00d26a;
            --danger: #e74c3c;
        }

        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }

        .container {
            max-width: 1200px;
            margin: 0 auto;
            padding: 20px;
        }

        header {
            background: var(--bg-secondary);
            padding: 30px;
            margin-bottom: 30px;
            border-radius: 10px;
        }

        h1 {
            font-size: 2rem;
            margin-bottom: 10px;
        }

        h2 {
            font-size: 1.5rem;
            margin-bottom: 15px;
        }

        .subtitle {
            color: var(--text-secondary);
            font-size: 1.1rem;
        }

        .verdict {
            display: inline-block;
            margin-top: 15px;
            padding: 4px 14px;
            border-radius: 6px;
            font-weight: bold;
        }

        .verdict.pass { background: var(--success); color: #000; }
        .verdict.fail { background: var(--danger); }

        .stats-grid {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
            gap: 20px;
            margin-bottom: 30px;
        }

        .stat-card {
            background: var(--bg-card);
            padding: 20px;
            border-radius: 10px;
            text-align: center;
        }

        .stat-value {
            font-size: 2rem;
            font-weight: bold;
        }

        .stat-label {
            color: var(--text-secondary);
        }

        section {
            background: var(--bg-card);
            padding: 20px;
            border-radius: 10px;
            margin-bottom: 30px;
        }

        table {
            width: 100%;
            border-collapse: collapse;
        }

        th, td {
            text-align: left;
            padding: 8px;
            border-bottom: 1px solid var(--bg-secondary);
        }

        code {
            color: var(--text-secondary);
        }
    </style>
</head>
<body>
<div class="container">
    <header>
        <h1>{{ title }}</h1>
        <div class="subtitle">{{ method }} {{ url }} &middot; body <code>{{ body }}</code></div>
        <div class="subtitle">Generated {{ generated_at }} &middot; {{ concurrency }} virtual users &times; {{ iterations }} iterations &middot; {{ duration_secs }}s</div>
        {% if passed %}
        <div class="verdict pass">SLA PASSED</div>
        {% else %}
        <div class="verdict fail">SLA FAILED</div>
        {% endif %}
    </header>

    <div class="stats-grid">
        <div class="stat-card">
            <div class="stat-value">{{ total_requests }}</div>
            <div class="stat-label">Total requests</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ success_requests }}</div>
            <div class="stat-label">Successful</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ failed_requests }}</div>
            <div class="stat-label">Failed</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ failure_rate_percent }}%</div>
            <div class="stat-label">Failure rate (allowed &le; {{ allowed_failure_rate_percent }}%)</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ p95_latency_ms }} ms</div>
            <div class="stat-label">P95 latency (allowed &le; {{ allowed_p95_ms }} ms)</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ avg_latency_ms }} ms</div>
            <div class="stat-label">Average latency</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ throughput_rps }}</div>
            <div class="stat-label">Requests / sec</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{{ min_latency_ms }} / {{ max_latency_ms }} ms</div>
            <div class="stat-label">Min / max latency</div>
        </div>
    </div>

    {% if violations %}
    <section>
        <h2>SLA violations</h2>
        <ul>
        {% for violation in violations %}
            <li>{{ violation }}</li>
        {% endfor %}
        </ul>
    </section>
    {% endif %}

    <section>
        <h2>Status breakdown</h2>
        <table>
            <tr><th>Status</th><th>Count</th></tr>
            {% for status, count in status_counts|items %}
            <tr><td>{{ status }}</td><td>{{ count }}</td></tr>
            {% endfor %}
        </table>
    </section>

    <section>
        <h2>Failure reasons</h2>
        {% if failure_reasons %}
        <table>
            <tr><th>Reason</th><th>Count</th></tr>
            {% for reason, count in failure_reasons|items %}
            <tr><td>{{ reason }}</td><td>{{ count }}</td></tr>
            {% endfor %}
        </table>
        {% else %}
        <p>No failed requests.</p>
        {% endif %}
        <p class="subtitle">Non-2xx responses count as failures: {{ fail_on_non_2xx }}</p>
    </section>
</div>
</body>
</html>
"##;
