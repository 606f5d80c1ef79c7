//! Job-status reporting back to the grid.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::config::Credentials;
use crate::report::types::ReportSummary;

/// Posts per-session pass/fail status back to the remote service. Reporting
/// is best-effort: callers log failures and keep going.
#[async_trait]
pub trait JobReporter: Send + Sync {
    async fn update_job(
        &self,
        job_id: &str,
        passed: bool,
        summary: Option<&ReportSummary>,
    ) -> Result<()>;
}

/// REST implementation against the grid's job API.
pub struct RestReporter {
    base_url: String,
    client: reqwest::Client,
    credentials: Credentials,
}

impl RestReporter {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url("https://saucelabs.com/rest/v1", credentials)
    }

    pub fn with_base_url(base_url: &str, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait]
impl JobReporter for RestReporter {
    async fn update_job(
        &self,
        job_id: &str,
        passed: bool,
        summary: Option<&ReportSummary>,
    ) -> Result<()> {
        let url = format!(
            "{}/{}/jobs/{}",
            self.base_url, self.credentials.user, job_id
        );

        // The job API rejects full reports; send the flat counts only.
        let counts = summary.map(|s| {
            json!({
                "total": s.total,
                "passed": s.passed,
                "failed": s.failed,
                "runtime": s.runtime_ms,
            })
        });
        let body = json!({
            "passed": passed,
            "custom-data": { "summary": counts },
        });

        self.client
            .put(&url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.key))
            .json(&body)
            .send()
            .await
            .context("Failed to send job status")?
            .error_for_status()
            .context("Job status update rejected")?;

        Ok(())
    }
}
