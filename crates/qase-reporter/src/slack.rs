//! Slack notification of failed tests for head-branch runs.

use crate::errors::NotifyError;
use crate::outcome::TestOutcome;
use common::redact::sanitize_error_body;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{info, instrument};

/// Run titles containing this marker are announced in Slack.
pub const HEAD_RUN_MARKER: &str = "-head";

/// Base URL of the case management web UI.
pub const DASHBOARD_BASE_URL: &str = "https://app.qase.io";

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// Posts messages to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook: SecretString,
    project_code: String,
    http_client: Client,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("webhook", &"[REDACTED]")
            .field("project_code", &self.project_code)
            .finish()
    }
}

impl SlackNotifier {
    /// Create a notifier for `webhook`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(webhook: SecretString, project_code: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            webhook,
            project_code: project_code.into(),
            http_client,
        })
    }

    /// Whether a run with this title should be announced.
    pub fn should_notify(run_title: &str) -> bool {
        run_title.contains(HEAD_RUN_MARKER)
    }

    /// Post the failed tests of a run.
    #[instrument(skip(self, failures), fields(failures = failures.len()))]
    pub async fn post_failures(
        &self,
        run_id: i64,
        run_title: &str,
        failures: &[TestOutcome],
    ) -> Result<(), NotifyError> {
        let text = build_message(&self.project_code, run_id, run_title, failures);

        let response = self
            .http_client
            .post(self.webhook.expose_secret())
            .json(&SlackMessage { text: &text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::RequestFailed {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        info!(target: "qase.slack", run_id, "Posted run summary to Slack");
        Ok(())
    }
}

/// Render the Slack message text for a run.
pub fn build_message(
    project_code: &str,
    run_id: i64,
    run_title: &str,
    failures: &[TestOutcome],
) -> String {
    let link = format!("{DASHBOARD_BASE_URL}/run/{project_code}/dashboard/{run_id}");
    let mut text = format!("*{run_title}* (<{link}|run {run_id}>)\n");

    if failures.is_empty() {
        text.push_str("All reported tests passed.");
        return text;
    }

    let _ = writeln!(text, "{} failed test(s):", failures.len());
    for failure in failures {
        let _ = writeln!(text, "• {}", failure.full_name());
    }
    text
}
