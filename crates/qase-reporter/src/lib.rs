//! Qase results reporter.
//!
//! Reads a `go test -json` event file, reduces it to one outcome per leaf
//! subtest, and records the outcomes as results in a Qase test run.
//!
//! # Flow
//!
//! 1. Decode every event line (any malformed line aborts before submission)
//! 2. Reduce events to outcomes ([`outcome::reduce`])
//! 3. Submit outcomes, retrying while the API answers 429
//!    ([`submit::submit_with_retry`])
//! 4. For `-head` runs, post failed tests to Slack
//!
//! # Usage
//!
//! ```bash
//! go test -json ./... > results.json
//! QASE_TEST_RUN_ID=123 QASE_AUTOMATION_TOKEN=... qase-reporter
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod outcome;
pub mod slack;
pub mod submit;

use crate::client::QaseClient;
use crate::config::Config;
use crate::errors::ReporterError;
use crate::slack::SlackNotifier;
use crate::submit::{submit_with_retry, SubmissionReport};
use common::poll::PollPolicy;
use tracing::{info, instrument};

/// Log filter used when `RUST_LOG` is unset. Covers the `qase.*` event
/// targets as well as the crate module paths.
pub const DEFAULT_LOG_FILTER: &str = "qase=info,qase_reporter=info,common=info";

/// Report the results file named by `config` into its run.
///
/// # Errors
///
/// Any decode, submission, timeout or notification failure aborts the run.
#[instrument(skip_all, fields(run_id = config.run_id))]
pub async fn run(config: &Config, policy: PollPolicy) -> Result<SubmissionReport, ReporterError> {
    let events = events::read_events(&config.results_file)?;
    let outcomes = outcome::reduce(&events);

    info!(
        target: "qase.reporter",
        events = events.len(),
        outcomes = outcomes.len(),
        results_file = %config.results_file.display(),
        "Reduced test events"
    );

    let client = QaseClient::from_config(config)?;
    let report = submit_with_retry(&client, &outcomes, config.run_id, policy).await?;

    info!(
        target: "qase.reporter",
        reported = report.reported,
        unfinished = report.unfinished,
        failed = report.failures.len(),
        "Submission complete"
    );

    if SlackNotifier::should_notify(&report.run_title) {
        match &config.slack_webhook {
            Some(webhook) => {
                let notifier = SlackNotifier::new(webhook.clone(), config.project_code.clone())?;
                notifier
                    .post_failures(config.run_id, &report.run_title, &report.failures)
                    .await?;
            }
            None => {
                info!(target: "qase.reporter", "SLACK_WEBHOOK not set, skipping notification");
            }
        }
    }

    Ok(report)
}
