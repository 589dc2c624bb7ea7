//! Submission of finalized outcomes to the case management service.
//!
//! One attempt resolves (or creates) a case per outcome and records a result
//! in the run. Attempts are repeated under a [`PollPolicy`] only while the
//! service answers with HTTP 429; any other error ends the loop at once.
//! Outcomes recorded by an earlier attempt are not recorded again.

use crate::client::QaseClient;
use crate::errors::{QaseError, ReporterError, SubmissionError};
use crate::models::{CaseIndex, ResultCreate};
use crate::outcome::{Status, TestOutcome};
use common::poll::{poll_until, PollError, PollPolicy};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Production retry policy: every 5s for up to 10 minutes.
pub const SUBMIT_POLICY: PollPolicy =
    PollPolicy::new(Duration::from_secs(5), Duration::from_secs(600));

/// Case management operations used by a submission (enables mocking).
#[async_trait::async_trait]
pub trait CaseManagement: Send + Sync {
    /// Index of every existing case by lookup name.
    async fn case_index(&self) -> Result<CaseIndex, QaseError>;

    /// Create a case named `name` under the suite chain `suite_path`.
    async fn create_case(&self, name: &str, suite_path: &[String]) -> Result<i64, QaseError>;

    /// Record one result in a run.
    async fn report_result(&self, run_id: i64, result: &ResultCreate) -> Result<(), QaseError>;

    /// Title of a run.
    async fn run_title(&self, run_id: i64) -> Result<String, QaseError>;
}

#[async_trait::async_trait]
impl CaseManagement for QaseClient {
    async fn case_index(&self) -> Result<CaseIndex, QaseError> {
        self.fetch_case_index().await
    }

    async fn create_case(&self, name: &str, suite_path: &[String]) -> Result<i64, QaseError> {
        let suite_id = self.ensure_suite_path(suite_path).await?;
        QaseClient::create_case(self, name, suite_id).await
    }

    async fn report_result(&self, run_id: i64, result: &ResultCreate) -> Result<(), QaseError> {
        self.create_result(run_id, result).await
    }

    async fn run_title(&self, run_id: i64) -> Result<String, QaseError> {
        Ok(self.get_run(run_id).await?.title)
    }
}

/// What a completed submission did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Results recorded in the run.
    pub reported: usize,
    /// Outcomes left out because they never finished.
    pub unfinished: usize,
    /// Failed outcomes, in key order.
    pub failures: Vec<TestOutcome>,
    pub run_title: String,
}

/// Progress carried across attempts.
#[derive(Debug, Default)]
struct SubmissionState {
    done: HashSet<String>,
    report: SubmissionReport,
    run_title: Option<String>,
}

/// Run one submission attempt, skipping outcomes already handled.
async fn submit_attempt<C: CaseManagement + ?Sized>(
    backend: &C,
    outcomes: &BTreeMap<String, TestOutcome>,
    run_id: i64,
    state: &mut SubmissionState,
) -> Result<(), SubmissionError> {
    let mut index = backend.case_index().await?;

    for (path, outcome) in outcomes {
        if state.done.contains(path) {
            continue;
        }

        let Some(status) = outcome.status else {
            warn!(target: "qase.submit", test = %path, "Test never finished, not reporting");
            state.report.unfinished += 1;
            state.done.insert(path.clone());
            continue;
        };

        let time = outcome.elapsed_seconds().map_err(|e| {
            SubmissionError::Fatal(format!(
                "invalid elapsed time {:?} for {path}: {e}",
                outcome.elapsed
            ))
        })?;

        let case_id = match index.lookup(&outcome.name) {
            Some(id) => id,
            None => {
                let id = backend.create_case(&outcome.name, &outcome.suite).await?;
                info!(target: "qase.submit", test = %path, case_id = id, "Created test case");
                index.insert(&outcome.name, id);
                id
            }
        };

        let result = ResultCreate {
            case_id,
            status: status.result_status().to_string(),
            comment: outcome.stack_trace.clone(),
            time,
        };
        backend.report_result(run_id, &result).await?;

        state.done.insert(path.clone());
        state.report.reported += 1;
        if status == Status::Fail {
            state.report.failures.push(outcome.clone());
        }
    }

    if state.run_title.is_none() {
        state.run_title = Some(backend.run_title(run_id).await?);
    }

    Ok(())
}

/// Submit every outcome, retrying while rate limited.
///
/// # Errors
///
/// - `ReporterError::Submission` - a non-retryable failure ended the loop
/// - `ReporterError::Timeout` - still rate limited when the policy expired
#[instrument(skip_all, fields(run_id = run_id, outcomes = outcomes.len()))]
pub async fn submit_with_retry<C: CaseManagement + ?Sized>(
    backend: &C,
    outcomes: &BTreeMap<String, TestOutcome>,
    run_id: i64,
    policy: PollPolicy,
) -> Result<SubmissionReport, ReporterError> {
    let state = Mutex::new(SubmissionState::default());
    let shared = &state;

    let result = poll_until(policy, move || async move {
        let mut state = shared.lock().await;
        match submit_attempt(backend, outcomes, run_id, &mut state).await {
            Ok(()) => {
                info!(target: "qase.submit", run_id, "Reported results successfully");
                Ok(true)
            }
            Err(SubmissionError::RateLimited) => {
                warn!(target: "qase.submit", run_id, "429 Too Many Requests, retrying");
                Ok(false)
            }
            Err(e) => {
                error!(target: "qase.submit", run_id, error = %e, "Non-retryable submission error");
                Err(e)
            }
        }
    })
    .await;

    match result {
        Ok(()) => {
            let state = state.into_inner();
            let mut report = state.report;
            report.run_title = state.run_title.unwrap_or_default();
            Ok(report)
        }
        Err(PollError::Condition(e)) => Err(ReporterError::Submission(e)),
        Err(PollError::Timeout(timeout)) => Err(ReporterError::Timeout(timeout)),
    }
}

/// Mock case management backend for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scripted failure for the next matching call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        RateLimited,
        ServerError,
    }

    impl Fault {
        fn to_error(self) -> QaseError {
            match self {
                Fault::RateLimited => QaseError::RequestFailed {
                    status: 429,
                    body: "Too Many Requests".to_string(),
                },
                Fault::ServerError => QaseError::RequestFailed {
                    status: 500,
                    body: "Internal Server Error".to_string(),
                },
            }
        }
    }

    /// In-memory backend that records every call.
    #[derive(Default)]
    pub struct MockCaseManagement {
        cases: StdMutex<CaseIndex>,
        next_case_id: AtomicUsize,
        run_title: String,
        report_faults: StdMutex<VecDeque<Fault>>,
        results: StdMutex<Vec<(i64, ResultCreate)>>,
        created: StdMutex<Vec<(String, Vec<String>)>>,
        index_calls: AtomicUsize,
        report_calls: AtomicUsize,
    }

    impl MockCaseManagement {
        /// Backend with the given existing cases and run title.
        pub fn new(cases: &[(&str, i64)], run_title: &str) -> Self {
            let mut index = CaseIndex::default();
            for (name, id) in cases {
                index.insert(name, *id);
            }
            Self {
                cases: StdMutex::new(index),
                next_case_id: AtomicUsize::new(1000),
                run_title: run_title.to_string(),
                ..Self::default()
            }
        }

        /// Fail upcoming `report_result` calls with these faults, in order.
        #[must_use]
        pub fn with_report_faults(self, faults: Vec<Fault>) -> Self {
            if let Ok(mut queue) = self.report_faults.lock() {
                queue.extend(faults);
            }
            self
        }

        /// Results recorded so far.
        pub fn results(&self) -> Vec<(i64, ResultCreate)> {
            self.results.lock().map(|r| r.clone()).unwrap_or_default()
        }

        /// Cases created so far as `(name, suite_path)`.
        pub fn created(&self) -> Vec<(String, Vec<String>)> {
            self.created.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn index_calls(&self) -> usize {
            self.index_calls.load(Ordering::SeqCst)
        }

        pub fn report_calls(&self) -> usize {
            self.report_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CaseManagement for MockCaseManagement {
        async fn case_index(&self) -> Result<CaseIndex, QaseError> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.cases.lock().map(|c| c.clone()).unwrap_or_default())
        }

        async fn create_case(&self, name: &str, suite_path: &[String]) -> Result<i64, QaseError> {
            #[allow(clippy::cast_possible_wrap)]
            let id = self.next_case_id.fetch_add(1, Ordering::SeqCst) as i64;
            if let Ok(mut cases) = self.cases.lock() {
                cases.insert(name, id);
            }
            if let Ok(mut created) = self.created.lock() {
                created.push((name.to_string(), suite_path.to_vec()));
            }
            Ok(id)
        }

        async fn report_result(&self, run_id: i64, result: &ResultCreate) -> Result<(), QaseError> {
            self.report_calls.fetch_add(1, Ordering::SeqCst);
            let fault = self.report_faults.lock().ok().and_then(|mut q| q.pop_front());
            if let Some(fault) = fault {
                return Err(fault.to_error());
            }
            if let Ok(mut results) = self.results.lock() {
                results.push((run_id, result.clone()));
            }
            Ok(())
        }

        async fn run_title(&self, _run_id: i64) -> Result<String, QaseError> {
            Ok(self.run_title.clone())
        }
    }
}
