//! HTTP client for the Qase test case management API.
//!
//! Every request carries the project API token in the `Token` header.
//! Responses are wrapped in `{"status": bool, "result": ...}` envelopes;
//! a `false` status is surfaced as [`QaseError::ApiRejected`].

use crate::config::Config;
use crate::errors::QaseError;
use crate::models::{
    ApiResponse, CaseCreate, CaseIndex, EntityPage, IdResult, ResultCreate, Run, Suite,
    SuiteCreate, TestCase,
};
use common::redact::sanitize_error_body;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Cases requested per page when building the case index.
pub const CASE_PAGE_SIZE: i64 = 100;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one Qase project.
pub struct QaseClient {
    base_url: String,
    project_code: String,
    root_suite_id: i64,
    token: SecretString,
    http_client: Client,
}

impl std::fmt::Debug for QaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaseClient")
            .field("base_url", &self.base_url)
            .field("project_code", &self.project_code)
            .field("root_suite_id", &self.root_suite_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl QaseClient {
    /// Create a client for the given API base URL and project.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        project_code: impl Into<String>,
        root_suite_id: i64,
        token: SecretString,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(DEFAULT_HTTP_TIMEOUT).build()?;

        Ok(Self {
            base_url: base_url.into(),
            project_code: project_code.into(),
            root_suite_id,
            token,
            http_client,
        })
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.api_url.clone(),
            config.project_code.clone(),
            config.root_suite_id,
            config.api_token.clone(),
        )
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of test cases.
    ///
    /// # Endpoint
    ///
    /// `GET /case/{project}?limit={limit}&offset={offset}`
    pub async fn list_cases(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<EntityPage<TestCase>, QaseError> {
        let url = format!("{}/case/{}", self.base_url, self.project_code);

        let response = self
            .http_client
            .get(&url)
            .header("Token", self.token.expose_secret())
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Page through every case in the project and index it by lookup name.
    ///
    /// Paging stops at the first page that returns no cases.
    #[instrument(skip(self), fields(project = %self.project_code))]
    pub async fn fetch_case_index(&self) -> Result<CaseIndex, QaseError> {
        let mut cases = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_cases(offset, CASE_PAGE_SIZE).await?;
            if page.count == 0 || page.entities.is_empty() {
                break;
            }
            offset += page.count;
            cases.extend(page.entities);
        }

        debug!(target: "qase.client", cases = cases.len(), "Fetched case index");
        Ok(CaseIndex::from_cases(&cases))
    }

    /// Search suites by title.
    ///
    /// # Endpoint
    ///
    /// `GET /suite/{project}?search={title}`
    pub async fn search_suites(&self, title: &str) -> Result<Vec<Suite>, QaseError> {
        let url = format!("{}/suite/{}", self.base_url, self.project_code);

        let response = self
            .http_client
            .get(&url)
            .header("Token", self.token.expose_secret())
            .query(&[("search", title)])
            .send()
            .await?;

        let page: EntityPage<Suite> = self.handle_response(response).await?;
        Ok(page.entities)
    }

    /// Create a suite under `parent_id`.
    ///
    /// # Endpoint
    ///
    /// `POST /suite/{project}`
    pub async fn create_suite(&self, title: &str, parent_id: i64) -> Result<i64, QaseError> {
        let url = format!("{}/suite/{}", self.base_url, self.project_code);
        let body = SuiteCreate {
            title: title.to_string(),
            parent_id,
        };

        let response = self
            .http_client
            .post(&url)
            .header("Token", self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let created: IdResult = self.handle_response(response).await?;
        debug!(target: "qase.client", suite = %title, suite_id = created.id, parent_id, "Created suite");
        Ok(created.id)
    }

    /// Resolve the suite chain for `suite_path`, creating missing suites.
    ///
    /// Each segment is searched by exact title; the resolved ID becomes the
    /// parent of the next segment. An empty path resolves to the root suite.
    #[instrument(skip(self))]
    pub async fn ensure_suite_path(&self, suite_path: &[String]) -> Result<i64, QaseError> {
        let mut parent_id = self.root_suite_id;

        for title in suite_path {
            let existing = self
                .search_suites(title)
                .await?
                .into_iter()
                .find(|suite| &suite.title == title);

            parent_id = match existing {
                Some(suite) => suite.id,
                None => self.create_suite(title, parent_id).await?,
            };
        }

        Ok(parent_id)
    }

    /// Create an automated case in `suite_id`.
    ///
    /// # Endpoint
    ///
    /// `POST /case/{project}`
    pub async fn create_case(&self, title: &str, suite_id: i64) -> Result<i64, QaseError> {
        let url = format!("{}/case/{}", self.base_url, self.project_code);

        let response = self
            .http_client
            .post(&url)
            .header("Token", self.token.expose_secret())
            .json(&CaseCreate::automated(title, suite_id))
            .send()
            .await?;

        let created: IdResult = self.handle_response(response).await?;
        Ok(created.id)
    }

    /// Record a result in a run.
    ///
    /// # Endpoint
    ///
    /// `POST /result/{project}/{run_id}`
    pub async fn create_result(&self, run_id: i64, result: &ResultCreate) -> Result<(), QaseError> {
        let url = format!("{}/result/{}/{}", self.base_url, self.project_code, run_id);

        let response = self
            .http_client
            .post(&url)
            .header("Token", self.token.expose_secret())
            .json(result)
            .send()
            .await?;

        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }

    /// Fetch a run.
    ///
    /// # Endpoint
    ///
    /// `GET /run/{project}/{run_id}`
    pub async fn get_run(&self, run_id: i64) -> Result<Run, QaseError> {
        let url = format!("{}/run/{}/{}", self.base_url, self.project_code, run_id);

        let response = self
            .http_client
            .get(&url)
            .header("Token", self.token.expose_secret())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Check status, unwrap the envelope and parse the result.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, QaseError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QaseError::RequestFailed {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        let bytes = response.bytes().await?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;

        if !envelope.status {
            return Err(QaseError::ApiRejected(
                envelope
                    .error_message
                    .unwrap_or_else(|| "status false without message".to_string()),
            ));
        }

        envelope
            .result
            .ok_or_else(|| QaseError::ApiRejected("response has no result".to_string()))
    }
}
