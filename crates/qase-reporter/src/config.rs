use common::secret::{non_empty_secret, SecretString};
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.qase.io/v1";
pub const DEFAULT_PROJECT_CODE: &str = "RM";
pub const DEFAULT_ROOT_SUITE_ID: i64 = 554;
pub const DEFAULT_RESULTS_FILE: &str = "results.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub run_id: i64,
    pub api_token: SecretString,
    pub api_url: String,
    pub project_code: String,
    /// Parent for suites created on demand.
    pub root_suite_id: i64,
    pub results_file: PathBuf,
    pub slack_webhook: Option<SecretString>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no test run is configured.
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_vars(&utf8_vars(env::vars_os()))
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Option<Self>, ConfigError> {
        let run_id = match vars.get("QASE_TEST_RUN_ID").map(|v| v.trim()) {
            None | Some("") => return Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "QASE_TEST_RUN_ID".to_string(),
                    value: raw.to_string(),
                })?,
        };

        let api_token = non_empty_secret(vars.get("QASE_AUTOMATION_TOKEN"))
            .ok_or_else(|| ConfigError::MissingEnvVar("QASE_AUTOMATION_TOKEN".to_string()))?;

        let api_url = vars
            .get("QASE_API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let project_code = vars
            .get("QASE_PROJECT_CODE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROJECT_CODE.to_string());

        let root_suite_id = match vars.get("QASE_ROOT_SUITE_ID") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "QASE_ROOT_SUITE_ID".to_string(),
                    value: raw.clone(),
                })?,
            None => DEFAULT_ROOT_SUITE_ID,
        };

        let results_file = vars
            .get("RESULTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_FILE));

        let slack_webhook = non_empty_secret(vars.get("SLACK_WEBHOOK"));

        Ok(Some(Config {
            run_id,
            api_token,
            api_url,
            project_code,
            root_suite_id,
            results_file,
            slack_webhook,
        }))
    }
}

/// Keep the variables whose name and value are both valid UTF-8.
fn utf8_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}
