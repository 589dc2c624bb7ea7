//! Wire types for the Qase v1 REST API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Custom field holding the automation test name a case is matched by.
pub const AUTOMATION_TEST_NAME_FIELD_ID: i64 = 15;

/// Custom field recording where a case came from.
pub const TEST_SOURCE_FIELD_ID: i64 = 14;

/// Value written to [`TEST_SOURCE_FIELD_ID`] on created cases.
pub const TEST_SOURCE: &str = "GoValidation";

/// Qase `automation` value for "automated".
pub const AUTOMATION_AUTOMATED: i32 = 2;

/// Envelope around every API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub status: bool,

    pub result: Option<T>,

    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
pub struct EntityPage<T> {
    #[serde(default)]
    pub total: i64,

    pub count: i64,

    #[serde(default = "Vec::new")]
    pub entities: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomFieldValue {
    pub id: i64,

    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub id: i64,

    pub title: String,

    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

impl TestCase {
    /// Automation test name custom field, if set and non-empty.
    pub fn automation_test_name(&self) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|field| field.id == AUTOMATION_TEST_NAME_FIELD_ID)
            .and_then(|field| field.value.as_deref())
            .filter(|value| !value.is_empty())
    }

    /// Name the case is matched against outcome names by.
    pub fn lookup_name(&self) -> &str {
        self.automation_test_name().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Suite {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdResult {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteCreate {
    pub title: String,
    pub parent_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseCreate {
    pub title: String,
    pub suite_id: i64,
    pub is_flaky: i32,
    pub automation: i32,
    pub custom_field: BTreeMap<String, String>,
}

impl CaseCreate {
    /// Automated, non-flaky case tagged with the test source field.
    pub fn automated(title: &str, suite_id: i64) -> Self {
        Self {
            title: title.to_string(),
            suite_id,
            is_flaky: 0,
            automation: AUTOMATION_AUTOMATED,
            custom_field: BTreeMap::from([(
                TEST_SOURCE_FIELD_ID.to_string(),
                TEST_SOURCE.to_string(),
            )]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultCreate {
    pub case_id: i64,
    pub status: String,
    pub comment: String,
    /// Whole seconds.
    pub time: i64,
}

/// Case IDs keyed by the name outcomes are matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseIndex(HashMap<String, i64>);

impl CaseIndex {
    pub fn from_cases<'a, I>(cases: I) -> Self
    where
        I: IntoIterator<Item = &'a TestCase>,
    {
        Self(
            cases
                .into_iter()
                .map(|case| (case.lookup_name().to_string(), case.id))
                .collect(),
        )
    }

    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, case_id: i64) {
        self.0.insert(name.to_string(), case_id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
