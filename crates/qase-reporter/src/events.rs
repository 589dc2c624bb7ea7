//! Decoding of line-delimited `go test -json` event records.
//!
//! Each non-blank line holds one JSON object. Only `Action`, `Test`,
//! `Output` and `Elapsed` are read; other keys (`Time`, `Package`) are
//! ignored.

use crate::errors::DecodeError;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Separator between the segments of a subtest path.
pub const PATH_SEPARATOR: char = '/';

/// What a test event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Action {
    Run,
    Output,
    Pass,
    Fail,
    Skip,
    /// `start`, `pause`, `cont`, `bench` and anything newer.
    Other,
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "run" => Action::Run,
            "output" => Action::Output,
            "pass" => Action::Pass,
            "fail" => Action::Fail,
            "skip" => Action::Skip,
            _ => Action::Other,
        }
    }
}

/// One decoded event line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestEvent {
    #[serde(rename = "Action", alias = "action")]
    pub action: Action,

    /// Slash-separated test path, empty for package-level events.
    #[serde(rename = "Test", alias = "test", default)]
    pub test: String,

    #[serde(rename = "Output", alias = "output", default)]
    pub output: String,

    /// Elapsed seconds in decimal form, empty when absent.
    #[serde(
        rename = "Elapsed",
        alias = "elapsed",
        default,
        deserialize_with = "elapsed_as_string"
    )]
    pub elapsed: String,
}

impl TestEvent {
    /// Build an event directly (used by fixtures and tests).
    pub fn new(action: Action, test: &str, output: &str, elapsed: &str) -> Self {
        Self {
            action,
            test: test.to_string(),
            output: output.to_string(),
            elapsed: elapsed.to_string(),
        }
    }

    /// Whether the test path names a subtest.
    pub fn is_subtest(&self) -> bool {
        self.test.contains(PATH_SEPARATOR)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Elapsed {
    Number(serde_json::Number),
    Text(String),
}

fn elapsed_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Elapsed>::deserialize(deserializer)? {
        Some(Elapsed::Number(n)) => n.to_string(),
        Some(Elapsed::Text(s)) => s,
        None => String::new(),
    })
}

/// Decode every event from a line-oriented reader.
///
/// Blank lines are skipped. The first malformed line aborts decoding.
///
/// # Errors
///
/// - `DecodeError::Io` - the reader failed
/// - `DecodeError::Malformed` - a line is not a valid event
pub fn decode_events<R: BufRead>(reader: R) -> Result<Vec<TestEvent>, DecodeError> {
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event = serde_json::from_str(&line).map_err(|source| DecodeError::Malformed {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }

    Ok(events)
}

/// Open `path` and decode its events.
///
/// # Errors
///
/// - `DecodeError::Open` - the file cannot be opened
/// - anything [`decode_events`] returns
pub fn read_events(path: &Path) -> Result<Vec<TestEvent>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    decode_events(BufReader::new(file))
}
