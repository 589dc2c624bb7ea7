//! Reduction of a test event stream into one outcome per leaf subtest.
//!
//! Only subtests (paths containing `/`) are tracked. Events are folded into a
//! working map keyed by full path; parent suppression is recorded during the
//! fold and applied once the stream ends, followed by the timeout rule and the
//! split of each path into suite and display name.

use crate::events::{Action, TestEvent, PATH_SEPARATOR};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::num::ParseFloatError;

/// Final status of a subtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
        }
    }

    /// Status string used by the case management API.
    pub fn result_status(self) -> &'static str {
        match self {
            Status::Pass => "passed",
            Status::Fail => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated result for one subtest.
///
/// While the stream is being folded `name` holds the full path and `suite` is
/// empty. After [`OutcomeReducer::finish`] `name` is the last path segment and
/// `suite` the segments before it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestOutcome {
    pub name: String,
    /// `None` until a pass or fail event arrives.
    pub status: Option<Status>,
    pub elapsed: String,
    pub stack_trace: String,
    pub suite: Vec<String>,
}

impl TestOutcome {
    fn started(path: &str) -> Self {
        Self {
            name: path.to_string(),
            ..Self::default()
        }
    }

    /// Suite segments and name joined back into a path.
    pub fn full_name(&self) -> String {
        let mut segments: Vec<&str> = self.suite.iter().map(String::as_str).collect();
        segments.push(&self.name);
        segments.join("/")
    }

    /// Elapsed time truncated to whole seconds; empty counts as zero.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `elapsed` is not a decimal number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn elapsed_seconds(&self) -> Result<i64, ParseFloatError> {
        if self.elapsed.trim().is_empty() {
            return Ok(0);
        }
        Ok(self.elapsed.trim().parse::<f64>()? as i64)
    }
}

/// Stateful fold over test events.
#[derive(Debug, Default)]
pub struct OutcomeReducer {
    outcomes: BTreeMap<String, TestOutcome>,
    last_suppressed_parent: String,
    suppressed_parents: BTreeSet<String>,
    saw_timeout: bool,
}

impl OutcomeReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event.
    pub fn apply(&mut self, event: &TestEvent) {
        let subtest = event.is_subtest();

        match event.action {
            Action::Run if subtest => {
                self.outcomes
                    .insert(event.test.clone(), TestOutcome::started(&event.test));
            }
            Action::Output if subtest => {
                if let Some(outcome) = self.outcomes.get_mut(&event.test) {
                    outcome.stack_trace.push_str(&event.output);
                }
            }
            Action::Skip => {
                self.outcomes.remove(&event.test);
            }
            Action::Pass | Action::Fail if subtest => {
                let Some(outcome) = self.outcomes.get_mut(&event.test) else {
                    return;
                };

                outcome.stack_trace.push_str(&event.output);
                outcome.status = Some(if event.action == Action::Pass {
                    Status::Pass
                } else {
                    Status::Fail
                });
                outcome.elapsed.clone_from(&event.elapsed);

                if let Some(parent) = suppressed_parent(&event.test) {
                    if parent != self.last_suppressed_parent {
                        self.suppressed_parents.insert(parent.clone());
                        self.last_suppressed_parent = parent;
                    }
                }
            }
            Action::Fail if event.test.is_empty() => {
                self.saw_timeout = true;
            }
            _ => {}
        }
    }

    /// Apply parent suppression and the timeout rule, then split every path
    /// into suite and display name.
    pub fn finish(mut self) -> BTreeMap<String, TestOutcome> {
        for parent in &self.suppressed_parents {
            self.outcomes.remove(parent);
        }

        for outcome in self.outcomes.values_mut() {
            let mut segments: Vec<String> = outcome
                .name
                .split(PATH_SEPARATOR)
                .map(str::to_string)
                .collect();
            if let Some(name) = segments.pop() {
                outcome.name = name;
            }
            outcome.suite = segments;

            if self.saw_timeout && outcome.status.is_none() {
                outcome.status = Some(Status::Fail);
            }
        }

        self.outcomes
    }
}

/// Two-segment prefix of a path with three or more segments.
fn suppressed_parent(path: &str) -> Option<String> {
    let mut segments = path.split(PATH_SEPARATOR);
    let first = segments.next()?;
    let second = segments.next()?;
    segments.next()?;
    Some(format!("{first}{PATH_SEPARATOR}{second}"))
}

/// Reduce a full event stream to its final outcome mapping, keyed by full path.
pub fn reduce<'a, I>(events: I) -> BTreeMap<String, TestOutcome>
where
    I: IntoIterator<Item = &'a TestEvent>,
{
    let mut reducer = OutcomeReducer::new();
    for event in events {
        reducer.apply(event);
    }
    reducer.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn ev(action: Action, test: &str) -> TestEvent {
        TestEvent::new(action, test, "", "")
    }

    fn ev_out(action: Action, test: &str, output: &str, elapsed: &str) -> TestEvent {
        TestEvent::new(action, test, output, elapsed)
    }

    #[test]
    fn test_single_subtest_pass() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev_out(Action::Output, "a/b", "log", ""),
            ev_out(Action::Pass, "a/b", "", "1.2"),
        ];

        let outcomes = reduce(&events);

        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes["a/b"];
        assert_eq!(outcome.name, "b");
        assert_eq!(outcome.suite, vec!["a".to_string()]);
        assert_eq!(outcome.status, Some(Status::Pass));
        assert_eq!(outcome.elapsed, "1.2");
        assert_eq!(outcome.stack_trace, "log");
    }

    #[test]
    fn test_child_suppresses_parent_regardless_of_order() {
        let events = vec![
            ev(Action::Run, "a/b/c"),
            ev(Action::Pass, "a/b/c"),
            ev(Action::Run, "a/b"),
            ev(Action::Pass, "a/b"),
        ];

        let outcomes = reduce(&events);

        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes["a/b/c"];
        assert_eq!(outcome.name, "c");
        assert_eq!(outcome.suite, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_go_test_ordering_suppresses_parent() {
        let events = vec![
            ev(Action::Run, "TestA/group"),
            ev(Action::Run, "TestA/group/case1"),
            ev(Action::Run, "TestA/group/case2"),
            ev(Action::Pass, "TestA/group/case1"),
            ev(Action::Fail, "TestA/group/case2"),
            ev(Action::Fail, "TestA/group"),
        ];

        let outcomes = reduce(&events);

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes.contains_key("TestA/group"));
        assert_eq!(outcomes["TestA/group/case1"].status, Some(Status::Pass));
        assert_eq!(outcomes["TestA/group/case2"].status, Some(Status::Fail));
    }

    #[test]
    fn test_skip_removes_entry() {
        let events = vec![ev(Action::Run, "a/b"), ev(Action::Skip, "a/b")];
        assert!(reduce(&events).is_empty());
    }

    #[test]
    fn test_skip_after_pass_still_removes() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev(Action::Pass, "a/b"),
            ev(Action::Skip, "a/b"),
        ];
        assert!(reduce(&events).is_empty());
    }

    #[test]
    fn test_timeout_fails_unfinished_entries() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev(Action::Run, "a/c"),
            ev(Action::Pass, "a/c"),
            ev(Action::Fail, ""),
        ];

        let outcomes = reduce(&events);

        assert_eq!(outcomes["a/b"].status, Some(Status::Fail));
        assert_eq!(outcomes["a/c"].status, Some(Status::Pass));
    }

    #[test]
    fn test_unfinished_entry_without_timeout_stays_unset() {
        let events = vec![ev(Action::Run, "a/b")];
        assert_eq!(reduce(&events)["a/b"].status, None);
    }

    #[test]
    fn test_stray_events_are_ignored() {
        let events = vec![
            ev_out(Action::Output, "a/b", "orphan", ""),
            ev_out(Action::Pass, "a/b", "", "3"),
            ev_out(Action::Fail, "x/y/z", "", "3"),
        ];
        assert!(reduce(&events).is_empty());
    }

    #[test]
    fn test_top_level_tests_are_not_tracked() {
        let events = vec![
            ev(Action::Run, "TestTop"),
            ev_out(Action::Output, "TestTop", "hello", ""),
            ev(Action::Pass, "TestTop"),
        ];
        assert!(reduce(&events).is_empty());
    }

    #[test]
    fn test_rerun_overwrites_entry() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev_out(Action::Output, "a/b", "first", ""),
            ev(Action::Run, "a/b"),
            ev_out(Action::Output, "a/b", "second", ""),
        ];

        assert_eq!(reduce(&events)["a/b"].stack_trace, "second");
    }

    #[test]
    fn test_final_output_is_appended_on_finish() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev_out(Action::Output, "a/b", "line1\n", ""),
            ev_out(Action::Fail, "a/b", "line2\n", "0.25"),
        ];

        let outcome = &reduce(&events)["a/b"];
        assert_eq!(outcome.stack_trace, "line1\nline2\n");
        assert_eq!(outcome.status, Some(Status::Fail));
        assert_eq!(outcome.elapsed, "0.25");
    }

    #[test]
    fn test_independent_families_are_not_cross_suppressed() {
        let events = vec![
            ev(Action::Run, "A/x"),
            ev(Action::Run, "A/x/1"),
            ev(Action::Run, "B/y"),
            ev(Action::Run, "B/y/1"),
            ev(Action::Run, "C/z"),
            ev(Action::Pass, "A/x/1"),
            ev(Action::Pass, "B/y/1"),
            ev(Action::Pass, "C/z"),
        ];

        let outcomes = reduce(&events);

        assert!(!outcomes.contains_key("A/x"));
        assert!(!outcomes.contains_key("B/y"));
        assert!(outcomes.contains_key("A/x/1"));
        assert!(outcomes.contains_key("B/y/1"));
        assert!(outcomes.contains_key("C/z"));
    }

    #[test]
    fn test_interleaved_families_suppress_each_parent_once() {
        let events = vec![
            ev(Action::Run, "A/x"),
            ev(Action::Run, "B/y"),
            ev(Action::Run, "A/x/1"),
            ev(Action::Run, "B/y/1"),
            ev(Action::Run, "A/x/2"),
            ev(Action::Pass, "A/x/1"),
            ev(Action::Pass, "B/y/1"),
            ev(Action::Pass, "A/x/2"),
        ];

        let mut reducer = OutcomeReducer::new();
        for event in &events {
            reducer.apply(event);
        }
        assert_eq!(reducer.suppressed_parents.len(), 2);

        let outcomes = reducer.finish();
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes.contains_key("A/x"));
        assert!(!outcomes.contains_key("B/y"));
    }

    #[test]
    fn test_deep_subtest_suppresses_two_segment_prefix() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev(Action::Run, "a/b/c"),
            ev(Action::Run, "a/b/c/d"),
            ev(Action::Pass, "a/b/c/d"),
            ev(Action::Pass, "a/b/c"),
            ev(Action::Pass, "a/b"),
        ];

        let outcomes = reduce(&events);

        assert!(!outcomes.contains_key("a/b"));
        assert_eq!(outcomes["a/b/c/d"].suite, vec!["a", "b", "c"]);
        assert_eq!(outcomes["a/b/c"].suite, vec!["a", "b"]);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let events = vec![
            ev(Action::Run, "a/b"),
            ev(Action::Run, "a/b/c"),
            ev_out(Action::Output, "a/b/c", "x", ""),
            ev_out(Action::Fail, "a/b/c", "", "2.5"),
            ev(Action::Run, "d/e"),
            ev(Action::Fail, ""),
        ];

        assert_eq!(reduce(&events), reduce(&events));
    }

    #[test]
    fn test_full_name_rejoins_path() {
        let events = vec![ev(Action::Run, "a/b/c"), ev(Action::Pass, "a/b/c")];
        assert_eq!(reduce(&events)["a/b/c"].full_name(), "a/b/c");
    }

    #[test]
    fn test_elapsed_seconds() {
        let mut outcome = TestOutcome::default();
        assert_eq!(outcome.elapsed_seconds().unwrap(), 0);

        outcome.elapsed = "12.97".to_string();
        assert_eq!(outcome.elapsed_seconds().unwrap(), 12);

        outcome.elapsed = "soon".to_string();
        assert!(outcome.elapsed_seconds().is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(Status::Pass.as_str(), "pass");
        assert_eq!(Status::Fail.result_status(), "failed");
        assert_eq!(Status::Pass.to_string(), "pass");
    }

    #[test]
    fn test_suppressed_parent() {
        assert_eq!(suppressed_parent("a/b"), None);
        assert_eq!(suppressed_parent("a"), None);
        assert_eq!(suppressed_parent("a/b/c").as_deref(), Some("a/b"));
        assert_eq!(suppressed_parent("a/b/c/d").as_deref(), Some("a/b"));
    }
}
