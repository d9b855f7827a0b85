use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Severity of a build diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" | "fatal error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            other => Err(format!("invalid severity: {other}")),
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestOutcome {
    Passed,
    Failed,
    Ignored,
}

impl TestOutcome {
    /// Map an NUnit `result="..."` attribute onto an outcome.
    ///
    /// Unknown values count as ignored: the runner did not report the test as
    /// either passing or failing.
    pub fn from_nunit(result: &str) -> Self {
        match result.trim().to_lowercase().as_str() {
            "success" | "passed" => TestOutcome::Passed,
            "failure" | "failed" | "error" => TestOutcome::Failed,
            _ => TestOutcome::Ignored,
        }
    }
}

/// Kind of test runner a test name subset applies to.
///
/// `Any` subsets are honoured by every runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    Any,
    NUnit,
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerKind::Any => write!(f, "Any"),
            RunnerKind::NUnit => write!(f, "NUnit"),
        }
    }
}

impl FromStr for RunnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(RunnerKind::Any),
            "nunit" => Ok(RunnerKind::NUnit),
            other => Err(format!(
                "invalid runner kind: {other} (expected \"any\" or \"nunit\")"
            )),
        }
    }
}

/// Behaviour when a run request arrives while a cycle is already in progress.
///
/// - `Queue`: remember the request and start a new cycle when the current one
///   finishes (default behaviour).
/// - `Abort`: abort the running cycle cooperatively, then start a new cycle
///   for the queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Abort,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "abort" => Ok(TriggerWhileRunningBehaviour::Abort),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"abort\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nunit_results_map_to_outcomes() {
        assert_eq!(TestOutcome::from_nunit("Success"), TestOutcome::Passed);
        assert_eq!(TestOutcome::from_nunit("Failure"), TestOutcome::Failed);
        assert_eq!(TestOutcome::from_nunit("Error"), TestOutcome::Failed);
        assert_eq!(TestOutcome::from_nunit("Ignored"), TestOutcome::Ignored);
        assert_eq!(TestOutcome::from_nunit("NotRunnable"), TestOutcome::Ignored);
    }

    #[test]
    fn runner_kind_parses_case_insensitively() {
        assert_eq!("NUnit".parse::<RunnerKind>(), Ok(RunnerKind::NUnit));
        assert!("xunit".parse::<RunnerKind>().is_err());
    }
}
