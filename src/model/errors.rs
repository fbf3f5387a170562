//! Test errors and known issues.
//!
//! These are first-class values carried through step results and reports,
//! never framework faults. See `ScenaristError` for the latter.

use serde::{Deserialize, Serialize};

use crate::{CodeLocation, ScenarioConfig};

/// An error attached to a step or scenario execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TestError {
    /// An expectation check failed.
    #[serde(rename_all = "camelCase")]
    Failure {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<CodeLocation>,
    },

    /// A step body panicked or aborted abnormally.
    #[serde(rename_all = "camelCase")]
    Exception {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<CodeLocation>,
    },

    /// A registered known issue, tracked rather than surprising.
    KnownIssue(KnownIssue),
}

impl TestError {
    pub fn failure(message: impl Into<String>, location: Option<CodeLocation>) -> Self {
        TestError::Failure {
            message: message.into(),
            location,
        }
    }

    pub fn exception(message: impl Into<String>, location: Option<CodeLocation>) -> Self {
        TestError::Exception {
            message: message.into(),
            location,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TestError::Failure { message, .. } => message,
            TestError::Exception { message, .. } => message,
            TestError::KnownIssue(issue) => &issue.message,
        }
    }

    pub fn location(&self) -> Option<&CodeLocation> {
        match self {
            TestError::Failure { location, .. } => location.as_ref(),
            TestError::Exception { location, .. } => location.as_ref(),
            TestError::KnownIssue(issue) => issue.location.as_ref(),
        }
    }

    pub fn is_known_issue(&self) -> bool {
        matches!(self, TestError::KnownIssue(_))
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Failure { message, location } => match location {
                Some(loc) => write!(f, "{message} ({loc})"),
                None => f.write_str(message),
            },
            TestError::Exception { message, location } => match location {
                Some(loc) => write!(f, "exception: {message} ({loc})"),
                None => write!(f, "exception: {message}"),
            },
            TestError::KnownIssue(issue) => issue.fmt(f),
        }
    }
}

/// A registered known issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownIssue {
    /// Severity, compared against the configured thresholds. `None` means
    /// unleveled, classified pessimistically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,

    /// Tracker identifier, e.g. `#153`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<CodeLocation>,
}

impl KnownIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            level: None,
            id: None,
            url: None,
            message: message.into(),
            location: None,
        }
    }

    pub fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_location(mut self, location: CodeLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Classify against the configured thresholds.
    ///
    /// Leveled issues: at or above `issue_level_error` they count as errors,
    /// even when the ignore threshold overlaps (an error cannot be ignored);
    /// below `issue_level_ignored` they vanish; in between they are warnings.
    /// Unleveled issues are warnings, unless an error threshold is
    /// configured at all, in which case they get the worst-case treatment.
    /// Known issues never halt execution, whatever their class.
    pub fn classify(&self, config: &ScenarioConfig) -> IssueClass {
        let error_at = config.issue_level_error();
        let ignored_below = config.issue_level_ignored();
        match self.level {
            Some(level) => {
                if error_at.is_some_and(|threshold| level >= threshold) {
                    IssueClass::Error
                } else if ignored_below.is_some_and(|threshold| level < threshold) {
                    IssueClass::Ignored
                } else {
                    IssueClass::Warning
                }
            }
            None => {
                if error_at.is_some() {
                    IssueClass::Error
                } else {
                    IssueClass::Warning
                }
            }
        }
    }
}

impl std::fmt::Display for KnownIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("known issue")?;
        if let Some(id) = &self.id {
            write!(f, " {id}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(url) = &self.url {
            write!(f, " ({url})")?;
        }
        Ok(())
    }
}

/// What a known issue counts as after threshold classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueClass {
    /// Dropped entirely, not even reported.
    Ignored,
    Warning,
    Error,
}
