//! Execution verdicts.

use serde::{Deserialize, Serialize};

/// Aggregated outcome of an action, a step or a whole scenario.
///
/// Ordered by severity so aggregation is a plain `max`:
/// `Success < Warnings < Fail < Errors`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Verdict {
    #[default]
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "WARNINGS")]
    Warnings,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "ERRORS")]
    Errors,
}

impl Verdict {
    pub fn worst(self, other: Verdict) -> Verdict {
        self.max(other)
    }

    pub fn is_failed(self) -> bool {
        self >= Verdict::Fail
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Success => "SUCCESS",
            Verdict::Warnings => "WARNINGS",
            Verdict::Fail => "FAIL",
            Verdict::Errors => "ERRORS",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Verdict::Success < Verdict::Warnings);
        assert!(Verdict::Warnings < Verdict::Fail);
        assert!(Verdict::Fail < Verdict::Errors);
        assert_eq!(Verdict::Warnings.worst(Verdict::Fail), Verdict::Fail);
        assert_eq!(Verdict::Errors.worst(Verdict::Success), Verdict::Errors);
    }

    #[test]
    fn serde_uses_screaming_names() {
        assert_eq!(serde_json::to_string(&Verdict::Warnings).unwrap(), "\"WARNINGS\"");
        let v: Verdict = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(v, Verdict::Fail);
    }
}
