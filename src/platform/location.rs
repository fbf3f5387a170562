//! Source locations attached to declarations and errors.

use serde::{Deserialize, Serialize};

/// Where a declaration or error comes from, serialized as `file:line`.
///
/// Captured automatically via `#[track_caller]` on the `StepCtx` user API,
/// so scenario code never spells these out by hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    pub file: String,
    pub line: u32,
}

impl CodeLocation {
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file().to_string(),
            line: loc.line(),
        }
    }

    pub fn to_long_string(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }

    pub fn from_long_string(s: &str) -> Option<Self> {
        let (file, line) = s.rsplit_once(':')?;
        Some(Self {
            file: file.to_string(),
            line: line.parse().ok()?,
        })
    }
}

impl std::fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_string_round_trip() {
        let loc = CodeLocation {
            file: "tests/demo.rs".to_string(),
            line: 42,
        };
        let parsed = CodeLocation::from_long_string(&loc.to_long_string()).unwrap();
        assert_eq!(parsed, loc);
    }

    #[test]
    fn caller_points_at_this_file() {
        let loc = CodeLocation::caller();
        assert!(loc.file.ends_with("location.rs"), "got {}", loc.file);
        assert!(loc.line > 0);
    }
}
