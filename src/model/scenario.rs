//! Scenario and step definitions, built through explicit registration.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use crate::{CodeLocation, KnownIssue, ScenaristError, StepCtx, TestError};

/// How a step body terminates early. `Ok(())` means the body ran to its
/// natural end; breaks are classified by the engine afterwards.
pub type StepFlow = Result<(), StepBreak>;

#[derive(Debug)]
pub enum StepBreak {
    /// A check did not hold; counts as a failure of the current step.
    Failure(TestError),
    /// The body hit an unexpected error; counts as an exception.
    Exception(TestError),
    /// A framework fault that aborts the whole run.
    Fatal(ScenaristError),
}

impl From<ScenaristError> for StepBreak {
    fn from(err: ScenaristError) -> Self {
        StepBreak::Fatal(err)
    }
}

/// A step body. Called once per build pass and once per executed step;
/// `FnMut` so bodies can keep private state between the two.
pub type StepBody = Box<dyn FnMut(&mut StepCtx<'_>) -> StepFlow>;

/// What kind of entry a step is in the scenario sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepKind {
    /// Regular executable step.
    Body,
    /// Narrative-only entry, shown in documentation output.
    SectionDescription,
    /// Opens a named section; `end` names the matching `SectionEnd`.
    #[serde(rename_all = "camelCase")]
    SectionBegin { end: String },
    /// Closes a section; jump target for `skip_section`.
    SectionEnd,
}

/// An action or an expected result declared inside a step body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionResultKind {
    Action,
    Result,
}

impl std::fmt::Display for ActionResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ActionResultKind::Action => "ACTION",
            ActionResultKind::Result => "RESULT",
        })
    }
}

/// A declared action or expected result.
///
/// Identity is the `(kind, location)` pair: an ACTION and a RESULT declared
/// at the same source location are distinct entries and are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResultDefinition {
    pub kind: ActionResultKind,
    pub description: String,
    pub location: CodeLocation,
}

/// One entry in a scenario's step sequence.
///
/// `name` is the stable identity used by goto and skip targets; it never
/// changes once registered.
pub struct StepDefinition {
    pub name: String,
    pub description: String,
    pub kind: StepKind,
    pub known_issues: Vec<KnownIssue>,
    pub body: Option<StepBody>,
}

impl StepDefinition {
    pub fn body(name: impl Into<String>, description: impl Into<String>, body: StepBody) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: StepKind::Body,
            known_issues: Vec::new(),
            body: Some(body),
        }
    }

    fn marker(name: impl Into<String>, description: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            known_issues: Vec::new(),
            body: None,
        }
    }

    pub fn with_known_issue(mut self, issue: KnownIssue) -> Self {
        self.known_issues.push(issue);
        self
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .field("known_issues", &self.known_issues)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A scenario: metadata plus an ordered step sequence.
#[derive(Debug, Default)]
pub struct ScenarioDefinition {
    pub name: String,
    pub description: String,
    pub attributes: BTreeMap<String, String>,
    /// Local override of the `continue_on_error` config key.
    pub continue_on_error: Option<bool>,
    pub known_issues: Vec<KnownIssue>,
    pub steps: Vec<StepDefinition>,
}

impl ScenarioDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn continue_on_error(mut self, on: bool) -> Self {
        self.continue_on_error = Some(on);
        self
    }

    pub fn known_issue(mut self, issue: KnownIssue) -> Self {
        self.known_issues.push(issue);
        self
    }

    /// Append a regular executable step.
    pub fn step(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl FnMut(&mut StepCtx<'_>) -> StepFlow + 'static,
    ) -> Self {
        self.steps
            .push(StepDefinition::body(name, description, Box::new(body)));
        self
    }

    /// Append a narrative-only entry.
    pub fn section_description(
        mut self,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.steps.push(StepDefinition::marker(
            name,
            text,
            StepKind::SectionDescription,
        ));
        self
    }

    /// Open a named section. `end` names the matching `section_end` marker,
    /// which must be appended later in the sequence.
    pub fn section_begin(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.steps.push(StepDefinition::marker(
            name,
            description,
            StepKind::SectionBegin { end: end.into() },
        ));
        self
    }

    pub fn section_end(mut self, name: impl Into<String>) -> Self {
        self.steps
            .push(StepDefinition::marker(name, String::new(), StepKind::SectionEnd));
        self
    }

    /// Append a step after construction, e.g. a generated sub-step.
    pub fn push_step(&mut self, step: StepDefinition) {
        self.steps.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_declaration_order() {
        let def = ScenarioDefinition::new("demo")
            .describe("ordering check")
            .attribute("owner", "qa")
            .section_description("intro", "narrative")
            .step("010", "first", |_ctx| Ok(()))
            .step("020", "second", |_ctx| Ok(()));
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.steps[0].kind, StepKind::SectionDescription);
        assert_eq!(def.steps[1].name, "010");
        assert_eq!(def.steps[2].name, "020");
        assert_eq!(def.attributes.get("owner").map(String::as_str), Some("qa"));
    }

    #[test]
    fn section_markers_carry_their_end_name() {
        let def = ScenarioDefinition::new("demo")
            .section_begin("s-begin", "optional part", "s-end")
            .step("010", "inside", |_ctx| Ok(()))
            .section_end("s-end");
        match &def.steps[0].kind {
            StepKind::SectionBegin { end } => assert_eq!(end, "s-end"),
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(def.steps[2].kind, StepKind::SectionEnd);
    }

    #[test]
    fn action_result_identity_is_kind_and_location() {
        let loc = CodeLocation {
            file: "demo.rs".to_string(),
            line: 7,
        };
        let action = ActionResultDefinition {
            kind: ActionResultKind::Action,
            description: "press the button".to_string(),
            location: loc.clone(),
        };
        let result = ActionResultDefinition {
            kind: ActionResultKind::Result,
            description: "press the button".to_string(),
            location: loc,
        };
        assert_ne!(action, result);
    }
}
