//! Declarative scenario files.
//!
//! The CLI executes JSON scenario files built from a small op vocabulary
//! over the run's integer variable store. Files are validated up front;
//! a malformed file never starts executing.

use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::{
    ActionResultKind, CodeLocation, KnownIssue, ScenarioDefinition, ScenaristError,
    ScenaristResult, StepBreak, StepCtx, StepFlow, TestError,
};

pub const SCENARIO_FILE_VERSION: u32 = 1;

/// A parsed scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFile {
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_issues: Vec<KnownIssueSpec>,
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownIssueSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub message: String,
}

impl KnownIssueSpec {
    fn to_issue(&self, location: Option<CodeLocation>) -> KnownIssue {
        KnownIssue {
            level: self.level,
            id: self.id.clone(),
            url: self.url.clone(),
            message: self.message.clone(),
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepSpecKind {
    #[default]
    Body,
    SectionDescription,
    SectionBegin,
    SectionEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "is_body")]
    pub kind: StepSpecKind,
    /// Name of the matching section end; section begins only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemSpec>,
}

fn is_body(kind: &StepSpecKind) -> bool {
    *kind == StepSpecKind::Body
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub kind: ActionResultKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<Op>,
}

/// One operation over the run's variable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Op {
    Set {
        var: String,
        value: i64,
    },
    Add {
        var: String,
        value: i64,
    },
    /// Add one variable's value to another.
    AddVar {
        var: String,
        other: String,
    },
    AssertEq {
        var: String,
        expected: i64,
    },
    Fail {
        message: String,
    },
    KnownIssue {
        #[serde(flatten)]
        issue: KnownIssueSpec,
    },
    Goto {
        target: String,
    },
    #[serde(rename_all = "camelCase")]
    GotoIfLt {
        var: String,
        limit: i64,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_target: Option<String>,
    },
    SkipSection {
        target: String,
    },
    Call {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Exec {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_exit: Option<i32>,
    },
}

impl ScenarioFile {
    pub fn load(path: &Path) -> ScenaristResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ScenaristError::InputMissing(path.display().to_string())
            } else {
                ScenaristError::Io(err)
            }
        })?;
        let file: ScenarioFile = serde_json::from_str(&raw)
            .map_err(|err| ScenaristError::Scenario(format!("{}: {err}", path.display())))?;
        file.validate(path)?;
        Ok(file)
    }

    fn validate(&self, path: &Path) -> ScenaristResult<()> {
        let fail = |msg: String| {
            Err(ScenaristError::Scenario(format!(
                "{}: {msg}",
                path.display()
            )))
        };
        if self.version != SCENARIO_FILE_VERSION {
            return fail(format!(
                "unsupported version {} (expected {SCENARIO_FILE_VERSION})",
                self.version
            ));
        }
        if self.name.is_empty() {
            return fail("scenario name is empty".to_string());
        }

        let mut names = BTreeSet::new();
        let mut section_begins = BTreeMap::new();
        let mut section_ends = BTreeSet::new();
        for step in &self.steps {
            if step.name.is_empty() {
                return fail("step with an empty name".to_string());
            }
            if !names.insert(step.name.as_str()) {
                return fail(format!("duplicate step {:?}", step.name));
            }
            match step.kind {
                StepSpecKind::SectionBegin => match &step.end {
                    Some(end) => {
                        section_begins.insert(step.name.as_str(), end.as_str());
                    }
                    None => return fail(format!("section begin {:?} has no end", step.name)),
                },
                StepSpecKind::SectionEnd => {
                    section_ends.insert(step.name.as_str());
                }
                StepSpecKind::Body | StepSpecKind::SectionDescription => {
                    if step.end.is_some() {
                        return fail(format!("step {:?} is not a section begin", step.name));
                    }
                }
            }
        }
        for (begin, end) in &section_begins {
            if !section_ends.contains(end) {
                return fail(format!("section {begin:?} names a missing end {end:?}"));
            }
        }

        for step in &self.steps {
            if step.kind != StepSpecKind::Body && !step.items.is_empty() {
                return fail(format!("step {:?} cannot carry items", step.name));
            }
            for item in &step.items {
                if item.description.is_empty() {
                    return fail(format!("step {:?}: item with no description", step.name));
                }
                match &item.op {
                    Some(Op::Goto { target })
                    | Some(Op::GotoIfLt {
                        target,
                        else_target: None,
                        ..
                    }) => {
                        if !names.contains(target.as_str()) {
                            return fail(format!("unknown goto target {target:?}"));
                        }
                    }
                    Some(Op::GotoIfLt {
                        target,
                        else_target: Some(other),
                        ..
                    }) => {
                        for t in [target, other] {
                            if !names.contains(t.as_str()) {
                                return fail(format!("unknown goto target {t:?}"));
                            }
                        }
                    }
                    Some(Op::SkipSection { target }) => {
                        if !section_begins.contains_key(target.as_str()) {
                            return fail(format!("{target:?} is not a section begin"));
                        }
                    }
                    Some(Op::Call { path: sub }) => {
                        if sub.is_empty() {
                            return fail("call with an empty path".to_string());
                        }
                    }
                    Some(Op::Exec { command, .. }) => {
                        if command.is_empty() {
                            return fail("exec with an empty command".to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Turn the parsed file into an executable definition. `source` is the
    /// file's own path; `call` ops resolve relative to its directory.
    pub fn into_definition(self, source: &Path) -> ScenaristResult<ScenarioDefinition> {
        let source_str = source.display().to_string();
        let base_dir = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut def = ScenarioDefinition::new(self.name).describe(self.description);
        for (key, value) in self.attributes {
            def = def.attribute(key, value);
        }
        if let Some(on) = self.continue_on_error {
            def = def.continue_on_error(on);
        }
        for issue in &self.known_issues {
            def = def.known_issue(issue.to_issue(None));
        }

        // Synthetic locations: one distinct line per item across the file,
        // so (kind, location) identity works for declarative steps too.
        let mut next_line: u32 = 1;
        for step in self.steps {
            match step.kind {
                StepSpecKind::SectionDescription => {
                    def = def.section_description(step.name, step.title);
                }
                StepSpecKind::SectionBegin => {
                    // Validated above.
                    let end = step.end.unwrap_or_default();
                    def = def.section_begin(step.name, step.title, end);
                }
                StepSpecKind::SectionEnd => {
                    def = def.section_end(step.name);
                }
                StepSpecKind::Body => {
                    let items: Vec<(ItemSpec, CodeLocation)> = step
                        .items
                        .into_iter()
                        .map(|item| {
                            let loc = CodeLocation {
                                file: source_str.clone(),
                                line: next_line,
                            };
                            next_line += 1;
                            (item, loc)
                        })
                        .collect();
                    let base_dir = base_dir.clone();
                    def = def.step(step.name, step.title, move |ctx| {
                        for (item, loc) in &items {
                            let gate = match item.kind {
                                ActionResultKind::Action => {
                                    ctx.action_at(&item.description, loc.clone())
                                }
                                ActionResultKind::Result => {
                                    ctx.result_at(&item.description, loc.clone())
                                }
                            };
                            if gate {
                                if let Some(op) = &item.op {
                                    apply_op(ctx, op, loc, &base_dir)?;
                                }
                            }
                        }
                        Ok(())
                    });
                }
            }
        }
        Ok(def)
    }

    /// Scaffolding scenario written by `scenarist init`.
    pub fn example() -> Self {
        let item = |kind, description: &str, op| ItemSpec {
            kind,
            description: description.to_string(),
            op: Some(op),
        };
        let step = |name: &str, title: &str, items| StepSpec {
            name: name.to_string(),
            title: title.to_string(),
            kind: StepSpecKind::Body,
            end: None,
            items,
        };
        ScenarioFile {
            version: SCENARIO_FILE_VERSION,
            name: "arithmetic".to_string(),
            description: "Add two numbers and check the sum.".to_string(),
            attributes: BTreeMap::from([(
                "category".to_string(),
                "example".to_string(),
            )]),
            continue_on_error: None,
            known_issues: Vec::new(),
            steps: vec![
                step(
                    "010",
                    "Set the first operand",
                    vec![item(
                        ActionResultKind::Action,
                        "Let a = 4.",
                        Op::Set {
                            var: "a".to_string(),
                            value: 4,
                        },
                    )],
                ),
                step(
                    "020",
                    "Set the second operand",
                    vec![item(
                        ActionResultKind::Action,
                        "Let b = 5.",
                        Op::Set {
                            var: "b".to_string(),
                            value: 5,
                        },
                    )],
                ),
                step(
                    "030",
                    "Compute the sum",
                    vec![
                        item(
                            ActionResultKind::Action,
                            "Add b to a.",
                            Op::AddVar {
                                var: "a".to_string(),
                                other: "b".to_string(),
                            },
                        ),
                        item(
                            ActionResultKind::Result,
                            "The sum is 9.",
                            Op::AssertEq {
                                var: "a".to_string(),
                                expected: 9,
                            },
                        ),
                    ],
                ),
                step(
                    "040",
                    "Check the operands are untouched",
                    vec![item(
                        ActionResultKind::Result,
                        "b still holds 5.",
                        Op::AssertEq {
                            var: "b".to_string(),
                            expected: 5,
                        },
                    )],
                ),
            ],
        }
    }
}

fn apply_op(ctx: &mut StepCtx<'_>, op: &Op, loc: &CodeLocation, base_dir: &Path) -> StepFlow {
    match op {
        Op::Set { var, value } => {
            ctx.set_var(var.clone(), *value);
            ctx.evidence(format!("{var} = {value}"));
            Ok(())
        }
        Op::Add { var, value } => {
            ctx.add_var(var, *value);
            ctx.evidence(format!("{var} += {value} -> {}", ctx.var(var)));
            Ok(())
        }
        Op::AddVar { var, other } => {
            let delta = ctx.var(other);
            ctx.add_var(var, delta);
            ctx.evidence(format!("{var} += {other} ({delta}) -> {}", ctx.var(var)));
            Ok(())
        }
        Op::AssertEq { var, expected } => {
            let actual = ctx.var(var);
            if actual == *expected {
                ctx.evidence(format!("{var} == {expected}"));
                Ok(())
            } else {
                Err(StepBreak::Failure(TestError::failure(
                    format!("{var} is {actual}, expected {expected}"),
                    Some(loc.clone()),
                )))
            }
        }
        Op::Fail { message } => Err(StepBreak::Failure(TestError::failure(
            message.clone(),
            Some(loc.clone()),
        ))),
        Op::KnownIssue { issue } => {
            ctx.known_issue(issue.to_issue(Some(loc.clone())));
            Ok(())
        }
        Op::Goto { target } => ctx.goto(target),
        Op::GotoIfLt {
            var,
            limit,
            target,
            else_target,
        } => {
            if ctx.var(var) < *limit {
                ctx.goto(target)
            } else if let Some(other) = else_target {
                ctx.goto(other)
            } else {
                Ok(())
            }
        }
        Op::SkipSection { target } => ctx.skip_section(target),
        Op::Call { path } => {
            let resolved = base_dir.join(path);
            let def = ScenarioFile::load(&resolved)?.into_definition(&resolved)?;
            ctx.subscenario(def)
        }
        Op::Exec {
            command,
            args,
            expect_exit,
        } => match std::process::Command::new(command).args(args).output() {
            Err(err) => Err(StepBreak::Exception(TestError::exception(
                format!("failed to spawn {command:?}: {err}"),
                Some(loc.clone()),
            ))),
            Ok(output) => {
                let code = output.status.code().unwrap_or(-1);
                ctx.evidence(format!("{command} exited with {code}"));
                let expected = expect_exit.unwrap_or(0);
                if code == expected {
                    Ok(())
                } else {
                    Err(StepBreak::Failure(TestError::failure(
                        format!("{command} exited with {code}, expected {expected}"),
                        Some(loc.clone()),
                    )))
                }
            }
        },
    }
}
