//! Verdict accumulation over a scenario run.
//!
//! The accumulator collects execution records step by step, classifies
//! errors against the configured issue thresholds and decides when the run
//! must halt. Verdict aggregation is a `max` over the severity order.

use crate::{
    ActionResultDefinition, IssueClass, ScenarioConfig, ScenarioReport, StepDefinition, StepKind,
    TestError, TimeStats, Verdict,
};

/// What happened to a step during the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Never reached: after a halt, past a goto, or doc-only mode.
    NotExecuted,
    /// Jumped over by a section skip.
    Skipped,
    Executed,
}

/// One declared action or expected result, as it executed.
#[derive(Debug)]
pub struct ItemRecord {
    pub definition: ActionResultDefinition,
    pub executed: bool,
    pub evidence: Vec<String>,
    pub errors: Vec<TestError>,
    /// Reports of sub-scenarios launched from this item.
    pub subscenarios: Vec<ScenarioReport>,
}

impl ItemRecord {
    pub fn new(definition: ActionResultDefinition, executed: bool) -> Self {
        Self {
            definition,
            executed,
            evidence: Vec::new(),
            errors: Vec::new(),
            subscenarios: Vec::new(),
        }
    }
}

/// Execution record of one step.
#[derive(Debug)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub kind: StepKind,
    pub outcome: StepOutcome,
    pub time: TimeStats,
    pub items: Vec<ItemRecord>,
    pub errors: Vec<TestError>,
    pub warnings: Vec<TestError>,
}

impl StepRecord {
    fn new(index: usize, def: &StepDefinition, outcome: StepOutcome) -> Self {
        Self {
            index,
            name: def.name.clone(),
            description: def.description.clone(),
            kind: def.kind.clone(),
            outcome,
            time: TimeStats::default(),
            items: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        let mut verdict = if self.warnings.is_empty() {
            Verdict::Success
        } else {
            Verdict::Warnings
        };
        for error in &self.errors {
            verdict = verdict.worst(error_verdict(error));
        }
        verdict
    }
}

/// Exceptions outrank plain failures; known issues promoted to error count
/// as failures, not exceptions.
fn error_verdict(error: &TestError) -> Verdict {
    match error {
        TestError::Exception { .. } => Verdict::Errors,
        TestError::Failure { .. } | TestError::KnownIssue(_) => Verdict::Fail,
    }
}

/// Final scenario verdict with the aggregated error and warning lists, in
/// declaration order.
#[derive(Debug)]
pub struct VerdictSummary {
    pub verdict: Verdict,
    pub errors: Vec<TestError>,
    pub warnings: Vec<TestError>,
}

#[derive(Debug, Default)]
pub struct VerdictAccumulator {
    steps: Vec<StepRecord>,
    /// Index into `steps` of the step currently executing.
    current: Option<usize>,
    scenario_errors: Vec<TestError>,
    scenario_warnings: Vec<TestError>,
    halt: bool,
}

impl VerdictAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a failure or exception demands the run stop.
    pub fn halt_requested(&self) -> bool {
        self.halt
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn open_step(&mut self, index: usize, def: &StepDefinition) {
        let mut record = StepRecord::new(index, def, StepOutcome::Executed);
        record.time.start();
        self.current = Some(self.steps.len());
        self.steps.push(record);
    }

    pub fn close_step(&mut self) {
        if let Some(i) = self.current.take() {
            self.steps[i].time.stop();
        }
    }

    /// Record a step that was never entered, with its declared items so the
    /// report still shows the step's shape.
    pub fn record_unvisited(
        &mut self,
        index: usize,
        def: &StepDefinition,
        outcome: StepOutcome,
        items: Vec<ItemRecord>,
    ) {
        debug_assert_ne!(outcome, StepOutcome::Executed);
        let mut record = StepRecord::new(index, def, outcome);
        record.items = items;
        self.steps.push(record);
    }

    /// Record a declared action or result on the open step.
    pub fn record_item(&mut self, definition: ActionResultDefinition, executed: bool) {
        if let Some(i) = self.current {
            self.steps[i].items.push(ItemRecord::new(definition, executed));
        }
    }

    pub fn record_evidence(&mut self, text: impl Into<String>) {
        if let Some(item) = self.open_item() {
            item.evidence.push(text.into());
        }
    }

    pub fn record_subscenario(&mut self, report: ScenarioReport) {
        if let Some(item) = self.open_item() {
            item.subscenarios.push(report);
        }
    }

    /// Append declared items the body never reached, so the report shows
    /// the full declared shape of a partially executed step.
    pub fn fill_unexecuted_items(&mut self, declared: &[ActionResultDefinition]) {
        let Some(i) = self.current else { return };
        let step = &mut self.steps[i];
        for definition in declared {
            let present = step.items.iter().any(|item| {
                item.definition.kind == definition.kind
                    && item.definition.location == definition.location
            });
            if !present {
                step.items.push(ItemRecord::new(definition.clone(), false));
            }
        }
    }

    fn open_item(&mut self) -> Option<&mut ItemRecord> {
        let i = self.current?;
        self.steps[i].items.last_mut()
    }

    /// Classify and store an error.
    ///
    /// Known issues map through the configured thresholds: ignored ones are
    /// dropped before storage, and an issue already recorded on the same
    /// step is stored once. Only failures and exceptions can request a
    /// halt, and only when `continue_on_error` is off; a known issue
    /// promoted to error never halts.
    pub fn record_error(
        &mut self,
        error: TestError,
        config: &ScenarioConfig,
        continue_on_error: bool,
    ) {
        let (as_warning, halts) = match &error {
            TestError::KnownIssue(issue) => match issue.classify(config) {
                IssueClass::Ignored => return,
                IssueClass::Warning => (true, false),
                IssueClass::Error => (false, false),
            },
            TestError::Failure { .. } | TestError::Exception { .. } => (false, true),
        };

        match self.current {
            Some(i) => {
                let step = &mut self.steps[i];
                if error.is_known_issue()
                    && (step.errors.contains(&error) || step.warnings.contains(&error))
                {
                    return;
                }
                if let Some(item) = step.items.last_mut() {
                    item.errors.push(error.clone());
                }
                if as_warning {
                    step.warnings.push(error);
                } else {
                    step.errors.push(error);
                }
            }
            None => {
                if error.is_known_issue()
                    && (self.scenario_errors.contains(&error)
                        || self.scenario_warnings.contains(&error))
                {
                    return;
                }
                if as_warning {
                    self.scenario_warnings.push(error);
                } else {
                    self.scenario_errors.push(error);
                }
            }
        }

        if halts && !continue_on_error {
            self.halt = true;
        }
    }

    /// Aggregate the scenario verdict. Step records stay available for
    /// report building afterwards.
    pub fn finalize(&self) -> VerdictSummary {
        let mut verdict = Verdict::Success;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for error in &self.scenario_errors {
            verdict = verdict.worst(error_verdict(error));
            errors.push(error.clone());
        }
        if !self.scenario_warnings.is_empty() {
            verdict = verdict.worst(Verdict::Warnings);
            warnings.extend(self.scenario_warnings.iter().cloned());
        }
        for step in &self.steps {
            verdict = verdict.worst(step.verdict());
            errors.extend(step.errors.iter().cloned());
            warnings.extend(step.warnings.iter().cloned());
        }

        VerdictSummary {
            verdict,
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keys, ActionResultKind, CodeLocation, ConfigValue, KnownIssue};

    fn step(name: &str) -> StepDefinition {
        StepDefinition::body(name, name, Box::new(|_ctx| Ok(())))
    }

    fn failure(msg: &str) -> TestError {
        TestError::failure(msg, None)
    }

    #[test]
    fn failure_halts_unless_continue_on_error() {
        let cfg = ScenarioConfig::default();
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_error(failure("boom"), &cfg, true);
        assert!(!acc.halt_requested());
        acc.record_error(failure("boom again"), &cfg, false);
        assert!(acc.halt_requested());
        acc.close_step();
        assert_eq!(acc.finalize().verdict, Verdict::Fail);
    }

    #[test]
    fn exception_outranks_failure() {
        let cfg = ScenarioConfig::default();
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_error(failure("check failed"), &cfg, true);
        acc.record_error(TestError::exception("panicked", None), &cfg, true);
        acc.close_step();
        assert_eq!(acc.finalize().verdict, Verdict::Errors);
    }

    #[test]
    fn known_issue_as_error_never_halts() {
        let mut cfg = ScenarioConfig::default();
        cfg.set(keys::ISSUE_LEVEL_ERROR, ConfigValue::Int(10));
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_error(
            TestError::KnownIssue(KnownIssue::new("tracked").with_level(50)),
            &cfg,
            false,
        );
        assert!(!acc.halt_requested());
        acc.close_step();
        let summary = acc.finalize();
        assert_eq!(summary.verdict, Verdict::Fail);
        assert_eq!(summary.errors.len(), 1);
    }

    #[test]
    fn ignored_issue_is_dropped_before_storage() {
        let mut cfg = ScenarioConfig::default();
        cfg.set(keys::ISSUE_LEVEL_IGNORED, ConfigValue::Int(10));
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_error(
            TestError::KnownIssue(KnownIssue::new("minor").with_level(5)),
            &cfg,
            false,
        );
        acc.close_step();
        let summary = acc.finalize();
        assert_eq!(summary.verdict, Verdict::Success);
        assert!(summary.errors.is_empty() && summary.warnings.is_empty());
    }

    #[test]
    fn duplicate_known_issue_stored_once() {
        let cfg = ScenarioConfig::default();
        let issue = KnownIssue::new("flaky").with_id("#7");
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_error(TestError::KnownIssue(issue.clone()), &cfg, false);
        acc.record_error(TestError::KnownIssue(issue), &cfg, false);
        acc.close_step();
        assert_eq!(acc.finalize().warnings.len(), 1);
    }

    #[test]
    fn not_executed_steps_stay_distinct_from_failed() {
        let cfg = ScenarioConfig::default();
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_error(failure("boom"), &cfg, false);
        acc.close_step();
        acc.record_unvisited(1, &step("020"), StepOutcome::NotExecuted, Vec::new());
        let steps = acc.steps();
        assert_eq!(steps[0].outcome, StepOutcome::Executed);
        assert_eq!(steps[0].verdict(), Verdict::Fail);
        assert_eq!(steps[1].outcome, StepOutcome::NotExecuted);
        assert_eq!(steps[1].verdict(), Verdict::Success);
    }

    #[test]
    fn evidence_lands_on_the_open_item() {
        let cfg = ScenarioConfig::default();
        let mut acc = VerdictAccumulator::new();
        acc.open_step(0, &step("010"));
        acc.record_item(
            ActionResultDefinition {
                kind: ActionResultKind::Action,
                description: "do the thing".to_string(),
                location: CodeLocation {
                    file: "t.rs".to_string(),
                    line: 1,
                },
            },
            true,
        );
        acc.record_evidence("it happened");
        acc.record_error(failure("but wrong"), &cfg, true);
        acc.close_step();
        let item = &acc.steps()[0].items[0];
        assert_eq!(item.evidence, vec!["it happened".to_string()]);
        assert_eq!(item.errors.len(), 1);
    }
}
