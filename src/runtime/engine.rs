//! Scenario execution engine.
//!
//! One engine runs one scenario on the calling thread. Sub-scenarios run
//! through a nested engine sharing the same run context, so configuration,
//! handlers and the variable store are common to the whole tree.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::{
    ActionResultDefinition, ActionResultKind, CodeLocation, EventInfo, ExecutionCursor,
    HandlerRegistry, ItemRecord, Jump, KnownIssue, ScenarioConfig, ScenarioDefinition,
    ScenarioEvent, ScenarioReport, ScenaristError, ScenaristResult, StatisticsTracker, StepBreak,
    StepDefinition, StepFlow, StepKind, StepOutcome, StepReport, StepStore, TestError, Verdict,
    VerdictAccumulator,
};

/// What a step body call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Collect declarations; gates return `false`, nothing executes.
    Build,
    /// Documentation traversal; bodies are never entered.
    DocOnly,
    /// The real thing.
    Execute,
}

/// Per-run state shared across an engine and its sub-engines.
#[derive(Debug, Default)]
pub struct RunContext {
    pub config: ScenarioConfig,
    pub handlers: HandlerRegistry,
    /// Integer variable store shared by all scenarios of the run.
    pub vars: BTreeMap<String, i64>,
}

impl RunContext {
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            vars: BTreeMap::new(),
        }
    }
}

/// The API a step body sees.
pub struct StepCtx<'a> {
    run: &'a mut RunContext,
    store: &'a mut StepStore,
    cursor: &'a mut ExecutionCursor,
    acc: &'a mut VerdictAccumulator,
    tracker: &'a mut StatisticsTracker,
    declarations: &'a mut Vec<Vec<ActionResultDefinition>>,
    mode: ExecutionMode,
    step_index: usize,
    continue_on_error: bool,
}

impl StepCtx<'_> {
    /// Declare an action. Returns `true` only when the action should really
    /// execute, so bodies read uniformly in every mode:
    /// `if ctx.action("press") { ... }` style gating.
    #[track_caller]
    pub fn action(&mut self, description: impl Into<String>) -> bool {
        self.declare(ActionResultKind::Action, description.into(), CodeLocation::caller())
    }

    /// Declare an expected result. Same gating contract as [`action`].
    ///
    /// [`action`]: StepCtx::action
    #[track_caller]
    pub fn result(&mut self, description: impl Into<String>) -> bool {
        self.declare(ActionResultKind::Result, description.into(), CodeLocation::caller())
    }

    /// Declare an action at an explicit location, for callers that front a
    /// non-Rust scenario source and carry their own positions.
    pub fn action_at(&mut self, description: impl Into<String>, location: CodeLocation) -> bool {
        self.declare(ActionResultKind::Action, description.into(), location)
    }

    pub fn result_at(&mut self, description: impl Into<String>, location: CodeLocation) -> bool {
        self.declare(ActionResultKind::Result, description.into(), location)
    }

    fn declare(&mut self, kind: ActionResultKind, description: String, location: CodeLocation) -> bool {
        let definition = ActionResultDefinition {
            kind,
            description,
            location,
        };
        match self.mode {
            ExecutionMode::Build => {
                self.declarations[self.step_index].push(definition);
                false
            }
            ExecutionMode::DocOnly => false,
            ExecutionMode::Execute => {
                self.acc.record_item(definition, true);
                self.cursor.advance_item();
                true
            }
        }
    }

    /// Attach evidence text to the current action or result.
    pub fn evidence(&mut self, text: impl Into<String>) {
        if self.mode == ExecutionMode::Execute {
            self.acc.record_evidence(text);
        }
    }

    /// Fail the step.
    #[track_caller]
    pub fn fail(&mut self, message: impl Into<String>) -> StepFlow {
        if self.mode != ExecutionMode::Execute {
            return Ok(());
        }
        Err(StepBreak::Failure(TestError::failure(
            message,
            Some(CodeLocation::caller()),
        )))
    }

    /// Check a condition; a false condition fails the step.
    #[track_caller]
    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> StepFlow {
        if self.mode != ExecutionMode::Execute || condition {
            return Ok(());
        }
        Err(StepBreak::Failure(TestError::failure(
            message,
            Some(CodeLocation::caller()),
        )))
    }

    #[track_caller]
    pub fn check_eq<T: PartialEq + std::fmt::Debug>(
        &mut self,
        actual: T,
        expected: T,
        message: impl Into<String>,
    ) -> StepFlow {
        if self.mode != ExecutionMode::Execute || actual == expected {
            return Ok(());
        }
        Err(StepBreak::Failure(TestError::failure(
            format!("{}: got {actual:?}, expected {expected:?}", message.into()),
            Some(CodeLocation::caller()),
        )))
    }

    /// Register a known issue.
    ///
    /// During the build pass the issue attaches to the step definition and
    /// is reported even before the step executes; at execution time it is
    /// classified and recorded immediately.
    #[track_caller]
    pub fn known_issue(&mut self, issue: KnownIssue) {
        let issue = match issue.location {
            Some(_) => issue,
            None => issue.with_location(CodeLocation::caller()),
        };
        match self.mode {
            ExecutionMode::Build => {
                if let Some(step) = self.store.step_at_mut(self.step_index) {
                    step.known_issues.push(issue);
                }
            }
            ExecutionMode::DocOnly => {}
            ExecutionMode::Execute => {
                self.acc.record_error(
                    TestError::KnownIssue(issue),
                    &self.run.config,
                    self.continue_on_error,
                );
            }
        }
    }

    /// Jump to a named step at the next step boundary. The rest of the
    /// current body still evaluates.
    pub fn goto(&mut self, name: &str) -> StepFlow {
        if self.mode != ExecutionMode::Execute {
            return Ok(());
        }
        let target = self.store.resolve(name)?;
        tracing::debug!(to = name, "goto requested");
        self.cursor.request_goto(target);
        Ok(())
    }

    /// Skip to just past the end of a named section. Intervening steps are
    /// reported skipped.
    pub fn skip_section(&mut self, name: &str) -> StepFlow {
        if self.mode != ExecutionMode::Execute {
            return Ok(());
        }
        let begin = self.store.resolve(name)?;
        let end = self.store.section_end_index(begin)?;
        tracing::debug!(section = name, "section skip requested");
        self.cursor.request_skip(end + 1);
        Ok(())
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: i64) {
        self.run.vars.insert(name.into(), value);
    }

    pub fn add_var(&mut self, name: &str, delta: i64) {
        *self.run.vars.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn var(&self, name: &str) -> i64 {
        self.run.vars.get(name).copied().unwrap_or(0)
    }

    /// Append a generated step after the current one. Indices already
    /// handed out stay valid; the new step's declarations are discovered
    /// when it executes.
    pub fn append_step(&mut self, step: StepDefinition) -> StepFlow {
        self.store.register(step)?;
        self.declarations.push(Vec::new());
        Ok(())
    }

    /// Run a sub-scenario in place. Its report attaches to the current
    /// action or result and its counters fold into the caller's, so the
    /// top-level statistics cover the whole tree; a failing child fails the
    /// calling step with the child's severity, never downgraded.
    #[track_caller]
    pub fn subscenario(&mut self, def: ScenarioDefinition) -> StepFlow {
        if self.mode != ExecutionMode::Execute {
            return Ok(());
        }
        let location = CodeLocation::caller();
        let report = ScenarioEngine::new(self.run).run(def)?;
        let verdict = report.verdict;
        let name = report.name.clone();
        self.tracker.fold_child(report.statistics);
        self.acc.record_subscenario(report);
        match verdict {
            Verdict::Success | Verdict::Warnings => Ok(()),
            Verdict::Fail => Err(StepBreak::Failure(TestError::failure(
                format!("sub-scenario {name:?} failed"),
                Some(location),
            ))),
            Verdict::Errors => Err(StepBreak::Exception(TestError::exception(
                format!("sub-scenario {name:?} ended in errors"),
                Some(location),
            ))),
        }
    }
}

/// Runs one scenario to completion and produces its report.
pub struct ScenarioEngine<'r> {
    run: &'r mut RunContext,
    store: StepStore,
    cursor: ExecutionCursor,
    acc: VerdictAccumulator,
    tracker: StatisticsTracker,
    declarations: Vec<Vec<ActionResultDefinition>>,
    visited: Vec<bool>,
    continue_on_error: bool,
}

impl<'r> ScenarioEngine<'r> {
    pub fn new(run: &'r mut RunContext) -> Self {
        Self {
            run,
            store: StepStore::new(),
            cursor: ExecutionCursor::new(),
            acc: VerdictAccumulator::new(),
            tracker: StatisticsTracker::default(),
            declarations: Vec::new(),
            visited: Vec::new(),
            continue_on_error: false,
        }
    }

    /// Run the scenario: build pass, then doc traversal or execution, then
    /// finalization. Returns the report; `Err` means a framework fault, not
    /// a test failure.
    pub fn run(mut self, def: ScenarioDefinition) -> ScenaristResult<ScenarioReport> {
        let ScenarioDefinition {
            name,
            description,
            attributes,
            continue_on_error,
            known_issues,
            steps,
        } = def;
        self.continue_on_error =
            continue_on_error.unwrap_or_else(|| self.run.config.continue_on_error());

        for step in steps {
            self.store.register(step)?;
            self.declarations.push(Vec::new());
        }

        tracing::debug!(scenario = %name, steps = self.store.len(), "scenario starting");
        self.tracker.begin();
        self.fire(ScenarioEvent::BeforeScenario, &name, None, None)?;

        // Scenario-level known issues land before any step record.
        for issue in known_issues {
            self.acc.record_error(
                TestError::KnownIssue(issue),
                &self.run.config,
                self.continue_on_error,
            );
        }

        self.build_pass()?;

        let fault = if self.run.config.doc_only() {
            self.doc_traversal();
            Ok(())
        } else {
            self.execute_loop(&name)
        };

        // Finalize exactly once, fault or not, so the AfterScenario
        // handlers always see a closed run.
        self.cursor.finish();
        self.record_unvisited_tail();
        self.tracker.end();
        let after = self.fire(ScenarioEvent::AfterScenario, &name, None, None);
        fault?;
        after?;

        let summary = self.acc.finalize();
        tracing::debug!(scenario = %name, verdict = %summary.verdict, "scenario done");

        let mut report = ScenarioReport::new(name);
        report.description = description;
        report.attributes = attributes;
        report.verdict = summary.verdict;
        report.errors = summary.errors;
        report.warnings = summary.warnings;
        report.time = self.tracker.time.clone();
        report.steps = self.acc.steps().iter().map(StepReport::from_record).collect();
        report.statistics = self.tracker.stats;
        Ok(report)
    }

    /// Run every body once with gates off to collect declarations and
    /// definition-time known issues.
    fn build_pass(&mut self) -> ScenaristResult<()> {
        for index in 0..self.store.len() {
            let Some(mut body) = self.store.take_body(index) else {
                continue;
            };
            let outcome = {
                let mut ctx = self.step_ctx(index, ExecutionMode::Build);
                catch_unwind(AssertUnwindSafe(|| body(&mut ctx)))
            };
            self.store.put_body(index, body);
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(StepBreak::Fatal(err))) => return Err(err),
                Ok(Err(_)) => {
                    return Err(ScenaristError::Definition(format!(
                        "step #{index} broke during the build pass"
                    )))
                }
                Err(payload) => {
                    return Err(ScenaristError::Definition(format!(
                        "step #{index} panicked during the build pass: {}",
                        panic_message(payload)
                    )))
                }
            }
        }
        Ok(())
    }

    /// Doc-only traversal: every step appears with its declared shape, but
    /// nothing executes and statistics carry totals only.
    fn doc_traversal(&mut self) {
        for index in 0..self.store.len() {
            let Some(step) = self.store.step_at(index) else {
                break;
            };
            let items: Vec<ItemRecord> = self.declarations[index]
                .iter()
                .map(|d| ItemRecord::new(d.clone(), false))
                .collect();
            if step.kind == StepKind::Body {
                self.tracker.count_step(false);
                for d in &self.declarations[index] {
                    match d.kind {
                        ActionResultKind::Action => self.tracker.count_action(false),
                        ActionResultKind::Result => self.tracker.count_result(false),
                    }
                }
            }
            self.acc
                .record_unvisited(index, step, StepOutcome::NotExecuted, items);
            self.mark_visited(index);
        }
    }

    fn execute_loop(&mut self, scenario: &str) -> ScenaristResult<()> {
        let delay = self.run.config.delay_between_steps();
        loop {
            if self.acc.halt_requested() {
                tracing::debug!(scenario, "halting on error");
                break;
            }
            let Some(index) = self.cursor.current_step() else {
                break;
            };
            if self.store.step_at(index).is_none() {
                break;
            }
            self.run_one_step(scenario, index)?;
            if let Some(Jump::Skip { resume_at }) = self.cursor.pending() {
                self.mark_skipped_range(index + 1, resume_at);
            }
            self.cursor.leave_step();
            if !delay.is_zero() && self.cursor.current_step().is_some() {
                std::thread::sleep(delay);
            }
        }
        Ok(())
    }

    fn run_one_step(&mut self, scenario: &str, index: usize) -> ScenaristResult<()> {
        self.mark_visited(index);
        let (step_name, is_body, step_issues) = {
            let step = self.store.step_at(index).ok_or_else(|| {
                ScenaristError::Definition(format!("step #{index} vanished mid-run"))
            })?;
            (
                step.name.clone(),
                step.kind == StepKind::Body,
                step.known_issues.clone(),
            )
        };

        if !is_body {
            // Markers traverse without executing and without handler
            // involvement.
            let step = self.store.step_at(index).map(clone_meta);
            if let Some(step) = step {
                self.acc.open_step(index, &step);
                self.acc.close_step();
            }
            return Ok(());
        }

        tracing::debug!(scenario, step = %step_name, "step starting");
        self.fire(ScenarioEvent::BeforeStep, scenario, Some(&step_name), None)?;

        self.cursor.enter_step();
        let meta = self.store.step_at(index).map(clone_meta).ok_or_else(|| {
            ScenaristError::Definition(format!("step #{index} vanished mid-run"))
        })?;
        self.acc.open_step(index, &meta);
        for issue in step_issues {
            self.acc.record_error(
                TestError::KnownIssue(issue),
                &self.run.config,
                self.continue_on_error,
            );
        }

        let mut fatal = None;
        if let Some(mut body) = self.store.take_body(index) {
            let outcome = {
                let mut ctx = self.step_ctx(index, ExecutionMode::Execute);
                catch_unwind(AssertUnwindSafe(|| body(&mut ctx)))
            };
            self.store.put_body(index, body);
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(StepBreak::Failure(e))) | Ok(Err(StepBreak::Exception(e))) => Some(e),
                Ok(Err(StepBreak::Fatal(err))) => {
                    fatal = Some(err);
                    None
                }
                Err(payload) => Some(TestError::exception(panic_message(payload), None)),
            };
            if let Some(error) = error {
                self.acc
                    .record_error(error.clone(), &self.run.config, self.continue_on_error);
                self.fire(ScenarioEvent::Error, scenario, Some(&step_name), Some(&error))?;
            }
        }

        let declared = self.declarations[index].clone();
        self.acc.fill_unexecuted_items(&declared);
        self.count_closed_step(index);
        self.acc.close_step();

        if let Some(err) = fatal {
            return Err(err);
        }
        self.fire(ScenarioEvent::AfterStep, scenario, Some(&step_name), None)?;
        Ok(())
    }

    /// Fold the just-closed step's item records into the counters.
    fn count_closed_step(&mut self, index: usize) {
        self.tracker.count_step(true);
        let Some(record) = self
            .acc
            .steps()
            .iter()
            .rev()
            .find(|r| r.index == index && r.outcome == StepOutcome::Executed)
        else {
            return;
        };
        let mut failed = false;
        let mut counts = Vec::with_capacity(record.items.len());
        for item in &record.items {
            counts.push((item.definition.kind, item.executed));
        }
        if !record.errors.is_empty() {
            failed = true;
        }
        for (kind, executed) in counts {
            match kind {
                ActionResultKind::Action => self.tracker.count_action(executed),
                ActionResultKind::Result => self.tracker.count_result(executed),
            }
        }
        if failed {
            self.tracker.count_failed_step();
        }
    }

    fn mark_skipped_range(&mut self, from: usize, to: usize) {
        for index in from..to.min(self.store.len()) {
            if self.is_visited(index) {
                continue;
            }
            self.mark_visited(index);
            let Some(step) = self.store.step_at(index).map(clone_meta) else {
                continue;
            };
            let items: Vec<ItemRecord> = self.declarations[index]
                .iter()
                .map(|d| ItemRecord::new(d.clone(), false))
                .collect();
            if step.kind == StepKind::Body {
                self.tracker.count_skipped_step();
            }
            self.acc
                .record_unvisited(index, &step, StepOutcome::Skipped, items);
        }
    }

    /// Steps never reached are reported not-executed, distinct from both
    /// executed-and-failed and skipped.
    fn record_unvisited_tail(&mut self) {
        for index in 0..self.store.len() {
            if self.is_visited(index) {
                continue;
            }
            let Some(step) = self.store.step_at(index).map(clone_meta) else {
                continue;
            };
            let items: Vec<ItemRecord> = self.declarations[index]
                .iter()
                .map(|d| ItemRecord::new(d.clone(), false))
                .collect();
            if step.kind == StepKind::Body {
                self.tracker.count_step(false);
            }
            self.acc
                .record_unvisited(index, &step, StepOutcome::NotExecuted, items);
        }
    }

    fn step_ctx(&mut self, index: usize, mode: ExecutionMode) -> StepCtx<'_> {
        StepCtx {
            run: &mut *self.run,
            store: &mut self.store,
            cursor: &mut self.cursor,
            acc: &mut self.acc,
            tracker: &mut self.tracker,
            declarations: &mut self.declarations,
            mode,
            step_index: index,
            continue_on_error: self.continue_on_error,
        }
    }

    fn fire(
        &mut self,
        event: ScenarioEvent,
        scenario: &str,
        step: Option<&str>,
        error: Option<&TestError>,
    ) -> ScenaristResult<()> {
        self.run.handlers.fire(&EventInfo {
            event,
            scenario,
            step,
            error,
        })
    }

    fn mark_visited(&mut self, index: usize) {
        if self.visited.len() <= index {
            self.visited.resize(index + 1, false);
        }
        self.visited[index] = true;
    }

    fn is_visited(&self, index: usize) -> bool {
        self.visited.get(index).copied().unwrap_or(false)
    }
}

/// Clone a step's metadata without its body.
fn clone_meta(step: &StepDefinition) -> StepDefinition {
    StepDefinition {
        name: step.name.clone(),
        description: step.description.clone(),
        kind: step.kind.clone(),
        known_issues: step.known_issues.clone(),
        body: None,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("step body panicked")
    }
}
