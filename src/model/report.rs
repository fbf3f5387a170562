//! Execution reports: the persisted JSON document and its text rendering.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::{
    ActionResultKind, ItemRecord, ScenarioStats, ScenaristError, ScenaristResult, StepKind,
    StepOutcome, StepRecord, TestError, TimeStats, Verdict,
};

pub const REPORT_SCHEMA_VERSION: &str = "scenarist.report.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Executed,
    Skipped,
    NotExecuted,
}

impl From<StepOutcome> for StepStatus {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Executed => StepStatus::Executed,
            StepOutcome::Skipped => StepStatus::Skipped,
            StepOutcome::NotExecuted => StepStatus::NotExecuted,
        }
    }
}

/// One declared action or result, as executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub kind: ActionResultKind,
    pub description: String,
    pub location: String,
    pub executed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TestError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscenarios: Vec<ScenarioReport>,
}

impl ItemReport {
    fn from_record(record: &ItemRecord) -> Self {
        Self {
            kind: record.definition.kind,
            description: record.definition.description.clone(),
            location: record.definition.location.to_long_string(),
            executed: record.executed,
            evidence: record.evidence.clone(),
            errors: record.errors.clone(),
            subscenarios: record.subscenarios.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub number: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(flatten)]
    pub kind: StepKind,
    pub status: StepStatus,
    pub verdict: Verdict,
    pub time: TimeStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TestError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TestError>,
}

impl StepReport {
    pub fn from_record(record: &StepRecord) -> Self {
        Self {
            number: record.index + 1,
            name: record.name.clone(),
            description: record.description.clone(),
            kind: record.kind.clone(),
            status: record.outcome.into(),
            verdict: record.verdict(),
            time: record.time.clone(),
            items: record.items.iter().map(ItemReport::from_record).collect(),
            errors: record.errors.clone(),
            warnings: record.warnings.clone(),
        }
    }
}

/// The persisted execution report, `schemaVersion: "scenarist.report.v1"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub schema_version: String,
    pub run_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TestError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TestError>,
    pub time: TimeStats,
    pub steps: Vec<StepReport>,
    pub statistics: ScenarioStats,
}

impl ScenarioReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            attributes: BTreeMap::new(),
            verdict: Verdict::Success,
            errors: Vec::new(),
            warnings: Vec::new(),
            time: TimeStats::default(),
            steps: Vec::new(),
            statistics: ScenarioStats::default(),
        }
    }

    pub fn write_json(&self, path: &Path) -> ScenaristResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> ScenaristResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let report: ScenarioReport = serde_json::from_str(&raw)?;
        if report.schema_version != REPORT_SCHEMA_VERSION {
            return Err(ScenaristError::Report(format!(
                "unsupported schema version {:?} (expected {REPORT_SCHEMA_VERSION:?})",
                report.schema_version
            )));
        }
        Ok(report)
    }

    /// Deterministic text rendering: declaration order, no timestamps or
    /// run ids, so two runs of the same scenario shape render identically.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SCENARIO {} [{}]", self.name, self.verdict);
        if !self.description.is_empty() {
            let _ = writeln!(out, "  {}", self.description);
        }
        for (key, value) in &self.attributes {
            let _ = writeln!(out, "  @{key}: {value}");
        }
        for step in &self.steps {
            self.render_step(&mut out, step, 1);
        }
        let _ = writeln!(
            out,
            "  stats: steps {} / actions {} / results {}",
            self.statistics.steps, self.statistics.actions, self.statistics.results
        );
        for error in &self.errors {
            let _ = writeln!(out, "  ERROR: {error}");
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "  WARNING: {warning}");
        }
        out
    }

    fn render_step(&self, out: &mut String, step: &StepReport, depth: usize) {
        let pad = "  ".repeat(depth);
        let status = match step.status {
            StepStatus::Executed => "",
            StepStatus::Skipped => " (skipped)",
            StepStatus::NotExecuted => " (not executed)",
        };
        let _ = writeln!(
            out,
            "{pad}STEP#{} {}: {} [{}]{status}",
            step.number, step.name, step.description, step.verdict
        );
        for item in &step.items {
            let mark = if item.executed { "" } else { " (not executed)" };
            let _ = writeln!(out, "{pad}  {} {}{mark}", item.kind, item.description);
            for line in &item.evidence {
                let _ = writeln!(out, "{pad}    evidence: {line}");
            }
            for error in &item.errors {
                let _ = writeln!(out, "{pad}    !! {error}");
            }
            for sub in &item.subscenarios {
                let _ = writeln!(out, "{pad}    SUBSCENARIO {} [{}]", sub.name, sub.verdict);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScenarioReport {
        let mut report = ScenarioReport::new("sample");
        report.description = "a sample".to_string();
        report.verdict = Verdict::Warnings;
        report.steps.push(StepReport {
            number: 1,
            name: "010".to_string(),
            description: "first".to_string(),
            kind: StepKind::Body,
            status: StepStatus::Executed,
            verdict: Verdict::Success,
            time: TimeStats::default(),
            items: vec![ItemReport {
                kind: ActionResultKind::Action,
                description: "do x".to_string(),
                location: "demo.rs:10".to_string(),
                executed: true,
                evidence: vec!["x done".to_string()],
                errors: Vec::new(),
                subscenarios: Vec::new(),
            }],
            errors: Vec::new(),
            warnings: Vec::new(),
        });
        report
    }

    #[test]
    fn json_round_trip() {
        let report = sample();
        let dir = std::env::temp_dir().join(format!("scenarist-report-{}", report.run_id));
        let path = dir.join("sample.json");
        report.write_json(&path).unwrap();
        let back = ScenarioReport::read_json(&path).unwrap();
        assert_eq!(back.name, report.name);
        assert_eq!(back.verdict, report.verdict);
        assert_eq!(back.statistics, report.statistics);
        assert_eq!(back.steps.len(), 1);
        assert_eq!(back.steps[0].items[0].evidence, vec!["x done".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn schema_version_is_checked() {
        let mut report = sample();
        report.schema_version = "scenarist.report.v0".to_string();
        let dir = std::env::temp_dir().join(format!("scenarist-badschema-{}", report.run_id));
        let path = dir.join("bad.json");
        report.write_json(&path).unwrap();
        assert!(ScenarioReport::read_json(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn pretty_is_timestamp_free() {
        let mut report = sample();
        report.time.start = Some("2026-01-01T00:00:00Z".to_string());
        let text = report.pretty();
        assert!(text.contains("SCENARIO sample [WARNINGS]"));
        assert!(text.contains("STEP#1 010: first [SUCCESS]"));
        assert!(!text.contains("2026-01-01"));
        assert!(!text.contains(&report.run_id));
    }

    #[test]
    fn step_kind_flattens_into_the_step_object() {
        let mut report = sample();
        report.steps[0].kind = StepKind::SectionBegin {
            end: "s-end".to_string(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["kind"], "sectionBegin");
        assert_eq!(json["steps"][0]["end"], "s-end");
    }
}
