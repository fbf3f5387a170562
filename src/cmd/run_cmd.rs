//! CLI run plumbing (`scenarist run ...`, `scenarist report ...`).

use clap::Subcommand;

use std::path::PathBuf;

use crate::{
    find_matching_files, keys, ConfigValue, ErrorCode, FileConfig, RunContext, ScenarioConfig,
    ScenarioEngine, ScenarioFile, ScenarioReport, ScenaristError, ScenaristResult, Verdict,
};

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub doc_only: bool,
    pub continue_on_error: bool,
    /// Raw issue level values; named levels resolve against the config.
    pub issue_level_error: Option<String>,
    pub issue_level_ignored: Option<String>,
    pub delay_ms: Option<u64>,
    /// Explicit report path; only valid for a single scenario.
    pub report_to: Option<PathBuf>,
}

/// What one `run` invocation produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub reports: Vec<ScenarioReport>,
    pub report_paths: Vec<PathBuf>,
    pub code: ErrorCode,
}

/// Run every scenario file the globs match, sequentially, one engine each.
pub fn run_scenarios(
    file_config: &FileConfig,
    globs: &[String],
    options: &RunOptions,
) -> ScenaristResult<RunOutcome> {
    if globs.is_empty() {
        return Err(ScenaristError::InvalidArgument(
            "no scenario files given".to_string(),
        ));
    }
    let files = find_matching_files(globs)?;
    if files.is_empty() {
        return Err(ScenaristError::InputMissing(format!(
            "no scenario files match {globs:?}"
        )));
    }
    if options.report_to.is_some() && files.len() > 1 {
        return Err(ScenaristError::InvalidArgument(format!(
            "--report needs a single scenario, {} matched",
            files.len()
        )));
    }

    let config = layered_config(file_config, options)?;
    let mut reports = Vec::new();
    let mut report_paths = Vec::new();
    let mut codes = Vec::new();

    for path in &files {
        tracing::debug!(file = %path.display(), "running scenario file");
        let def = ScenarioFile::load(path)?.into_definition(path)?;
        let mut run = RunContext::new(config.clone());
        let report = ScenarioEngine::new(&mut run).run(def)?;

        let out_path = match &options.report_to {
            Some(p) => p.clone(),
            None => config
                .results_dir()
                .join(format!("{}.report.json", report.name)),
        };
        report.write_json(&out_path)?;

        codes.push(if report.verdict >= Verdict::Fail {
            ErrorCode::TestError
        } else {
            ErrorCode::Success
        });
        reports.push(report);
        report_paths.push(out_path);
    }

    Ok(RunOutcome {
        reports,
        report_paths,
        code: ErrorCode::worst(&codes),
    })
}

fn layered_config(file_config: &FileConfig, options: &RunOptions) -> ScenaristResult<ScenarioConfig> {
    let mut config = ScenarioConfig::new(file_config.clone());
    if options.doc_only {
        config.set_cli(keys::DOC_ONLY, ConfigValue::Bool(true));
    }
    if options.continue_on_error {
        config.set_cli(keys::CONTINUE_ON_ERROR, ConfigValue::Bool(true));
    }
    if let Some(ms) = options.delay_ms {
        config.set_cli(keys::DELAY_BETWEEN_STEPS_MS, ConfigValue::Int(ms as i64));
    }
    if let Some(raw) = &options.issue_level_error {
        let level = config.parse_issue_level(raw)?;
        config.set_cli(keys::ISSUE_LEVEL_ERROR, ConfigValue::Int(level));
    }
    if let Some(raw) = &options.issue_level_ignored {
        let level = config.parse_issue_level(raw)?;
        config.set_cli(keys::ISSUE_LEVEL_IGNORED, ConfigValue::Int(level));
    }
    Ok(config)
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Print a stored report.
    Show { path: PathBuf },
}

pub fn report_command(command: &ReportCommand, json: bool) -> ScenaristResult<String> {
    match command {
        ReportCommand::Show { path } => {
            let report = ScenarioReport::read_json(path)?;
            if json {
                Ok(serde_json::to_string_pretty(&report)?)
            } else {
                Ok(report.pretty())
            }
        }
    }
}

/// Write the starter config and example scenario.
pub fn init_project(force: bool) -> ScenaristResult<Vec<PathBuf>> {
    let mut written = Vec::new();

    let config_path = PathBuf::from("scenarist.toml");
    if config_path.exists() && !force {
        return Err(ScenaristError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }
    let config_toml = toml::to_string_pretty(&FileConfig::default())
        .map_err(|e| ScenaristError::Config(e.to_string()))?;
    std::fs::write(&config_path, config_toml)?;
    written.push(config_path);

    let scenario_path = PathBuf::from("arithmetic.scen.json");
    if scenario_path.exists() && !force {
        return Err(ScenaristError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            scenario_path.display()
        )));
    }
    let example = serde_json::to_string_pretty(&ScenarioFile::example())?;
    std::fs::write(&scenario_path, example)?;
    written.push(scenario_path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_globs_are_an_argument_error() {
        let err = run_scenarios(&FileConfig::default(), &[], &RunOptions::default()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ArgumentsError);
    }

    #[test]
    fn cli_layer_overrides_the_file() {
        let file = FileConfig {
            continue_on_error: false,
            ..FileConfig::default()
        };
        let options = RunOptions {
            continue_on_error: true,
            issue_level_error: Some("40".to_string()),
            ..RunOptions::default()
        };
        let config = layered_config(&file, &options).unwrap();
        assert!(config.continue_on_error());
        assert_eq!(config.issue_level_error(), Some(40));
    }

    #[test]
    fn bad_issue_level_is_rejected() {
        let options = RunOptions {
            issue_level_error: Some("NOPE".to_string()),
            ..RunOptions::default()
        };
        let err = layered_config(&FileConfig::default(), &options).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ArgumentsError);
    }
}
