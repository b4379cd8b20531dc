use clap::Args;
use formcheck::config::AppConfig;
use formcheck::error::AppError;
use formcheck::workflows::completeness::{
    write_issues_csv, CheckSelection, CheckType, EvaluationEngine, EvaluationOutcome, FormFields,
    RuleSet,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// JSON object of extracted field values
    #[arg(long)]
    pub(crate) fields: PathBuf,
    /// JSON rule set for the form being checked
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// Comma separated check types (defaults to all four)
    #[arg(long, value_parser = CheckSelection::parse)]
    pub(crate) check_types: Option<CheckSelection>,
    /// Write the issues to a CSV file
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub(crate) fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let CheckArgs {
        fields,
        rules,
        check_types,
        csv,
    } = args;

    let config = AppConfig::load()?;
    let fields: FormFields = read_json(&fields)?;
    let rule_set: RuleSet = read_json(&rules)?;
    let selection = check_types.unwrap_or_default();

    let engine = EvaluationEngine::new(config.checks.engine_settings());
    let outcome = engine.evaluate(&fields, &rule_set, &selection);

    for line in render_outcome(&rule_set, &selection, &outcome) {
        println!("{line}");
    }

    if let Some(path) = csv {
        write_issues_csv(File::create(&path)?, &outcome.issues)?;
        println!("\nIssues exported to {}", path.display());
    }

    Ok(())
}

fn render_outcome(
    rule_set: &RuleSet,
    selection: &CheckSelection,
    outcome: &EvaluationOutcome,
) -> Vec<String> {
    let summary = outcome.summary();
    let checks: Vec<&str> = selection.iter().map(|check| check.as_str()).collect();

    let mut lines = vec![
        format!("Completeness check for {}", rule_set.key),
        format!("- checks: {}", checks.join(", ")),
        format!(
            "- {} issues ({} critical | {} high | {} medium | {} low)",
            summary.total_issues,
            summary.critical_issues,
            summary.high_priority_issues,
            summary.medium_priority_issues,
            summary.low_priority_issues
        ),
    ];

    if !outcome.issues.is_empty() {
        lines.push("Issues:".to_string());
        for issue in &outcome.issues {
            let mut line = format!(
                "  - [{}] {} {}: {}",
                issue.severity, issue.check_type, issue.field_name, issue.issue_description
            );
            if issue.check_type == CheckType::Calculations {
                line.push_str(&format!(
                    " (expected {}, found {})",
                    issue.expected_value, issue.actual_value
                ));
            }
            lines.push(line);
        }
    }

    if !outcome.warnings.is_empty() {
        lines.push("Rule configuration warnings:".to_string());
        for warning in &outcome.warnings {
            lines.push(format!(
                "  - {} ({}): {}",
                warning.rule_name, warning.check_type, warning.message
            ));
        }
    }

    lines
}
