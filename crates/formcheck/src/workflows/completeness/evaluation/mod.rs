mod checks;
mod config;

pub use config::EngineSettings;

use super::domain::FormFields;
use super::formula::FormulaError;
use super::issue::{CheckSelection, CheckType, Issue};
use super::report::CheckSummary;
use super::rules::{Rule, RuleSet};
use checks::CheckContext;
use serde::{Deserialize, Serialize};

/// Stateless evaluator applying a rule set to extracted form fields.
///
/// Evaluation performs no I/O and is deterministic: the same fields, rule set and selection
/// always yield the same ordered issues.
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine {
    settings: EngineSettings,
}

impl EvaluationEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn evaluate(
        &self,
        fields: &FormFields,
        rule_set: &RuleSet,
        selection: &CheckSelection,
    ) -> EvaluationOutcome {
        let ctx = CheckContext {
            fields,
            rule_set,
            settings: &self.settings,
        };
        let mut outcome = EvaluationOutcome::default();

        for check_type in selection.iter() {
            for rule in rule_set
                .rules
                .iter()
                .filter(|rule| rule.check_type() == check_type)
            {
                match rule {
                    Rule::RequiredField(rule) => {
                        outcome.issues.extend(checks::required_field(&ctx, rule));
                    }
                    Rule::Calculation(rule) => match checks::calculation(&ctx, rule) {
                        Ok(issue) => outcome.issues.extend(issue),
                        Err(error) => {
                            let skipped = match error {
                                FormulaError::Overflow => "skipped formula",
                                _ => "skipped malformed formula",
                            };
                            outcome.warnings.push(ConfigWarning {
                                rule_name: rule.name.clone(),
                                check_type,
                                message: format!("{skipped} '{}': {error}", rule.formula),
                            });
                        }
                    },
                    Rule::CrossReference(rule) => {
                        outcome.issues.extend(checks::cross_reference(&ctx, rule));
                    }
                    Rule::Jurisdiction(rule) => {
                        outcome.issues.extend(checks::jurisdiction(&ctx, rule));
                    }
                }
            }
        }

        outcome
    }

    /// Configuration warnings a rule set would raise, independent of any document.
    pub fn lint(&self, rule_set: &RuleSet) -> Vec<ConfigWarning> {
        self.evaluate(&FormFields::default(), rule_set, &CheckSelection::all())
            .warnings
    }
}

/// Rule definition problem detected while evaluating; never tied to document data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub rule_name: String,
    pub check_type: CheckType,
    pub message: String,
}

/// Issues in evaluation order plus any configuration warnings raised along the way.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub issues: Vec<Issue>,
    pub warnings: Vec<ConfigWarning>,
}

impl EvaluationOutcome {
    pub fn summary(&self) -> CheckSummary {
        CheckSummary::from_issues(&self.issues)
    }

    pub fn issues_for(&self, check_type: CheckType) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.check_type == check_type)
            .count()
    }
}
