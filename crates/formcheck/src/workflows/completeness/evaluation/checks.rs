use rust_decimal::{Decimal, RoundingStrategy};

use super::super::domain::{FormFields, FormKey};
use super::super::formula::{Formula, FormulaError};
use super::super::issue::{CheckType, Issue, IssueStatus, Severity};
use super::super::rules::{
    CalculationRule, CrossReferenceRule, CrossRelation, JurisdictionConstraint, JurisdictionRule,
    RequiredFieldRule, RuleSet,
};
use super::config::EngineSettings;

pub(crate) struct CheckContext<'a> {
    pub fields: &'a FormFields,
    pub rule_set: &'a RuleSet,
    pub settings: &'a EngineSettings,
}

impl CheckContext<'_> {
    fn key(&self) -> &FormKey {
        &self.rule_set.key
    }

    fn within_tolerance(&self, left: Decimal, right: Decimal) -> bool {
        left.saturating_sub(right).abs() <= self.settings.tolerance
    }

    fn amount(&self, name: &str) -> Decimal {
        self.fields.number_or_zero(name)
    }

    fn exceeds(&self, value: Decimal, limit: Decimal) -> bool {
        value.saturating_sub(limit) > self.settings.tolerance
    }
}

/// Render an amount with exactly two decimals.
pub(crate) fn format_amount(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

pub(crate) fn required_field(ctx: &CheckContext<'_>, rule: &RequiredFieldRule) -> Option<Issue> {
    let value = ctx.fields.get(&rule.field_name);
    if !value.is_blank(ctx.settings.treat_na_as_missing) {
        return None;
    }

    let label = rule.label();
    Some(Issue {
        check_type: CheckType::RequiredFields,
        status: IssueStatus::Fail,
        severity: if rule.conditional {
            Severity::High
        } else {
            Severity::Critical
        },
        field_name: rule.field_name.clone(),
        issue_description: format!("{label} is missing or invalid"),
        expected_value: "Valid value".to_string(),
        actual_value: value.display(),
        form_reference: ctx.key().form_code.clone(),
        resolution_suggestion: format!("Provide a value for '{label}'"),
        is_resolved: false,
    })
}

/// Errors describe a malformed rule definition, or a sum the amounts cannot represent.
pub(crate) fn calculation(
    ctx: &CheckContext<'_>,
    rule: &CalculationRule,
) -> Result<Option<Issue>, FormulaError> {
    let formula = Formula::parse(&rule.formula)?;
    if let Some(unknown) = formula.fields().find(|name| !ctx.rule_set.knows_field(name)) {
        return Err(FormulaError::UnknownField(unknown.to_string()));
    }

    // a missing or unreadable result is reported by required_fields
    let Some(actual) = ctx.fields.number(&rule.result_field) else {
        return Ok(None);
    };

    let expected = formula.evaluate(ctx.fields)?;
    if ctx.within_tolerance(expected, actual) {
        return Ok(None);
    }

    let expected = format_amount(expected);
    let actual = format_amount(actual);
    Ok(Some(Issue {
        check_type: CheckType::Calculations,
        status: IssueStatus::Fail,
        severity: Severity::Critical,
        field_name: rule.result_field.clone(),
        issue_description: format!("Calculation error in '{}'", rule.name),
        resolution_suggestion: format!(
            "Recalculate {}. Expected: {expected}, Found: {actual}",
            rule.result_field
        ),
        expected_value: expected,
        actual_value: actual,
        form_reference: format!("{} - {}", ctx.key().form_code, rule.name),
        is_resolved: false,
    }))
}

struct Violation {
    field_name: String,
    description: String,
    expected: String,
    actual: String,
    resolution: String,
}

fn relation_violation(ctx: &CheckContext<'_>, relation: &CrossRelation) -> Option<Violation> {
    match relation {
        CrossRelation::Equal { left, right } => {
            let (l, r) = (ctx.amount(left), ctx.amount(right));
            if ctx.within_tolerance(l, r) {
                return None;
            }
            Some(Violation {
                field_name: left.clone(),
                description: format!(
                    "{left} ({}) must equal {right} ({})",
                    format_amount(l),
                    format_amount(r)
                ),
                expected: format_amount(r),
                actual: format_amount(l),
                resolution: format!("Reconcile {left} with {right}"),
            })
        }
        CrossRelation::AtMost { field, limit } => {
            let (v, max) = (ctx.amount(field), ctx.amount(limit));
            if !ctx.exceeds(v, max) {
                return None;
            }
            Some(Violation {
                field_name: field.clone(),
                description: format!(
                    "{field} ({}) must not exceed {limit} ({})",
                    format_amount(v),
                    format_amount(max)
                ),
                expected: format!("<= {}", format_amount(max)),
                actual: format_amount(v),
                resolution: format!("Reduce {field} or verify {limit}"),
            })
        }
        CrossRelation::PartsWithinTotal { total, parts } => {
            let t = ctx.amount(total);
            let sum = parts
                .iter()
                .fold(Decimal::ZERO, |acc, part| acc.saturating_add(ctx.amount(part)));
            if !ctx.exceeds(sum, t) {
                return None;
            }
            Some(Violation {
                field_name: total.clone(),
                description: format!(
                    "sum of {} ({}) exceeds {total} ({})",
                    parts.join(", "),
                    format_amount(sum),
                    format_amount(t)
                ),
                expected: format!(">= {}", format_amount(sum)),
                actual: format_amount(t),
                resolution: format!("Verify {total} against its parts"),
            })
        }
        CrossRelation::TotalCoversComponents { total, components } => {
            let t = ctx.amount(total);
            let (component, v) = components
                .iter()
                .map(|component| (component, ctx.amount(component)))
                .find(|(_, v)| ctx.exceeds(*v, t))?;
            Some(Violation {
                field_name: total.clone(),
                description: format!(
                    "{total} ({}) is less than component {component} ({})",
                    format_amount(t),
                    format_amount(v)
                ),
                expected: format!(">= {}", format_amount(v)),
                actual: format_amount(t),
                resolution: format!("Verify {total} includes {component}"),
            })
        }
    }
}

pub(crate) fn cross_reference(ctx: &CheckContext<'_>, rule: &CrossReferenceRule) -> Option<Issue> {
    let violation = relation_violation(ctx, &rule.relation)?;
    Some(Issue {
        check_type: CheckType::CrossReference,
        status: IssueStatus::Fail,
        severity: Severity::High,
        field_name: violation.field_name,
        issue_description: format!(
            "Cross-reference mismatch in '{}': {}",
            rule.name, violation.description
        ),
        expected_value: violation.expected,
        actual_value: violation.actual,
        form_reference: ctx.key().form_code.clone(),
        resolution_suggestion: violation.resolution,
        is_resolved: false,
    })
}

pub(crate) fn jurisdiction(ctx: &CheckContext<'_>, rule: &JurisdictionRule) -> Option<Issue> {
    if !rule.applies_to(&ctx.key().jurisdiction) {
        return None;
    }

    let label = rule.label();
    let value = ctx.fields.get(&rule.field_name);
    let missing = (
        format!("{label} is missing or invalid"),
        "Valid value".to_string(),
    );

    let (description, expected) = if value.is_blank(ctx.settings.treat_na_as_missing) {
        missing
    } else {
        match &rule.constraint {
            JurisdictionConstraint::Present => return None,
            JurisdictionConstraint::OneOf { allowed } => {
                let raw = value.display();
                if allowed
                    .iter()
                    .any(|option| option.trim().eq_ignore_ascii_case(raw.trim()))
                {
                    return None;
                }
                (
                    format!("{label} must be one of: {}", allowed.join(", ")),
                    allowed.join(", "),
                )
            }
            JurisdictionConstraint::NonNegative => match value.as_decimal() {
                Some(amount) if amount >= Decimal::ZERO => return None,
                Some(_) => (
                    format!("{label} must not be negative"),
                    format!(">= {}", format_amount(Decimal::ZERO)),
                ),
                None => (
                    format!("{label} must be a numeric amount"),
                    "Numeric amount".to_string(),
                ),
            },
        }
    };

    let severity = rule.severity.unwrap_or(Severity::Medium);
    Some(Issue {
        check_type: CheckType::JurisdictionSpecific,
        status: if severity == Severity::Low {
            IssueStatus::Warning
        } else {
            IssueStatus::Fail
        },
        severity,
        field_name: rule.field_name.clone(),
        issue_description: description,
        expected_value: expected,
        actual_value: value.display(),
        form_reference: rule.jurisdiction.clone(),
        resolution_suggestion: format!(
            "Correct '{label}' to satisfy {} requirements",
            rule.jurisdiction
        ),
        is_resolved: false,
    })
}
